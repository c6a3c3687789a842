//! Persistence for elections, authorities, and scheduled deadlines.
//!
//! Services never touch a backend directly; they are handed a
//! [`SharedLedger`] and go through the traits below. Backends must make every
//! [`ElectionStore::modify_election`] call atomic with respect to all other
//! writes to the same election.

use std::sync::Arc;

use crate::error::Result;
use crate::model::{
    authority::ElectoralAuthority,
    common::{ElectionId, ElectionStatus, Identity, Transition},
    election::Election,
    schedule::ScheduledTransition,
};

mod memory;
mod mongo;

pub use self::memory::MemoryLedger;
pub use self::mongo::MongoLedger;

/// A mutation applied to a private copy of an election. If it returns an
/// error, nothing is committed. It may be called more than once when a
/// backend retries after a write conflict.
pub type Mutation<'a> = &'a mut (dyn FnMut(&mut Election) -> Result<()> + Send);

#[rocket::async_trait]
pub trait ElectionStore: Send + Sync {
    /// Atomically allocate the next election ID. The first ID is 1.
    async fn next_election_id(&self) -> Result<ElectionId>;

    async fn insert_election(&self, election: &Election) -> Result<()>;

    /// Read the committed state of an election.
    async fn election(&self, id: ElectionId) -> Result<Option<Election>>;

    /// All elections, optionally only those with the given status, in ID order.
    async fn elections(&self, status: Option<ElectionStatus>) -> Result<Vec<Election>>;

    /// Apply `mutation` to the election and commit it, all or nothing.
    /// Returns the committed election.
    async fn modify_election(&self, id: ElectionId, mutation: Mutation<'_>) -> Result<Election>;
}

#[rocket::async_trait]
pub trait AuthorityStore: Send + Sync {
    async fn is_authority(&self, identity: &Identity) -> Result<bool>;

    /// Add a member. Returns false if the identity was already a member, in
    /// which case the existing record is kept.
    async fn insert_authority(&self, authority: &ElectoralAuthority) -> Result<bool>;

    async fn authorities(&self) -> Result<Vec<ElectoralAuthority>>;
}

#[rocket::async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Persist a deadline, replacing any existing one for the same election and transition.
    async fn save_deadline(&self, deadline: &ScheduledTransition) -> Result<()>;

    async fn pending_deadlines(&self) -> Result<Vec<ScheduledTransition>>;

    async fn remove_deadline(&self, election_id: ElectionId, transition: Transition)
        -> Result<()>;
}

/// Everything a backend must provide.
pub trait Ledger: ElectionStore + AuthorityStore + ScheduleStore {}

impl<T> Ledger for T where T: ElectionStore + AuthorityStore + ScheduleStore {}

pub type SharedLedger = Arc<dyn Ledger>;
