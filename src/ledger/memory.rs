use std::collections::BTreeMap;
use std::sync::Arc;

use rocket::tokio::sync::{Mutex, RwLock};

use crate::error::{Error, Result};
use crate::ledger::{AuthorityStore, ElectionStore, Mutation, ScheduleStore};
use crate::model::{
    authority::ElectoralAuthority,
    common::{ElectionId, ElectionStatus, Identity, Transition},
    election::Election,
    schedule::ScheduledTransition,
};

/// One election's committed state plus a lock serialising its writers.
struct Slot {
    writer: Mutex<()>,
    committed: RwLock<Election>,
}

/// An in-process ledger. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryLedger {
    last_election_id: Mutex<ElectionId>,
    elections: RwLock<BTreeMap<ElectionId, Arc<Slot>>>,
    authorities: RwLock<BTreeMap<Identity, ElectoralAuthority>>,
    schedule: Mutex<BTreeMap<(ElectionId, Transition), ScheduledTransition>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, id: ElectionId) -> Option<Arc<Slot>> {
        self.elections.read().await.get(&id).cloned()
    }
}

#[rocket::async_trait]
impl ElectionStore for MemoryLedger {
    async fn next_election_id(&self) -> Result<ElectionId> {
        let mut last = self.last_election_id.lock().await;
        *last += 1;
        Ok(*last)
    }

    async fn insert_election(&self, election: &Election) -> Result<()> {
        let mut elections = self.elections.write().await;
        if elections.contains_key(&election.id) {
            return Err(Error::Unavailable(format!(
                "election {} already exists",
                election.id
            )));
        }
        let slot = Slot {
            writer: Mutex::new(()),
            committed: RwLock::new(election.clone()),
        };
        elections.insert(election.id, Arc::new(slot));
        Ok(())
    }

    async fn election(&self, id: ElectionId) -> Result<Option<Election>> {
        match self.slot(id).await {
            Some(slot) => Ok(Some(slot.committed.read().await.clone())),
            None => Ok(None),
        }
    }

    async fn elections(&self, status: Option<ElectionStatus>) -> Result<Vec<Election>> {
        let slots: Vec<_> = self.elections.read().await.values().cloned().collect();
        let mut elections = Vec::with_capacity(slots.len());
        for slot in slots {
            let election = slot.committed.read().await;
            if status.map_or(true, |s| election.status == s) {
                elections.push(election.clone());
            }
        }
        Ok(elections)
    }

    async fn modify_election(&self, id: ElectionId, mutation: Mutation<'_>) -> Result<Election> {
        let slot = self
            .slot(id)
            .await
            .ok_or_else(|| Error::not_found(format!("election {id}")))?;
        let _writer = slot.writer.lock().await;
        let mut election = slot.committed.read().await.clone();
        mutation(&mut election)?;
        election.revision += 1;
        *slot.committed.write().await = election.clone();
        Ok(election)
    }
}

#[rocket::async_trait]
impl AuthorityStore for MemoryLedger {
    async fn is_authority(&self, identity: &Identity) -> Result<bool> {
        Ok(self.authorities.read().await.contains_key(identity))
    }

    async fn insert_authority(&self, authority: &ElectoralAuthority) -> Result<bool> {
        let mut authorities = self.authorities.write().await;
        if authorities.contains_key(&authority.identity) {
            return Ok(false);
        }
        authorities.insert(authority.identity.clone(), authority.clone());
        Ok(true)
    }

    async fn authorities(&self) -> Result<Vec<ElectoralAuthority>> {
        Ok(self.authorities.read().await.values().cloned().collect())
    }
}

#[rocket::async_trait]
impl ScheduleStore for MemoryLedger {
    async fn save_deadline(&self, deadline: &ScheduledTransition) -> Result<()> {
        self.schedule
            .lock()
            .await
            .insert((deadline.election_id, deadline.transition), deadline.clone());
        Ok(())
    }

    async fn pending_deadlines(&self) -> Result<Vec<ScheduledTransition>> {
        Ok(self.schedule.lock().await.values().cloned().collect())
    }

    async fn remove_deadline(
        &self,
        election_id: ElectionId,
        transition: Transition,
    ) -> Result<()> {
        self.schedule.lock().await.remove(&(election_id, transition));
        Ok(())
    }
}
