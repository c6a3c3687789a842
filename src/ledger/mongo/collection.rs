use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::{
    authority::ElectoralAuthority, election::Election, schedule::ScheduledTransition,
};

use super::counter::Counter;

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl MongoCollection for Election {
    const NAME: &'static str = "elections";
}

impl MongoCollection for ElectoralAuthority {
    const NAME: &'static str = "authorities";
}

impl MongoCollection for ScheduledTransition {
    const NAME: &'static str = "schedule";
}

impl MongoCollection for Counter {
    const NAME: &'static str = "counters";
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    // Listings filter by status.
    let status_index = IndexModel::builder().keys(doc! {"status": 1}).build();
    Coll::<Election>::from_db(db)
        .create_index(status_index, None)
        .await?;

    // At most one deadline per election and transition.
    let unique = IndexOptions::builder().unique(true).build();
    let deadline_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "transition": 1})
        .options(unique)
        .build();
    Coll::<ScheduledTransition>::from_db(db)
        .create_index(deadline_index, None)
        .await?;

    Ok(())
}
