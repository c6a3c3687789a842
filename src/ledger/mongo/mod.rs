use mongodb::{
    bson::{doc, Document},
    options::{FindOptions, ReplaceOptions},
    Client, Database,
};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::ledger::{AuthorityStore, ElectionStore, Mutation, ScheduleStore};
use crate::model::{
    authority::ElectoralAuthority,
    common::{ElectionId, ElectionStatus, Identity, Transition},
    election::Election,
    schedule::ScheduledTransition,
};

mod collection;
mod counter;
mod errors;

use collection::{ensure_indexes_exist, Coll};
use counter::{ensure_election_id_counter_exists, Counter, ELECTION_ID_COUNTER_ID};

/// How many times an election write is retried after losing an optimistic
/// concurrency race before giving up.
const MAX_WRITE_ATTEMPTS: usize = 16;

/// A ledger persisted in MongoDB.
///
/// Each election is a single document, so a vote (tally increment plus voter
/// record) is one document replacement. Writers are serialised per election
/// by an optimistic `revision` check.
pub struct MongoLedger {
    elections: Coll<Election>,
    authorities: Coll<ElectoralAuthority>,
    schedule: Coll<ScheduledTransition>,
    counters: Coll<Counter>,
}

impl MongoLedger {
    /// Connect to the database, ensuring indexes and the election ID counter exist.
    pub async fn connect(db_uri: &str, db_name: &str) -> Result<Self> {
        let client = Client::with_uri_str(db_uri).await?;
        let db = client.database(db_name);
        Self::from_db(&db).await
    }

    pub async fn from_db(db: &Database) -> Result<Self> {
        ensure_indexes_exist(db).await?;
        let counters = Coll::from_db(db);
        ensure_election_id_counter_exists(&counters).await?;
        Ok(Self {
            elections: Coll::from_db(db),
            authorities: Coll::from_db(db),
            schedule: Coll::from_db(db),
            counters,
        })
    }
}

/// Election IDs are stored as BSON int64; they never get near its limit.
fn election_filter(id: ElectionId) -> Document {
    doc! { "_id": id as i64 }
}

fn deadline_filter(election_id: ElectionId, transition: Transition) -> Document {
    doc! {
        "election_id": election_id as i64,
        "transition": transition,
    }
}

#[rocket::async_trait]
impl ElectionStore for MongoLedger {
    async fn next_election_id(&self) -> Result<ElectionId> {
        Counter::next(&self.counters, ELECTION_ID_COUNTER_ID).await
    }

    async fn insert_election(&self, election: &Election) -> Result<()> {
        self.elections.insert_one(election, None).await?;
        Ok(())
    }

    async fn election(&self, id: ElectionId) -> Result<Option<Election>> {
        Ok(self.elections.find_one(election_filter(id), None).await?)
    }

    async fn elections(&self, status: Option<ElectionStatus>) -> Result<Vec<Election>> {
        let filter = status.map(|status| doc! { "status": status });
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let elections = self
            .elections
            .find(filter, options)
            .await?
            .try_collect()
            .await?;
        Ok(elections)
    }

    async fn modify_election(&self, id: ElectionId, mutation: Mutation<'_>) -> Result<Election> {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut election = self
                .election(id)
                .await?
                .ok_or_else(|| Error::not_found(format!("election {id}")))?;
            let revision = election.revision;
            mutation(&mut election)?;
            election.revision = revision + 1;

            let mut filter = election_filter(id);
            filter.insert("revision", revision as i64);
            let result = self.elections.replace_one(filter, &election, None).await?;
            if result.matched_count == 1 {
                return Ok(election);
            }
            debug!("Write conflict on election {id} (attempt {attempt}), retrying");
        }
        Err(Error::Unavailable(format!(
            "gave up writing election {id} after {MAX_WRITE_ATTEMPTS} conflicting attempts"
        )))
    }
}

#[rocket::async_trait]
impl AuthorityStore for MongoLedger {
    async fn is_authority(&self, identity: &Identity) -> Result<bool> {
        let count = self
            .authorities
            .count_documents(doc! { "_id": identity.as_str() }, None)
            .await?;
        Ok(count > 0)
    }

    async fn insert_authority(&self, authority: &ElectoralAuthority) -> Result<bool> {
        match self.authorities.insert_one(authority, None).await {
            Ok(_) => Ok(true),
            Err(e) if errors::is_duplicate_key_error(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn authorities(&self) -> Result<Vec<ElectoralAuthority>> {
        let authorities = self
            .authorities
            .find(None, None)
            .await?
            .try_collect()
            .await?;
        Ok(authorities)
    }
}

#[rocket::async_trait]
impl ScheduleStore for MongoLedger {
    async fn save_deadline(&self, deadline: &ScheduledTransition) -> Result<()> {
        let filter = deadline_filter(deadline.election_id, deadline.transition);
        let options = ReplaceOptions::builder()
            .upsert(true)
            .build();
        self.schedule.replace_one(filter, deadline, options).await?;
        Ok(())
    }

    async fn pending_deadlines(&self) -> Result<Vec<ScheduledTransition>> {
        let options = FindOptions::builder().sort(doc! { "due_at": 1 }).build();
        let deadlines = self
            .schedule
            .find(None, options)
            .await?
            .try_collect()
            .await?;
        Ok(deadlines)
    }

    async fn remove_deadline(
        &self,
        election_id: ElectionId,
        transition: Transition,
    ) -> Result<()> {
        self.schedule
            .delete_one(deadline_filter(election_id, transition), None)
            .await?;
        Ok(())
    }
}

/// These need a live MongoDB server; run them with `--features mongodb-tests`.
#[cfg(all(test, feature = "mongodb-tests"))]
mod tests {
    use super::*;

    use chrono::{Duration, Timelike, Utc};
    use rocket::{futures::future::join_all, http::Status, local::asynchronous::Client};

    use crate::api::testing::{as_owner, get_json, post_json};
    use crate::ledger::SharedLedger;
    use crate::model::{
        election::{ElectionDescription, ElectionSpec, VoterSpec},
        payload::ElectionCreated,
    };

    #[backend_test]
    async fn election_ids_start_at_one(ledger: SharedLedger, db: Database) {
        assert_eq!(ledger.next_election_id().await.unwrap(), 1);
        assert_eq!(ledger.next_election_id().await.unwrap(), 2);

        // Reconnecting must not reset the counter.
        let reconnected = MongoLedger::from_db(&db).await.unwrap();
        assert_eq!(reconnected.next_election_id().await.unwrap(), 3);
    }

    #[backend_test]
    async fn elections_survive_storage(db: Database) {
        let ledger = MongoLedger::from_db(&db).await.unwrap();
        let private = Election::private_example(ledger.next_election_id().await.unwrap());
        let mut public = Election::public_example(ledger.next_election_id().await.unwrap());
        public.apply(Transition::Open).unwrap();
        public.cast_vote(2, &VoterSpec::anonymous("V1")).unwrap();
        ledger.insert_election(&private).await.unwrap();
        ledger.insert_election(&public).await.unwrap();

        assert_eq!(ledger.election(private.id).await.unwrap(), Some(private.clone()));
        assert_eq!(ledger.election(public.id).await.unwrap(), Some(public.clone()));
        assert_eq!(ledger.election(99).await.unwrap(), None);

        let all = ledger.elections(None).await.unwrap();
        assert_eq!(all, vec![private.clone(), public.clone()]);
        let open = ledger.elections(Some(ElectionStatus::Open)).await.unwrap();
        assert_eq!(open, vec![public]);
    }

    #[backend_test]
    async fn concurrent_votes_all_count(db: Database) {
        let ledger = MongoLedger::from_db(&db).await.unwrap();
        let mut election = Election::public_example(ledger.next_election_id().await.unwrap());
        election.apply(Transition::Open).unwrap();
        ledger.insert_election(&election).await.unwrap();
        let id = election.id;

        let ledger = &ledger;
        let votes = (0..8).map(|n| {
            async move {
                let voter = VoterSpec::anonymous(format!("V{n}"));
                ledger
                    .modify_election(id, &mut |election: &mut Election| {
                        election.cast_vote(1, &voter)
                    })
                    .await
            }
        });
        for result in join_all(votes).await {
            result.unwrap();
        }

        // A repeat voter loses, and nothing is committed for it.
        let voter = VoterSpec::anonymous("V0");
        let repeat = ledger
            .modify_election(id, &mut |election: &mut Election| election.cast_vote(2, &voter))
            .await;
        assert!(matches!(repeat, Err(Error::AlreadyVoted(_))));

        let stored = ledger.election(id).await.unwrap().unwrap();
        assert_eq!(stored.candidates[0].vote_count, 8);
        assert_eq!(stored.candidates[1].vote_count, 0);
        assert_eq!(stored.voters.len(), 8);
        assert_eq!(stored.revision, 8);
    }

    #[backend_test]
    async fn regrants_keep_the_first_grant(db: Database) {
        let ledger = MongoLedger::from_db(&db).await.unwrap();
        let first = ElectoralAuthority {
            identity: Identity::new("0xaaa").unwrap(),
            granted_by: Identity::new("0x111"),
        };
        let second = ElectoralAuthority {
            granted_by: Identity::new("0x222"),
            ..first.clone()
        };
        assert!(ledger.insert_authority(&first).await.unwrap());
        assert!(!ledger.insert_authority(&second).await.unwrap());
        assert!(ledger.is_authority(&first.identity).await.unwrap());

        let stored: Vec<_> = ledger
            .authorities()
            .await
            .unwrap()
            .into_iter()
            .filter(|a| a.identity == first.identity)
            .collect();
        assert_eq!(stored, vec![first]);
    }

    #[backend_test]
    async fn deadlines_are_saved_replaced_and_removed(db: Database) {
        let ledger = MongoLedger::from_db(&db).await.unwrap();
        // BSON datetimes keep milliseconds, so stick to whole seconds.
        let now = Utc::now().with_nanosecond(0).unwrap();
        let close = ScheduledTransition {
            election_id: 4,
            transition: Transition::Close,
            due_at: now + Duration::days(1),
        };
        let mut open = ScheduledTransition {
            election_id: 4,
            transition: Transition::Open,
            due_at: now,
        };
        ledger.save_deadline(&close).await.unwrap();
        ledger.save_deadline(&open).await.unwrap();
        open.due_at = now + Duration::hours(1);
        ledger.save_deadline(&open).await.unwrap();

        let pending = ledger.pending_deadlines().await.unwrap();
        assert_eq!(pending, vec![open.clone(), close.clone()]);

        ledger.remove_deadline(4, Transition::Open).await.unwrap();
        assert_eq!(ledger.pending_deadlines().await.unwrap(), vec![close]);
        ledger.remove_deadline(4, Transition::Close).await.unwrap();
        assert!(ledger.pending_deadlines().await.unwrap().is_empty());
    }

    #[backend_test]
    async fn stored_and_served_shapes_differ(client: Client, db: Database) {
        let (status, body) = post_json(
            &client,
            "/elections".into(),
            as_owner(&client),
            &ElectionSpec::public_example(),
        )
        .await;
        assert_eq!(status, Status::Ok);
        let created: ElectionCreated =
            rocket::serde::json::serde_json::from_str(&body.unwrap()).unwrap();

        let stored = db
            .collection::<Document>("elections")
            .find_one(election_filter(created.election_id), None)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.contains_key("_id"));
        assert!(stored.contains_key("revision"));

        let served: ElectionDescription =
            get_json(&client, format!("/elections/{}", created.election_id)).await;
        assert_eq!(served.id, created.election_id);
    }
}
