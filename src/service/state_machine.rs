use rand::Rng;

use crate::error::{Error, Result};
use crate::ledger::SharedLedger;
use crate::model::{
    common::{CandidateId, ElectionId, ElectionStatus, Identity, Transition, VoterId},
    election::{CandidateSpec, Election, ElectionSpec, VoterSpec},
};
use crate::service::AuthorityRegistry;

/// Prefix of server-issued public voting tokens.
pub const VOTING_TOKEN_PREFIX: &str = "token-";

/// Applies every election write. Rule checks live on [`Election`]; this layer
/// adds authorization and routes each change through
/// [`modify_election`](crate::ledger::ElectionStore::modify_election) so it is
/// committed atomically.
#[derive(Clone)]
pub struct ElectionStateMachine {
    ledger: SharedLedger,
    authorities: AuthorityRegistry,
}

impl ElectionStateMachine {
    pub fn new(ledger: SharedLedger, authorities: AuthorityRegistry) -> Self {
        Self {
            ledger,
            authorities,
        }
    }

    pub fn authorities(&self) -> &AuthorityRegistry {
        &self.authorities
    }

    pub async fn create_election(&self, caller: &Identity, spec: ElectionSpec) -> Result<ElectionId> {
        self.authorities.require(caller).await?;
        let spec = spec.validate()?;
        let id = self.ledger.next_election_id().await?;
        let election = spec.into_election(id);
        self.ledger.insert_election(&election).await?;
        info!(
            "{caller} created {} election {id} ({})",
            if election.is_private { "private" } else { "public" },
            election.name
        );
        Ok(id)
    }

    pub async fn add_candidate(
        &self,
        caller: &Identity,
        election_id: ElectionId,
        spec: &CandidateSpec,
    ) -> Result<CandidateId> {
        self.authorities.require(caller).await?;
        let mut candidate_id = 0;
        self.ledger
            .modify_election(election_id, &mut |election| {
                candidate_id = election.add_candidate(spec)?;
                Ok(())
            })
            .await?;
        info!("{caller} added candidate {candidate_id} to election {election_id}");
        Ok(candidate_id)
    }

    pub async fn open_voting_session(&self, caller: &Identity, election_id: ElectionId) -> Result<()> {
        self.transition(caller, election_id, Transition::Open).await
    }

    pub async fn close_voting_session(&self, caller: &Identity, election_id: ElectionId) -> Result<()> {
        self.transition(caller, election_id, Transition::Close).await
    }

    /// Apply a phase transition on behalf of `caller`.
    pub async fn transition(
        &self,
        caller: &Identity,
        election_id: ElectionId,
        transition: Transition,
    ) -> Result<()> {
        self.authorities.require(caller).await?;
        let election = self
            .ledger
            .modify_election(election_id, &mut |election| {
                election.apply(transition).map(|_| ())
            })
            .await?;
        info!(
            "{caller} applied {transition} to election {election_id}, now {}",
            election.status
        );
        Ok(())
    }

    /// Cast a vote. The voter's identity is self-asserted.
    pub async fn vote(
        &self,
        election_id: ElectionId,
        candidate_id: CandidateId,
        voter: &VoterSpec,
    ) -> Result<()> {
        if voter.id.trim().is_empty() {
            return Err(Error::validation("voter ID must not be empty"));
        }
        self.ledger
            .modify_election(election_id, &mut |election| {
                election.cast_vote(candidate_id, voter)
            })
            .await?;
        debug!("Voter {} voted in election {election_id}", voter.id);
        Ok(())
    }

    pub async fn election_details(&self, election_id: ElectionId) -> Result<Election> {
        self.ledger
            .election(election_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("election {election_id}")))
    }

    /// Issue a fresh, unguessable identity for voting in an open public election.
    pub async fn issue_voting_token(&self, election_id: ElectionId) -> Result<VoterId> {
        let election = self.election_details(election_id).await?;
        if election.is_private {
            return Err(Error::invalid_state(format!(
                "election {election_id} is private; its voters are on the roster"
            )));
        }
        if election.status != ElectionStatus::Open {
            return Err(Error::invalid_state(format!(
                "election {election_id} is {}; tokens are only issued while open",
                election.status
            )));
        }
        let token: u128 = rand::thread_rng().gen();
        Ok(format!("{VOTING_TOKEN_PREFIX}{token:032x}"))
    }
}
