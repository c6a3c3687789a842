use crate::error::{Error, Result};
use crate::ledger::SharedLedger;
use crate::model::{
    common::{ElectionId, ElectionStatus},
    election::{Candidate, Election, ElectionSummary},
    results::{CandidateResult, Standings},
};

/// Read-only views over committed election state.
#[derive(Clone)]
pub struct ResultsProjector {
    ledger: SharedLedger,
}

impl ResultsProjector {
    pub fn new(ledger: SharedLedger) -> Self {
        Self { ledger }
    }

    pub async fn list_all(&self) -> Result<Vec<ElectionSummary>> {
        self.summaries(None).await
    }

    pub async fn list_ongoing(&self) -> Result<Vec<ElectionSummary>> {
        self.summaries(Some(ElectionStatus::Open)).await
    }

    pub async fn list_completed(&self) -> Result<Vec<ElectionSummary>> {
        self.summaries(Some(ElectionStatus::Closed)).await
    }

    pub async fn candidates(&self, election_id: ElectionId) -> Result<Vec<Candidate>> {
        Ok(self.election(election_id).await?.candidates)
    }

    /// Candidate names and tallies, in candidate ID order.
    pub async fn results(&self, election_id: ElectionId) -> Result<Vec<CandidateResult>> {
        let results = self
            .election(election_id)
            .await?
            .candidates
            .into_iter()
            .map(|c| CandidateResult {
                name: c.name,
                vote_count: c.vote_count,
            })
            .collect();
        Ok(results)
    }

    pub async fn standings(&self, election_id: ElectionId) -> Result<Standings> {
        let election = self.election(election_id).await?;
        Ok(Standings::for_election(&election))
    }

    async fn summaries(&self, status: Option<ElectionStatus>) -> Result<Vec<ElectionSummary>> {
        let elections = self.ledger.elections(status).await?;
        Ok(elections.iter().map(Election::summary).collect())
    }

    async fn election(&self, election_id: ElectionId) -> Result<Election> {
        self.ledger
            .election(election_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("election {election_id}")))
    }
}
