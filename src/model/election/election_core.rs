use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::{CandidateId, ElectionId, ElectionStatus, Transition},
    election::{Candidate, CandidateSpec, Voter, VoterSpec},
};

/// An election record, as stored in the ledger.
///
/// All rule checks for mutating an election live here, as plain synchronous
/// methods. A failed check leaves the record untouched; the ledger commits a
/// mutated copy only if every check passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: ElectionId,
    pub name: String,
    pub description: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub end_time: DateTime<Utc>,
    pub is_private: bool,
    pub status: ElectionStatus,
    /// Candidates in ID order.
    pub candidates: Vec<Candidate>,
    /// The roster of a private election, or the recorded voters of a public one.
    pub voters: Vec<Voter>,
    /// Bumped on every committed change.
    pub revision: u64,
}

impl Election {
    pub fn candidate(&self, candidate_id: CandidateId) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == candidate_id)
    }

    /// Register a new candidate. Candidates are frozen once voting can begin.
    pub fn add_candidate(&mut self, spec: &CandidateSpec) -> Result<CandidateId> {
        if self.status != ElectionStatus::Scheduled {
            return Err(Error::invalid_state(format!(
                "election {} is {}; candidates can only be added while scheduled",
                self.id, self.status
            )));
        }
        let name = spec.name.trim();
        if name.is_empty() {
            return Err(Error::validation("candidate name must not be empty"));
        }
        if self.candidates.iter().any(|c| c.name == name) {
            return Err(Error::validation(format!(
                "election {} already has a candidate named {name}",
                self.id
            )));
        }

        let id = self.candidates.len() as CandidateId + 1;
        self.candidates.push(Candidate {
            id,
            name: name.to_string(),
            program: spec.program.clone(),
            vote_count: 0,
        });
        Ok(id)
    }

    /// Apply a phase transition, rejecting anything but the next forward step.
    pub fn apply(&mut self, transition: Transition) -> Result<ElectionStatus> {
        let next = self.status.after(transition).ok_or_else(|| {
            Error::invalid_state(format!(
                "cannot {transition} election {}: it is {}",
                self.id, self.status
            ))
        })?;
        self.status = next;
        Ok(next)
    }

    /// Cast a vote: increment the candidate's tally and mark the voter as
    /// having voted.
    ///
    /// Private elections only accept voters on their roster. Public elections
    /// accept any identity, recording it so that it cannot vote twice.
    pub fn cast_vote(&mut self, candidate_id: CandidateId, voter: &VoterSpec) -> Result<()> {
        if self.status != ElectionStatus::Open {
            return Err(Error::invalid_state(format!(
                "election {} is {}; votes are only accepted while open",
                self.id, self.status
            )));
        }
        let candidate_index = self
            .candidates
            .iter()
            .position(|c| c.id == candidate_id)
            .ok_or_else(|| {
                Error::not_found(format!("candidate {candidate_id} in election {}", self.id))
            })?;

        let existing = self.voters.iter().position(|v| v.id == voter.id);
        match existing {
            Some(index) if self.voters[index].has_voted => {
                return Err(Error::AlreadyVoted(format!(
                    "voter {} in election {}",
                    voter.id, self.id
                )));
            }
            Some(index) => self.voters[index].has_voted = true,
            None if self.is_private => {
                return Err(Error::NotEligible(format!(
                    "voter {} is not on the roster of election {}",
                    voter.id, self.id
                )));
            }
            None => self.voters.push(Voter {
                has_voted: true,
                ..Voter::registered(voter.clone())
            }),
        }
        self.candidates[candidate_index].vote_count += 1;
        Ok(())
    }

    pub fn summary(&self) -> ElectionSummary {
        ElectionSummary {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            is_private: self.is_private,
            status: self.status,
            candidate_count: self.candidates.len(),
        }
    }
}

/// A view on just the election's top-level metadata, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSummary {
    pub id: ElectionId,
    pub name: String,
    pub description: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub end_time: DateTime<Utc>,
    pub is_private: bool,
    pub status: ElectionStatus,
    pub candidate_count: usize,
}

/// An election as served to API callers, without storage bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    pub id: ElectionId,
    pub name: String,
    pub description: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub end_time: DateTime<Utc>,
    pub is_private: bool,
    pub status: ElectionStatus,
    pub candidates: Vec<Candidate>,
    pub voters: Vec<Voter>,
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        Self {
            id: election.id,
            name: election.name,
            description: election.description,
            start_time: election.start_time,
            end_time: election.end_time,
            is_private: election.is_private,
            status: election.status,
            candidates: election.candidates,
            voters: election.voters,
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    use crate::model::election::ElectionSpec;

    impl Election {
        /// A scheduled public election with candidates Alice and Bob.
        pub fn public_example(id: ElectionId) -> Self {
            let mut election = ElectionSpec::public_example()
                .validate()
                .unwrap()
                .into_election(id);
            election
                .add_candidate(&CandidateSpec::new("Alice", "Free coffee"))
                .unwrap();
            election
                .add_candidate(&CandidateSpec::new("Bob", "Longer holidays"))
                .unwrap();
            election
        }

        /// A scheduled private election with candidates Alice and Bob.
        pub fn private_example(id: ElectionId) -> Self {
            let mut election = ElectionSpec::private_example()
                .validate()
                .unwrap()
                .into_election(id);
            election
                .add_candidate(&CandidateSpec::new("Alice", "Free coffee"))
                .unwrap();
            election
                .add_candidate(&CandidateSpec::new("Bob", "Longer holidays"))
                .unwrap();
            election
        }
    }
}
