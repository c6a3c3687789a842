use serde::{Deserialize, Serialize};

use crate::model::{
    common::{CandidateId, ElectionId, ElectionStatus},
    election::Election,
};

/// A candidate's name and tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub name: String,
    pub vote_count: u64,
}

/// A candidate's position in the standings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateTally {
    pub candidate_id: CandidateId,
    pub name: String,
    pub vote_count: u64,
}

/// Who is ahead. Ties are reported as such and never broken arbitrarily.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "candidates", rename_all = "snake_case")]
pub enum Outcome {
    /// One candidate has strictly more votes than every other.
    Leader(CandidateTally),
    /// Several candidates share the highest count.
    Tie(Vec<CandidateTally>),
    NoVotes,
}

/// The ranked tally of an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standings {
    pub election_id: ElectionId,
    /// True once the election is closed and the tally is authoritative.
    #[serde(rename = "final")]
    pub is_final: bool,
    /// By vote count descending, then candidate ID ascending.
    pub ranked: Vec<CandidateTally>,
    pub outcome: Outcome,
}

impl Standings {
    pub fn for_election(election: &Election) -> Self {
        let mut ranked: Vec<CandidateTally> = election
            .candidates
            .iter()
            .map(|c| CandidateTally {
                candidate_id: c.id,
                name: c.name.clone(),
                vote_count: c.vote_count,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.vote_count
                .cmp(&a.vote_count)
                .then(a.candidate_id.cmp(&b.candidate_id))
        });

        let top = ranked.first().map(|c| c.vote_count).unwrap_or(0);
        let outcome = if top == 0 {
            Outcome::NoVotes
        } else {
            let mut leaders: Vec<_> = ranked
                .iter()
                .take_while(|c| c.vote_count == top)
                .cloned()
                .collect();
            if leaders.len() == 1 {
                Outcome::Leader(leaders.remove(0))
            } else {
                Outcome::Tie(leaders)
            }
        };

        Self {
            election_id: election.id,
            is_final: election.status == ElectionStatus::Closed,
            ranked,
            outcome,
        }
    }
}
