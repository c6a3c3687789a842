use serde::{Deserialize, Serialize};

use crate::model::common::CandidateId;

/// A candidate standing in a single election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Unique within the election, assigned in arrival order from 1.
    pub id: CandidateId,
    pub name: String,
    pub program: String,
    pub vote_count: u64,
}

/// A request to add a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    #[serde(default)]
    pub program: String,
}

impl CandidateSpec {
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
        }
    }
}
