//! Request and response bodies that only exist at the HTTP boundary.

use serde::{Deserialize, Serialize};

use crate::model::{
    common::{CandidateId, ElectionId, VoterId},
    election::VoterSpec,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCreated {
    pub election_id: ElectionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateAdded {
    pub candidate_id: CandidateId,
}

/// A ballot: the chosen candidate and who is casting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    pub candidate_id: CandidateId,
    pub voter: VoterSpec,
}

/// A server-issued identity for voting in a public election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingToken {
    pub voter_id: VoterId,
}
