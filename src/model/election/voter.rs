use serde::{Deserialize, Serialize};

use crate::model::common::VoterId;

/// A voter known to an election: either a roster entry of a private election,
/// or a public voter recorded when their vote was accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    pub id: VoterId,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub has_voted: bool,
}

impl Voter {
    /// A voter who has not voted yet.
    pub fn registered(spec: VoterSpec) -> Self {
        Self {
            id: spec.id,
            name: spec.name,
            surname: spec.surname,
            email: spec.email,
            has_voted: false,
        }
    }
}

/// Voter details as supplied by a caller, either in a private roster or
/// alongside a ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterSpec {
    pub id: VoterId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub email: String,
}

impl VoterSpec {
    /// Voter details carrying nothing but an identity.
    pub fn anonymous(id: impl Into<VoterId>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            surname: String::new(),
            email: String::new(),
        }
    }
}
