mod candidate;
mod election_core;
mod spec;
mod voter;

pub use candidate::{Candidate, CandidateSpec};
pub use election_core::{Election, ElectionDescription, ElectionSummary};
pub use spec::{ElectionSpec, ValidatedSpec};
pub use voter::{Voter, VoterSpec};
