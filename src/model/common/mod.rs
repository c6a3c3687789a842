mod identity;
mod status;

pub use identity::{Identity, IDENTITY_HEADER};
pub use status::{ElectionStatus, Transition};

/// Election IDs are sequential from 1.
pub type ElectionId = u64;
/// Candidate IDs are sequential from 1 within their election.
pub type CandidateId = u64;
/// Voter IDs are opaque strings supplied with the roster or the ballot.
pub type VoterId = String;
