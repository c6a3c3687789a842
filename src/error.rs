use mongodb::error::Error as DbError;
use rocket::{http::Status, response::Responder};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every way an election operation can be rejected.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller lacks authority for a gated write.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// A referenced election or candidate does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
    /// The election is in a phase that forbids the operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Already voted: {0}")]
    AlreadyVoted(String),
    #[error("Not eligible: {0}")]
    NotEligible(String),
    /// Malformed input, rejected before reaching the state machine.
    #[error("Validation failed: {0}")]
    Validation(String),
    /// The storage backend failed for reasons unrelated to business rules.
    #[error(transparent)]
    Db(#[from] DbError),
    /// The storage backend could not commit, e.g. after too many write conflicts.
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_state(what: impl Into<String>) -> Self {
        Self::InvalidState(what.into())
    }

    pub fn validation(what: impl Into<String>) -> Self {
        Self::Validation(what.into())
    }

    /// Is this the only kind of failure a caller may reasonably retry?
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Db(_) | Self::Unavailable(_))
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Unauthorized(_) | Self::NotEligible(_) => Status::Forbidden,
            Self::NotFound(_) => Status::NotFound,
            Self::InvalidState(_) | Self::AlreadyVoted(_) => Status::Conflict,
            Self::Validation(_) => Status::BadRequest,
            Self::Db(_) | Self::Unavailable(_) => Status::ServiceUnavailable,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        if self.is_transient() {
            error!("{self}");
        } else {
            warn!("{self}");
        }
        Err(self.status())
    }
}
