use std::fmt::{Display, Formatter};

use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// Phases in the election lifecycle. Elections only ever move forwards:
/// `Scheduled -> Open -> Closed`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElectionStatus {
    /// Created; candidates may still be added.
    Scheduled,
    /// Voting session in progress.
    Open,
    /// Voting finished. Terminal.
    Closed,
}

impl ElectionStatus {
    /// The phase that `transition` leads to from here, if it is allowed.
    pub fn after(self, transition: Transition) -> Option<Self> {
        match (self, transition) {
            (Self::Scheduled, Transition::Open) => Some(Self::Open),
            (Self::Open, Transition::Close) => Some(Self::Closed),
            _ => None,
        }
    }
}

impl Display for ElectionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Scheduled => "scheduled",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

impl From<ElectionStatus> for Bson {
    fn from(status: ElectionStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}

/// The two irreversible phase transitions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Transition {
    Open,
    Close,
}

impl Display for Transition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::Close => f.write_str("close"),
        }
    }
}

impl From<Transition> for Bson {
    fn from(transition: Transition) -> Self {
        to_bson(&transition).expect("Serialisation is infallible")
    }
}
