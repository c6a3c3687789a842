//! The election services. Each holds a [`SharedLedger`](crate::ledger::SharedLedger)
//! and is cheap to clone.

mod authority;
mod projector;
mod scheduler;
mod state_machine;

pub use authority::AuthorityRegistry;
pub use projector::ResultsProjector;
pub use scheduler::{SchedulerSettings, TransitionScheduler};
pub use state_machine::ElectionStateMachine;
