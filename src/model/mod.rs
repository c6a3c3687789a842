//! Plain data types, shared by the ledger backends, services, and API.

pub mod authority;
pub mod common;
pub mod election;
pub mod payload;
pub mod results;
pub mod schedule;
