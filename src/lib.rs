#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod scheduled_task;
pub mod service;

pub use config::Config;
pub use ledger::SharedLedger;

use config::{ConfigFairing, LedgerFairing, TransitionSchedulerFairing};
use logging::LoggerFairing;

/// Build the server, with the ledger chosen by configuration.
pub fn build() -> Rocket<Build> {
    mount(rocket::build())
}

/// Build the server over an existing ledger.
pub fn rocket_for_ledger(ledger: SharedLedger) -> Rocket<Build> {
    mount(rocket::build().manage(ledger))
}

fn mount(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(LedgerFairing)
        .attach(TransitionSchedulerFairing)
}

/// A freshly named database for one test, on the server at
/// `EVOTING_TEST_DB_URI` (a local server by default).
#[cfg(all(test, feature = "mongodb-tests"))]
pub(crate) async fn test_database() -> mongodb::Database {
    let db_uri = std::env::var("EVOTING_TEST_DB_URI")
        .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    let client = mongodb::Client::with_uri_str(&db_uri)
        .await
        .unwrap_or_else(|e| panic!("Could not connect to test database at {db_uri}: {e}"));
    client.database(&format!("evoting_test_{:016x}", rand::random::<u64>()))
}
