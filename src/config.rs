use std::sync::Arc;

use chrono::Duration;
use rocket::{
    fairing::{Fairing, Info, Kind},
    tokio::time::Duration as StdDuration,
    Build, Rocket,
};
use serde::Deserialize;

use crate::clock::SystemClock;
use crate::error::{Error, Result};
use crate::ledger::{MemoryLedger, MongoLedger, SharedLedger};
use crate::model::common::Identity;
use crate::service::{
    AuthorityRegistry, ElectionStateMachine, ResultsProjector, SchedulerSettings,
    TransitionScheduler,
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Deserialize)]
#[serde(try_from = "RawConfig")]
pub struct Config {
    bootstrap_authority: Identity,
    scheduler_identity: Identity,
    scheduler_grace: u32,
    scheduler_max_retries: u32,
    scheduler_retry_interval: u32,
}

#[derive(Deserialize)]
struct RawConfig {
    bootstrap_authority: String,
    scheduler_identity: String,
    scheduler_grace: u32,
    scheduler_max_retries: u32,
    scheduler_retry_interval: u32,
}

impl TryFrom<RawConfig> for Config {
    type Error = String;

    fn try_from(raw: RawConfig) -> std::result::Result<Self, Self::Error> {
        let bootstrap_authority = Identity::new(&raw.bootstrap_authority)
            .ok_or("`bootstrap_authority` must not be blank")?;
        let scheduler_identity = Identity::new(&raw.scheduler_identity)
            .ok_or("`scheduler_identity` must not be blank")?;
        Ok(Self {
            bootstrap_authority,
            scheduler_identity,
            scheduler_grace: raw.scheduler_grace,
            scheduler_max_retries: raw.scheduler_max_retries,
            scheduler_retry_interval: raw.scheduler_retry_interval,
        })
    }
}

impl Config {
    /// The system creator: the sole initial electoral authority.
    pub fn bootstrap_authority(&self) -> &Identity {
        &self.bootstrap_authority
    }

    /// The identity scheduled transitions are performed as.
    pub fn scheduler_identity(&self) -> &Identity {
        &self.scheduler_identity
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            grace: Duration::seconds(self.scheduler_grace.into()),
            max_retries: self.scheduler_max_retries,
            retry_interval: StdDuration::from_secs(self.scheduler_retry_interval.into()),
        }
    }
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum LedgerKind {
    Memory,
    Mongodb,
}

/// Configuration for the ledger backend.
#[derive(Deserialize)]
struct LedgerConfig {
    ledger: LedgerKind,
    // secrets
    db_uri: Option<String>,
    #[serde(default = "default_db_name")]
    db_name: String,
}

fn default_db_name() -> String {
    "evoting".to_string()
}

/// A fairing that sets up the ledger, bootstraps the authority set, and
/// places the ledger and the election services into managed state.
///
/// If a [`SharedLedger`] is already managed it is used as-is; otherwise one
/// is built from the `ledger` config. Must be attached after [`ConfigFairing`].
pub struct LedgerFairing;

#[rocket::async_trait]
impl Fairing for LedgerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Ledger",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let (bootstrap, scheduler) = match rocket.state::<Config>() {
            Some(config) => (
                config.bootstrap_authority().clone(),
                config.scheduler_identity().clone(),
            ),
            None => {
                error!("Config was not available when setting up the ledger");
                return Err(rocket);
            }
        };

        let ledger = match rocket.state::<SharedLedger>() {
            Some(ledger) => ledger.clone(),
            None => {
                let config = match rocket.figment().extract::<LedgerConfig>() {
                    Ok(config) => config,
                    Err(e) => {
                        error!("Failed to load ledger config");
                        rocket::config::pretty_print_error(e);
                        return Err(rocket);
                    }
                };
                match connect(config).await {
                    Ok(ledger) => {
                        rocket = rocket.manage(ledger.clone());
                        ledger
                    }
                    Err(e) => {
                        error!("Failed to set up ledger: {e}");
                        return Err(rocket);
                    }
                }
            }
        };

        // Ensure the creator is an authority and the scheduler may act.
        let authorities = AuthorityRegistry::new(ledger.clone());
        let bootstrapped = async {
            authorities.bootstrap(&bootstrap).await?;
            authorities.grant_authority(&bootstrap, &scheduler).await
        };
        if let Err(e) = bootstrapped.await {
            error!("Failed to bootstrap electoral authorities: {e}");
            return Err(rocket);
        }
        info!("...ledger online!");

        // Manage the state.
        let machine = ElectionStateMachine::new(ledger.clone(), authorities.clone());
        let projector = ResultsProjector::new(ledger);
        rocket = rocket.manage(authorities).manage(machine).manage(projector);
        Ok(rocket)
    }
}

async fn connect(config: LedgerConfig) -> Result<SharedLedger> {
    match config.ledger {
        LedgerKind::Memory => {
            warn!("Using an in-memory ledger; nothing will survive a restart");
            Ok(Arc::new(MemoryLedger::new()))
        }
        LedgerKind::Mongodb => {
            let db_uri = config
                .db_uri
                .ok_or_else(|| Error::validation("`db_uri` must be set to use the mongodb ledger"))?;
            info!("Connecting to database {}...", config.db_name);
            let ledger = MongoLedger::connect(&db_uri, &config.db_name).await?;
            Ok(Arc::new(ledger))
        }
    }
}

/// A fairing that creates the transition scheduler, restarts every persisted
/// deadline, and places the scheduler into managed state.
/// Must be attached after [`LedgerFairing`].
pub struct TransitionSchedulerFairing;

#[rocket::async_trait]
impl Fairing for TransitionSchedulerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Transition Scheduler",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        info!("Recovering scheduled transitions...");
        let scheduler = match (
            rocket.state::<Config>(),
            rocket.state::<SharedLedger>(),
            rocket.state::<ElectionStateMachine>(),
        ) {
            (Some(config), Some(ledger), Some(machine)) => TransitionScheduler::new(
                machine.clone(),
                ledger.clone(),
                config.scheduler_identity().clone(),
                config.scheduler_settings(),
                Arc::new(SystemClock),
            ),
            _ => {
                error!("Ledger was not available when creating the scheduler");
                return Err(rocket);
            }
        };
        match scheduler.recover().await {
            Ok(count) => info!("...{count} scheduled transitions recovered!"),
            Err(e) => {
                error!("Failed to recover scheduled transitions: {e}");
                return Err(rocket);
            }
        }

        // Manage the state.
        rocket = rocket.manage(scheduler);
        Ok(rocket)
    }
}
