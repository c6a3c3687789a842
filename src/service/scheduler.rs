use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rocket::tokio::{
    self,
    sync::{broadcast, Mutex},
    time::Duration as StdDuration,
};

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::ledger::SharedLedger;
use crate::model::{
    common::{ElectionId, Identity, Transition},
    schedule::{ArmDecision, ArmReceipt, ScheduledTransition, TransitionEvent, TransitionOutcome},
};
use crate::scheduled_task::ScheduledTask;
use crate::service::ElectionStateMachine;

/// Number of unread events a slow subscriber may fall behind by.
const EVENT_CAPACITY: usize = 64;

type TaskKey = (ElectionId, Transition);

/// Live timers, tagged with the generation that armed them.
type TaskMap = HashMap<TaskKey, (u64, ScheduledTask<()>)>;

/// Tunables for the scheduler, normally taken from the application config.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Added to every deadline before it fires.
    pub grace: Duration,
    /// How many times a transiently failing transition is retried.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each one after.
    pub retry_interval: StdDuration,
}

impl SchedulerSettings {
    fn backoff(&self, attempt: u32) -> StdDuration {
        self.retry_interval.saturating_mul(1 << attempt.min(16))
    }
}

/// Fires the open and close transitions of armed elections at their deadlines,
/// acting as its own privileged identity.
///
/// Deadlines are written to the ledger before their timers start, so
/// [`recover`](Self::recover) can pick them up again after a restart.
#[derive(Clone)]
pub struct TransitionScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    machine: ElectionStateMachine,
    ledger: SharedLedger,
    identity: Identity,
    settings: SchedulerSettings,
    clock: Arc<dyn Clock>,
    tasks: Mutex<TaskMap>,
    generation: AtomicU64,
    events: broadcast::Sender<TransitionEvent>,
}

impl TransitionScheduler {
    pub fn new(
        machine: ElectionStateMachine,
        ledger: SharedLedger,
        identity: Identity,
        settings: SchedulerSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let inner = Inner {
            machine,
            ledger,
            identity,
            settings,
            clock,
            tasks: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            events,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Arm automatic opening and closing of an election.
    ///
    /// A deadline that has already passed (grace included) is skipped: the
    /// election then has to be transitioned manually. Arming again replaces
    /// any timers that are still pending.
    pub async fn arm(&self, caller: &Identity, election_id: ElectionId) -> Result<ArmReceipt> {
        self.inner.machine.authorities().require(caller).await?;
        let election = self.inner.machine.election_details(election_id).await?;
        let open_due = self.due_at(election.start_time)?;
        let close_due = self.due_at(election.end_time)?;

        let open = self
            .arm_one(election_id, Transition::Open, open_due)
            .await?;
        let close = self
            .arm_one(election_id, Transition::Close, close_due)
            .await?;
        info!("{caller} armed automation for election {election_id}");
        Ok(ArmReceipt {
            election_id,
            open,
            close,
        })
    }

    /// Restart the timers of every persisted deadline. Deadlines that fell due
    /// while nothing was running fire straight away.
    /// Returns the number of timers started.
    pub async fn recover(&self) -> Result<usize> {
        let deadlines = self.inner.ledger.pending_deadlines().await?;
        let count = deadlines.len();
        for deadline in deadlines {
            debug!(
                "Recovering {} of election {} due at {}",
                deadline.transition, deadline.election_id, deadline.due_at
            );
            self.start_timer(deadline).await;
        }
        Ok(count)
    }

    /// The transitions of an election that currently have a pending timer.
    pub async fn armed(&self, election_id: ElectionId) -> Vec<Transition> {
        let tasks = self.inner.tasks.lock().await;
        let mut armed: Vec<_> = tasks
            .iter()
            .filter(|((id, _), (_, task))| *id == election_id && !task.is_finished())
            .map(|((_, transition), _)| *transition)
            .collect();
        armed.sort();
        armed
    }

    /// Receive an event for every scheduled transition that fires from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TransitionEvent> {
        self.inner.events.subscribe()
    }

    /// When a transition scheduled for `timestamp` should fire.
    fn due_at(&self, timestamp: DateTime<Utc>) -> Result<DateTime<Utc>> {
        timestamp
            .checked_add_signed(self.inner.settings.grace)
            .ok_or_else(|| {
                Error::validation(format!(
                    "deadline {} is too far in the future to schedule",
                    timestamp.timestamp()
                ))
            })
    }

    async fn arm_one(
        &self,
        election_id: ElectionId,
        transition: Transition,
        due_at: DateTime<Utc>,
    ) -> Result<ArmDecision> {
        if due_at <= self.inner.clock.now() {
            warn!(
                "Deadline to {transition} election {election_id} has already passed; \
it must be done manually"
            );
            return Ok(ArmDecision::DeadlinePassed);
        }

        let deadline = ScheduledTransition {
            election_id,
            transition,
            due_at,
        };
        self.inner.ledger.save_deadline(&deadline).await?;
        self.start_timer(deadline).await;
        Ok(ArmDecision::Scheduled { at: due_at })
    }

    async fn start_timer(&self, deadline: ScheduledTransition) {
        let key = (deadline.election_id, deadline.transition);
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        let body = fire(self.inner.clone(), key, generation);

        // Holding the lock while spawning stops an overdue task from looking
        // itself up before it has been inserted.
        let mut tasks = self.inner.tasks.lock().await;
        let task = ScheduledTask::new(body, deadline.due_at, self.inner.clock.now());
        if let Some((_, previous)) = tasks.insert(key, (generation, task)) {
            previous.abort();
            debug!(
                "Replaced pending {} timer of election {}",
                deadline.transition, deadline.election_id
            );
        }
    }
}

/// Run one scheduled transition to completion, then clean up after it.
async fn fire(inner: Arc<Inner>, key: TaskKey, generation: u64) {
    let (election_id, transition) = key;
    info!("Scheduled {transition} of election {election_id} is due");

    let mut attempt = 0;
    let result = loop {
        let result = inner
            .machine
            .transition(&inner.identity, election_id, transition)
            .await;
        match result {
            Err(ref e) if e.is_transient() && attempt < inner.settings.max_retries => {
                let backoff = inner.settings.backoff(attempt);
                attempt += 1;
                warn!(
                    "Scheduled {transition} of election {election_id} failed ({e}); \
retry {attempt} in {}s",
                    backoff.as_secs()
                );
                tokio::time::sleep(backoff).await;
            }
            _ => break result,
        }
    };

    let outcome = TransitionOutcome::from_result(&result);
    match &outcome {
        TransitionOutcome::Applied => {
            info!("Scheduled {transition} of election {election_id} applied")
        }
        TransitionOutcome::AlreadyTransitioned => info!(
            "Scheduled {transition} of election {election_id} was not needed: \
it had already happened"
        ),
        TransitionOutcome::Rejected(e) | TransitionOutcome::Failed(e) => {
            error!("Scheduled {transition} of election {election_id} failed: {e}")
        }
    }

    let mut tasks = inner.tasks.lock().await;
    let current = matches!(tasks.get(&key), Some((g, _)) if *g == generation);
    if current {
        tasks.remove(&key);
        if let Err(e) = inner.ledger.remove_deadline(election_id, transition).await {
            error!("Failed to remove deadline of election {election_id}: {e}");
        }
    }
    drop(tasks);

    let event = TransitionEvent {
        election_id,
        transition,
        outcome,
    };
    // Nobody listening is fine.
    let _ = inner.events.send(event);
}
