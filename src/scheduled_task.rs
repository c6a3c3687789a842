use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use rocket::tokio::{
    self,
    task::{JoinError, JoinHandle},
    time::Duration,
};

/// A one-shot task that runs at a specific wall-clock time.
/// It cannot be triggered early; it can be aborted before it runs.
pub struct ScheduledTask<T> {
    handle: JoinHandle<T>,
}

impl<T> ScheduledTask<T>
where
    T: Send + 'static,
{
    /// Schedule `task` to execute at `run_at`, measured against `now`.
    /// If `run_at` is not after `now`, the task executes immediately.
    pub fn new<Fut>(task: Fut, run_at: DateTime<Utc>, now: DateTime<Utc>) -> Self
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        let delay = delay_until(run_at, now);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await
        });
        Self { handle }
    }

    /// Stop the task if it has not finished yet.
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Implement `Future` for `ScheduledTask` so we can directly `await` it.
impl<T> Future for ScheduledTask<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx)
    }
}

/// Time from `now` until `target`. A target in the past produces zero.
fn delay_until(target: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (target - now).to_std().unwrap_or(Duration::ZERO)
}

/// Wait for `task`, giving up after `limit`. Returns `None` on timeout.
#[cfg(test)]
pub async fn await_within<T>(
    task: &mut ScheduledTask<T>,
    limit: Duration,
) -> Option<Result<T, JoinError>> {
    use rocket::futures::future::{self, Either};

    let timeout = Box::pin(tokio::time::sleep(limit));
    match future::select(task, timeout).await {
        Either::Left((result, _)) => Some(result),
        Either::Right(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration as ChronoDuration;

    #[test]
    fn past_targets_have_no_delay() {
        let now = Utc::now();
        assert_eq!(delay_until(now - ChronoDuration::seconds(5), now), Duration::ZERO);
        assert_eq!(delay_until(now, now), Duration::ZERO);
        assert_eq!(
            delay_until(now + ChronoDuration::seconds(90), now),
            Duration::from_secs(90)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn runs_at_its_time_and_not_before() {
        let now = Utc::now();
        let mut task = ScheduledTask::new(async { 42 }, now + ChronoDuration::hours(1), now);
        assert!(!task.is_finished());

        let early = await_within(&mut task, Duration::from_secs(59 * 60)).await;
        assert!(early.is_none(), "task ran early");
        let result = await_within(&mut task, Duration::from_secs(2 * 60)).await;
        assert_eq!(result.unwrap().unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn aborted_tasks_never_run() {
        let now = Utc::now();
        let mut task = ScheduledTask::new(async { 1 }, now + ChronoDuration::seconds(10), now);
        task.abort();
        let result = await_within(&mut task, Duration::from_secs(60)).await;
        assert!(result.unwrap().unwrap_err().is_cancelled());
    }
}
