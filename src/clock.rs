use chrono::{DateTime, Utc};

/// Source of wall-clock time for deadline arithmetic.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that starts at the real time but then advances with Tokio's
/// monotonic clock, so it follows `tokio::time::pause`/`advance` in tests.
#[cfg(test)]
pub struct TokioClock {
    wall: DateTime<Utc>,
    origin: rocket::tokio::time::Instant,
}

#[cfg(test)]
impl TokioClock {
    pub fn new() -> Self {
        Self {
            wall: Utc::now(),
            origin: rocket::tokio::time::Instant::now(),
        }
    }
}

#[cfg(test)]
impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.origin.elapsed()).unwrap();
        self.wall + elapsed
    }
}
