use chrono::{DateTime, Utc};

/// Source of "now" for date comparisons (booking in the past, the 24-hour
/// cancellation window). Injected so the rules are testable at exact
/// boundaries.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
