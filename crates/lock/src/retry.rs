use std::time::Duration;

/// Policy deciding whether and how long to wait before the next
/// acquisition attempt.
///
/// Returning `None` means the budget is exhausted and no further attempt is
/// permitted. State is scoped to a single acquisition call; pass a fresh
/// strategy to each [`acquire`](crate::LockClient::acquire).
pub trait RetryStrategy: Send {
    /// Consume one attempt from the budget and return the wait interval
    /// before the next attempt, or `None` to stop.
    fn next(&mut self) -> Option<Duration>;
}

/// Deterministic, non-jittered fixed-interval retry with an inclusive
/// attempt ceiling.
#[derive(Debug, Clone)]
pub struct FixedInterval {
    interval: Duration,
    max_retries: u32,
    attempted: u32,
}

impl FixedInterval {
    /// A strategy yielding `interval` before each of up to `max_retries`
    /// retries (on top of the initial attempt).
    pub fn new(interval: Duration, max_retries: u32) -> Self {
        Self {
            interval,
            max_retries,
            attempted: 0,
        }
    }
}

impl RetryStrategy for FixedInterval {
    fn next(&mut self) -> Option<Duration> {
        self.attempted += 1;
        (self.attempted <= self.max_retries).then_some(self.interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_interval_stops_after_max() {
        let mut retry = FixedInterval::new(Duration::from_millis(100), 3);
        assert_eq!(retry.next(), Some(Duration::from_millis(100)));
        assert_eq!(retry.next(), Some(Duration::from_millis(100)));
        assert_eq!(retry.next(), Some(Duration::from_millis(100)));
        assert_eq!(retry.next(), None);
        assert_eq!(retry.next(), None, "exhausted strategy stays exhausted");
    }

    #[test]
    fn zero_retries_stops_immediately() {
        let mut retry = FixedInterval::new(Duration::from_millis(100), 0);
        assert_eq!(retry.next(), None);
    }
}
