//! Per-call store options and round-trip deadlines

use std::time::{Duration, Instant};

use super::errors::{StoreError, StoreResult};

/// Options for a single store round-trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Report absent keys on `get` as `Ok(None)` instead of NotFound
    pub quiet: bool,
    /// Upper bound for the round-trip
    pub timeout: Option<Duration>,
}

impl StoreOptions {
    /// Default options: loud, unbounded
    pub fn new() -> Self {
        Self::default()
    }

    /// Same options with `quiet` set
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Same options with the given timeout
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Tracks the time budget of one round-trip.
///
/// Stores call [`Deadline::check`] after acquiring their resources and
/// before applying a mutation, so a timed-out call never changes state.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    /// Starts the clock for a call with `opts`
    pub fn start(opts: &StoreOptions) -> Self {
        Self {
            started: Instant::now(),
            limit: opts.timeout,
        }
    }

    /// Fails with Timeout if the budget is exhausted.
    pub fn check(&self, op: &'static str, key: &str) -> StoreResult<()> {
        let Some(limit) = self.limit else {
            return Ok(());
        };
        let elapsed = self.started.elapsed();
        if elapsed > limit {
            return Err(StoreError::Timeout {
                op,
                key: key.to_string(),
                elapsed_ms: elapsed.as_millis() as u64,
                limit_ms: limit.as_millis() as u64,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_never_times_out() {
        let deadline = Deadline::start(&StoreOptions::new());
        std::thread::sleep(Duration::from_millis(2));
        assert!(deadline.check("get", "k").is_ok());
    }

    #[test]
    fn test_exhausted_budget_times_out() {
        let opts = StoreOptions::new().with_timeout(Some(Duration::from_millis(1)));
        let deadline = Deadline::start(&opts);
        std::thread::sleep(Duration::from_millis(5));

        match deadline.check("replace", "User-1") {
            Err(StoreError::Timeout { op, key, limit_ms, .. }) => {
                assert_eq!(op, "replace");
                assert_eq!(key, "User-1");
                assert_eq!(limit_ms, 1);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_builder() {
        let opts = StoreOptions::new().quiet();
        assert!(opts.quiet);
        assert!(opts.timeout.is_none());
    }
}
