//! Polling assertion engine.
//!
//! UI state changes asynchronously relative to the calling scenario. The
//! engine converts "eventually true" into "true within timeout, else failed"
//! with an explicit loop over a monotonic clock, so the timeout and poll
//! interval contract is reproducible in isolation.
//!
//! The distinction that matters: a predicate reporting "not yet" is expected
//! transient state and is retried; a predicate that errors (the driver threw
//! mid-check) is a fault and is never retried.

use crate::result::{OjearError, OjearResult};
use std::time::{Duration, Instant};
use tracing::debug;

/// Default timeout for polled assertions (5 seconds)
pub const DEFAULT_ASSERT_TIMEOUT_MS: u64 = 5_000;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// One predicate evaluation's view of the world
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    /// The condition holds now
    Holds,
    /// Not yet true; carries the last observed value for diagnostics
    Pending(String),
}

impl Check {
    /// Build a pending check with a diagnostic
    pub fn pending(observed: impl Into<String>) -> Self {
        Self::Pending(observed.into())
    }
}

/// Timing contract for one polled assertion
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Total budget in milliseconds
    pub timeout_ms: u64,
    /// Sleep between evaluations in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_ASSERT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl PollOptions {
    /// Create options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Timeout as a `Duration`
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Poll interval as a `Duration`
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Terminal verdict of one polled assertion.
///
/// Exactly one verdict is produced per call; no evaluation happens after the
/// terminal state is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The predicate became true within the budget
    Satisfied {
        /// Wall time spent until the predicate held
        elapsed: Duration,
    },
    /// The predicate never became true
    TimedOut {
        /// Budget that elapsed, in milliseconds
        timeout_ms: u64,
        /// Last observed value, for an actionable failure message
        last_observed: String,
    },
    /// The predicate itself raised; not retried
    Errored {
        /// The underlying fault
        message: String,
    },
}

impl PollOutcome {
    /// Whether the assertion was satisfied
    #[must_use]
    pub const fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied { .. })
    }

    /// Convert the verdict into a result, mapping `TimedOut` and `Errored`
    /// to their error taxonomy entries
    pub fn into_result(self) -> OjearResult<()> {
        match self {
            Self::Satisfied { .. } => Ok(()),
            Self::TimedOut {
                timeout_ms,
                last_observed,
            } => Err(OjearError::AssertionTimedOut {
                timeout_ms,
                diagnostic: last_observed,
            }),
            Self::Errored { message } => Err(OjearError::AssertionErrored { message }),
        }
    }
}

/// Poll a predicate until it holds, errors, or the timeout elapses.
///
/// Guarantees:
/// - exactly one evaluation happens at time zero, so already-satisfied
///   conditions return with zero latency;
/// - if the deadline and a poll tick coincide, one final evaluation runs
///   before `TimedOut` is declared;
/// - an `Err` from the predicate terminates immediately with `Errored`.
pub fn poll<F>(mut predicate: F, options: &PollOptions) -> PollOutcome
where
    F: FnMut() -> OjearResult<Check>,
{
    let start = Instant::now();
    let timeout = options.timeout();
    let mut last_observed = String::from("condition never observed");

    loop {
        match predicate() {
            Ok(Check::Holds) => {
                let elapsed = start.elapsed();
                debug!(elapsed_ms = elapsed.as_millis() as u64, "assertion satisfied");
                return PollOutcome::Satisfied { elapsed };
            }
            Ok(Check::Pending(observed)) => {
                debug!(observed = %observed, "assertion pending");
                last_observed = observed;
            }
            Err(error) => {
                return PollOutcome::Errored {
                    message: error.to_string(),
                };
            }
        }

        if start.elapsed() >= timeout {
            return PollOutcome::TimedOut {
                timeout_ms: options.timeout_ms,
                last_observed,
            };
        }
        std::thread::sleep(options.poll_interval());
    }
}
