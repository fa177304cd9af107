//! Result and error types for Ojear.

use thiserror::Error;

/// Result type for Ojear operations
pub type OjearResult<T> = Result<T, OjearError>;

/// Errors that can occur in Ojear
#[derive(Debug, Error)]
pub enum OjearError {
    /// A locator resolved to zero elements during an action
    #[error("No element matched {strategy} '{value}'")]
    ElementNotFound {
        /// Selector strategy that was used
        strategy: String,
        /// Selector value that was used
        value: String,
    },

    /// A locator resolved to more than one element when exactness was required
    #[error("Locator {strategy} '{value}' matched {count} elements where exactly one was required")]
    AmbiguousLocator {
        /// Selector strategy that was used
        strategy: String,
        /// Selector value that was used
        value: String,
        /// Number of elements that matched
        count: usize,
    },

    /// A polled assertion never became true within its timeout
    #[error("Assertion timed out after {timeout_ms}ms; {diagnostic}")]
    AssertionTimedOut {
        /// Timeout that elapsed, in milliseconds
        timeout_ms: u64,
        /// Last observed value before giving up
        diagnostic: String,
    },

    /// The underlying driver faulted while a predicate was being evaluated
    #[error("Assertion errored: {message}")]
    AssertionErrored {
        /// Error message from the failing check
        message: String,
    },

    /// Checkpoint requested while no visual session was open
    #[error("Visual session not active: {message}")]
    SessionNotActive {
        /// What was attempted
        message: String,
    },

    /// A checkpoint comparison did not match its baseline
    #[error("Visual mismatch at '{label}': {detail}")]
    VisualMismatch {
        /// Checkpoint label
        label: String,
        /// Mismatch detail (diff statistics)
        detail: String,
    },

    /// Required configuration was absent before any scenario ran
    #[error("Missing configuration: {message}")]
    ConfigurationMissing {
        /// What was missing
        message: String,
    },

    /// Driver/communication fault (navigation, input, capture)
    #[error("Driver fault: {message}")]
    DriverError {
        /// Error message from the driver
        message: String,
    },

    /// Transport fault talking to the visual backend
    #[error("Visual backend transport fault: {message}")]
    TransportError {
        /// Error message from the transport
        message: String,
    },

    /// Image decoding or comparison failed
    #[error("Image comparison failed: {message}")]
    ImageComparisonError {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OjearError {
    /// Shorthand for a driver fault with a formatted message
    pub fn driver(message: impl Into<String>) -> Self {
        Self::DriverError {
            message: message.into(),
        }
    }

    /// Shorthand for a transport fault with a formatted message
    pub fn transport(message: impl Into<String>) -> Self {
        Self::TransportError {
            message: message.into(),
        }
    }

    /// Whether this error is a scenario-level test failure rather than a
    /// system fault
    #[must_use]
    pub const fn is_test_failure(&self) -> bool {
        matches!(
            self,
            Self::AssertionTimedOut { .. } | Self::VisualMismatch { .. }
        )
    }
}
