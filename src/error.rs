//! Error types for trackbench
//!
//! Only [`Error::Tracker`] is recoverable at the run-loop level; every other
//! variant aborts a batch.

use std::fmt;

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Failure raised by (or on behalf of) a tracker runtime.
///
/// Carries the tracker identity, a human-readable message and, when the
/// runtime captured it, the raw tracker output at the time of failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerFailure {
    tracker: String,
    message: String,
    log: Option<String>,
}

impl TrackerFailure {
    /// Create a failure without captured output.
    #[must_use]
    pub fn new(tracker: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tracker: tracker.into(),
            message: message.into(),
            log: None,
        }
    }

    /// Attach captured tracker output.
    #[must_use]
    pub fn with_log(mut self, log: impl Into<String>) -> Self {
        self.log = Some(log.into());
        self
    }

    /// Identifier of the tracker that failed.
    #[must_use]
    pub fn tracker(&self) -> &str {
        &self.tracker
    }

    /// Failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Captured tracker output, if any.
    #[must_use]
    pub fn log(&self) -> Option<&str> {
        self.log.as_deref()
    }
}

impl fmt::Display for TrackerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// trackbench error types
#[derive(Error, Debug)]
pub enum Error {
    /// Tracker process/session failed or produced invalid output
    #[error("Tracker {} failed: {}", .0.tracker(), .0)]
    Tracker(TrackerFailure),

    /// Invalid experiment or realtime configuration (never retried)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A sequence transformer failed
    #[error("Transformer error: {0}")]
    Transform(String),

    /// Malformed or unsuitable sequence data
    #[error("Sequence error: {0}")]
    Sequence(String),

    /// Result or log storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Stored result could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for building a tracker failure error.
    #[must_use]
    pub fn tracker(tracker: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tracker(TrackerFailure::new(tracker, message))
    }

    /// The tracker failure carried by this error, if it is one.
    #[must_use]
    pub const fn as_tracker_failure(&self) -> Option<&TrackerFailure> {
        match self {
            Self::Tracker(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<TrackerFailure> for Error {
    fn from(failure: TrackerFailure) -> Self {
        Self::Tracker(failure)
    }
}
