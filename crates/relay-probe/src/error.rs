//! Error taxonomy for a probe run.
//!
//! Only [`InitializationError`] is fatal. Record errors skip one input line,
//! and [`FailureReason`] marks one candidate as failed without touching the
//! rest of the batch.

use std::fmt;

use thiserror::Error;

/// The caller's own identity could not be established.
#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("baseline lookup timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("baseline lookup failed: {0}")]
    Transport(#[from] TransportError),
    #[error("baseline lookup returned status {0}")]
    Status(u16),
    #[error("baseline response is not a usable identity: {0}")]
    Malformed(String),
}

/// Why a raw candidate record was skipped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("expected 4 fields, found {0}")]
    MissingFields(usize),
    #[error("invalid port {0:?}")]
    InvalidPort(String),
}

/// Transport-level failure while talking to the resolution service.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("invalid route {route}: {reason}")]
    InvalidRoute { route: String, reason: String },
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Connection(e.to_string())
        }
    }
}

/// Classification of a failed candidate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    Timeout,
    ConnectionError,
    NonSuccessStatus,
    NotMasked,
    MalformedResponse,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Timeout => "timeout",
            FailureReason::ConnectionError => "connection_error",
            FailureReason::NonSuccessStatus => "non_success_status",
            FailureReason::NotMasked => "not_masked",
            FailureReason::MalformedResponse => "malformed_response",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
