//! Atomic run statistics.
//!
//! Lock-free counters updated by every finished validation. All atomics use
//! `Relaxed` ordering; they are display counters and order nothing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::FailureReason;

#[derive(Default)]
struct StatsInner {
    checked: AtomicU64,
    saved: AtomicU64,
    timeout: AtomicU64,
    connection_error: AtomicU64,
    non_success_status: AtomicU64,
    not_masked: AtomicU64,
    malformed_response: AtomicU64,
    panicked: AtomicU64,
}

/// Thread-safe run statistics. Cheap to clone (Arc).
#[derive(Clone, Default)]
pub struct ProbeStats {
    inner: Arc<StatsInner>,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub checked: u64,
    pub saved: u64,
    pub timeout: u64,
    pub connection_error: u64,
    pub non_success_status: u64,
    pub not_masked: u64,
    pub malformed_response: u64,
    pub panicked: u64,
}

impl StatsSnapshot {
    pub fn failed(&self) -> u64 {
        self.timeout
            + self.connection_error
            + self.non_success_status
            + self.not_masked
            + self.malformed_response
    }
}

impl ProbeStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a finished check and return its 1-based completion index.
    pub fn inc_checked(&self) -> u64 {
        self.inner.checked.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Count a saved candidate and return the running total.
    pub fn inc_saved(&self) -> u64 {
        self.inner.saved.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn inc_failure(&self, reason: FailureReason) {
        let counter = match reason {
            FailureReason::Timeout => &self.inner.timeout,
            FailureReason::ConnectionError => &self.inner.connection_error,
            FailureReason::NonSuccessStatus => &self.inner.non_success_status,
            FailureReason::NotMasked => &self.inner.not_masked,
            FailureReason::MalformedResponse => &self.inner.malformed_response,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_panicked(&self) {
        self.inner.panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            checked: self.inner.checked.load(Ordering::Relaxed),
            saved: self.inner.saved.load(Ordering::Relaxed),
            timeout: self.inner.timeout.load(Ordering::Relaxed),
            connection_error: self.inner.connection_error.load(Ordering::Relaxed),
            non_success_status: self.inner.non_success_status.load(Ordering::Relaxed),
            not_masked: self.inner.not_masked.load(Ordering::Relaxed),
            malformed_response: self.inner.malformed_response.load(Ordering::Relaxed),
            panicked: self.inner.panicked.load(Ordering::Relaxed),
        }
    }
}
