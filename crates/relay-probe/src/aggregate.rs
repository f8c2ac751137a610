//! Concurrent accumulation of successful outcomes.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::validator::{ActiveRelay, Outcome};

/// Group name → `address:port` entries, at most `cap` per group.
///
/// The cap is enforced by [`GroupBuckets::push`]; entries keep completion
/// order within a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupBuckets {
    cap: usize,
    groups: BTreeMap<String, Vec<String>>,
}

impl GroupBuckets {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            groups: BTreeMap::new(),
        }
    }

    /// Append `endpoint` to `group` unless the group is full.
    /// Returns whether the entry was kept.
    pub fn push(&mut self, group: &str, endpoint: String) -> bool {
        let entries = self.groups.entry(group.to_string()).or_default();
        if entries.len() >= self.cap {
            return false;
        }
        entries.push(endpoint);
        true
    }

    /// Read-only view keyed in lexicographic group order.
    pub fn as_map(&self) -> &BTreeMap<String, Vec<String>> {
        &self.groups
    }
}

/// Everything the report is built from.
#[derive(Debug, Clone)]
pub struct AggregateState {
    pub active: Vec<ActiveRelay>,
    pub buckets: GroupBuckets,
    pub success_count: u64,
}

impl AggregateState {
    fn new(bucket_cap: usize) -> Self {
        Self {
            active: Vec::new(),
            buckets: GroupBuckets::new(bucket_cap),
            success_count: 0,
        }
    }
}

/// Shared sink for outcomes; one lock covers the list, bucket and counter so
/// `active.len() == success_count` holds at every observation.
pub struct Aggregator {
    state: Mutex<AggregateState>,
}

impl Aggregator {
    pub fn new(bucket_cap: usize) -> Self {
        Self {
            state: Mutex::new(AggregateState::new(bucket_cap)),
        }
    }

    /// Fold one outcome in. Returns the running success count for a success,
    /// `None` for a failure (which leaves the state untouched).
    pub async fn record(&self, outcome: Outcome) -> Option<u64> {
        let Outcome::Success(active) = outcome else {
            return None;
        };

        let mut state = self.state.lock().await;
        state.buckets.push(&active.group, active.endpoint());
        state.active.push(active);
        state.success_count += 1;
        Some(state.success_count)
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> AggregateState {
        self.state.lock().await.clone()
    }

    /// Final state once every producer is done.
    pub async fn freeze(self: Arc<Self>) -> AggregateState {
        match Arc::try_unwrap(self) {
            Ok(aggregator) => aggregator.state.into_inner(),
            Err(shared) => shared.snapshot().await,
        }
    }
}
