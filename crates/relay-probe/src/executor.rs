//! Bounded fan-out of per-candidate work.
//!
//! A semaphore permit is acquired before each task is spawned and travels
//! with the task, so at most `ceiling` tasks exist at any instant. Admission
//! follows input order and waits (without polling) for a free permit.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

/// Tally of one executor run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionReport {
    pub admitted: usize,
    pub completed: usize,
    pub panicked: usize,
}

impl ExecutionReport {
    fn settle(&mut self, result: Result<(), JoinError>) {
        match result {
            Ok(()) => self.completed += 1,
            Err(e) => {
                self.panicked += 1;
                tracing::error!(error = %e, "Validation task aborted");
            }
        }
    }
}

/// Runs one task per item with a hard ceiling on concurrency.
pub struct BoundedExecutor {
    permits: Arc<Semaphore>,
    ceiling: usize,
}

impl BoundedExecutor {
    /// A ceiling of zero is raised to one.
    pub fn new(ceiling: usize) -> Self {
        let ceiling = ceiling.max(1);
        Self {
            permits: Arc::new(Semaphore::new(ceiling)),
            ceiling,
        }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Run `work(index, item)` for every item and wait for all of them.
    ///
    /// A panicking task is counted in [`ExecutionReport::panicked`] and never
    /// affects its siblings.
    pub async fn run<T, F, Fut>(&self, items: Vec<T>, work: F) -> ExecutionReport
    where
        T: Send + 'static,
        F: Fn(usize, T) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut report = ExecutionReport::default();
        let mut tasks = JoinSet::new();

        for (index, item) in items.into_iter().enumerate() {
            let permit = match self.permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::error!(error = %e, "Executor semaphore closed, stopping admission");
                    break;
                }
            };

            let fut = work(index, item);
            tasks.spawn(async move {
                let _permit = permit;
                fut.await;
            });
            report.admitted += 1;

            while let Some(result) = tasks.try_join_next() {
                report.settle(result);
            }
        }

        while let Some(result) = tasks.join_next().await {
            report.settle(result);
        }

        report
    }
}
