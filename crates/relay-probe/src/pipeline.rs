//! One probe run: baseline, load, bounded validation, report.

use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use crate::aggregate::Aggregator;
use crate::baseline::resolve_baseline;
use crate::candidate::CandidateSet;
use crate::config::{CheckConfig, ProbeConfig};
use crate::executor::BoundedExecutor;
use crate::identity::BaselineIdentity;
use crate::report::Report;
use crate::stats::{ProbeStats, StatsSnapshot};
use crate::transport::IdentityTransport;
use crate::validator::{CandidateValidator, Outcome};

/// What a finished run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub candidates: usize,
    pub stats: StatsSnapshot,
    /// `None` when the input held no usable candidates.
    pub report: Option<Report>,
}

/// Validate every candidate under the configured ceiling and build the
/// sorted report.
pub async fn probe_candidates(
    transport: Arc<dyn IdentityTransport>,
    baseline: BaselineIdentity,
    set: &CandidateSet,
    check: &CheckConfig,
    stats: &ProbeStats,
) -> Report {
    let validator = CandidateValidator::new(transport, baseline, check.timeout());
    let aggregator = Arc::new(Aggregator::new(check.bucket_cap));
    let executor = BoundedExecutor::new(check.concurrency);
    let total = set.len();
    tracing::debug!(ceiling = executor.ceiling(), total, "Dispatching validations");

    let execution = executor
        .run(set.candidates().to_vec(), |index, candidate| {
            let validator = validator.clone();
            let aggregator = aggregator.clone();
            let stats = stats.clone();
            async move {
                let outcome = validator.check(&candidate).await;
                stats.inc_checked();
                match &outcome {
                    Outcome::Success(active) => {
                        let saved = stats.inc_saved();
                        tracing::info!(
                            progress = %format!("{}/{}", index + 1, total),
                            saved,
                            endpoint = %active.endpoint(),
                            resolved = %active.resolved_address,
                            group = %active.group,
                            delay_ms = active.delay.as_millis() as u64,
                            "Relay saved"
                        );
                    }
                    Outcome::Failure(failure) => {
                        stats.inc_failure(failure.reason);
                        tracing::info!(
                            progress = %format!("{}/{}", index + 1, total),
                            endpoint = %outcome.endpoint(),
                            reason = %failure.reason,
                            detail = %failure.detail,
                            "Relay rejected"
                        );
                    }
                }
                aggregator.record(outcome).await;
            }
        })
        .await;

    for _ in 0..execution.panicked {
        stats.inc_panicked();
    }

    let state = aggregator.freeze().await;
    Report::build(set.raw_records(), state)
}

/// Read the candidate list. An unreadable file counts as an empty list.
pub async fn load_candidates(config: &ProbeConfig) -> CandidateSet {
    let path = &config.files.raw_list;
    match tokio::fs::read_to_string(path).await {
        Ok(text) => {
            let set = CandidateSet::from_text(&text);
            tracing::info!(
                path = %path.display(),
                candidates = set.len(),
                skipped = set.skipped(),
                duplicates = set.duplicates(),
                "Candidate list loaded"
            );
            set
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to read candidate list");
            CandidateSet::default()
        }
    }
}

/// Full run. Only a baseline failure or an artifact write failure is an
/// error; individual candidate failures are counted, not raised.
pub async fn run(
    config: &ProbeConfig,
    transport: Arc<dyn IdentityTransport>,
) -> anyhow::Result<RunSummary> {
    let run_id = uuid::Uuid::new_v4();
    let span = relay_tracing::run_span!(run_id);
    execute(config, transport).instrument(span).await
}

async fn execute(
    config: &ProbeConfig,
    transport: Arc<dyn IdentityTransport>,
) -> anyhow::Result<RunSummary> {
    let started = Instant::now();

    let baseline = resolve_baseline(transport.as_ref(), config.resolver.timeout()).await?;

    let set = load_candidates(config).await;
    tracing::Span::current().record("candidates", set.len() as u64);
    let stats = ProbeStats::new();

    if set.is_empty() {
        tracing::info!(path = %config.files.raw_list.display(), "No candidates found");
        return Ok(RunSummary {
            candidates: 0,
            stats: stats.snapshot(),
            report: None,
        });
    }

    tracing::info!(
        candidates = set.len(),
        concurrency = config.probe.concurrency,
        timeout_secs = config.probe.timeout_secs,
        baseline = %baseline.address(),
        "Checking candidates"
    );
    let report = probe_candidates(transport, baseline, &set, &config.probe, &stats).await;
    report.persist(&config.files).await?;

    let snapshot = stats.snapshot();
    let elapsed = started.elapsed().as_secs_f64();
    tracing::Span::current().record("saved", snapshot.saved);
    tracing::Span::current().record("elapsed_secs", elapsed);
    tracing::info!(
        saved = snapshot.saved,
        failed = snapshot.failed(),
        not_masked = snapshot.not_masked,
        timeout = snapshot.timeout,
        connection_error = snapshot.connection_error,
        panicked = snapshot.panicked,
        elapsed_secs = %format!("{elapsed:.2}"),
        "Run complete"
    );

    Ok(RunSummary {
        candidates: set.len(),
        stats: snapshot,
        report: Some(report),
    })
}
