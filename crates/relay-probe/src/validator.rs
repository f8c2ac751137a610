//! Single-attempt check of one candidate relay.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::Instrument;

use crate::candidate::Candidate;
use crate::error::{FailureReason, TransportError};
use crate::identity::{BaselineIdentity, Identity};
use crate::transport::{IdentityTransport, ResolverResponse, Route};

/// A candidate that reached the resolver and hid the caller's address.
///
/// `group` and `org` are what the resolver reported, not the declared values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRelay {
    pub address: String,
    pub port: u16,
    pub delay: Duration,
    pub resolved_address: String,
    pub group: String,
    pub org: String,
}

impl ActiveRelay {
    /// `address:port`, as stored in the group bucket.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// `address,port,group,org` line of the active list.
    pub fn record(&self) -> String {
        format!("{},{},{},{}", self.address, self.port, self.group, self.org)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeFailure {
    pub address: String,
    pub port: u16,
    pub reason: FailureReason,
    pub detail: String,
}

/// Result of validating one candidate. Produced exactly once per candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(ActiveRelay),
    Failure(ProbeFailure),
}

impl Outcome {
    fn failure(candidate: &Candidate, reason: FailureReason, detail: impl Into<String>) -> Self {
        Outcome::Failure(ProbeFailure {
            address: candidate.address.clone(),
            port: candidate.port,
            reason,
            detail: detail.into(),
        })
    }

    pub fn endpoint(&self) -> String {
        match self {
            Outcome::Success(active) => active.endpoint(),
            Outcome::Failure(failure) => format!("{}:{}", failure.address, failure.port),
        }
    }
}

/// Check `candidate` once, relaying an identity lookup through it.
///
/// `deadline` bounds the whole attempt; on expiry the in-flight request is
/// dropped. Errors never escape: every path ends in an [`Outcome`].
pub async fn validate(
    transport: &dyn IdentityTransport,
    candidate: &Candidate,
    baseline: &BaselineIdentity,
    deadline: Duration,
) -> Outcome {
    let span = relay_tracing::probe_span!(candidate.address, candidate.port);

    async {
        let start = Instant::now();
        let result =
            tokio::time::timeout(deadline, transport.fetch(Route::Through(candidate))).await;
        let delay = start.elapsed();
        tracing::Span::current().record("latency_ms", delay.as_millis() as u64);

        let outcome = classify(candidate, baseline, deadline, delay, result);
        let label = match &outcome {
            Outcome::Success(_) => "success",
            Outcome::Failure(f) => f.reason.as_str(),
        };
        tracing::Span::current().record("outcome", label);
        outcome
    }
    .instrument(span)
    .await
}

fn classify(
    candidate: &Candidate,
    baseline: &BaselineIdentity,
    deadline: Duration,
    delay: Duration,
    result: Result<Result<ResolverResponse, TransportError>, tokio::time::error::Elapsed>,
) -> Outcome {
    let resp = match result {
        Err(_) => {
            return Outcome::failure(
                candidate,
                FailureReason::Timeout,
                format!("no answer within {deadline:?}"),
            )
        }
        Ok(Err(TransportError::Timeout)) => {
            return Outcome::failure(candidate, FailureReason::Timeout, "request timed out")
        }
        Ok(Err(e)) => {
            return Outcome::failure(candidate, FailureReason::ConnectionError, e.to_string())
        }
        Ok(Ok(resp)) => resp,
    };

    tracing::Span::current().record("status", resp.status);
    if !resp.is_success() {
        return Outcome::failure(
            candidate,
            FailureReason::NonSuccessStatus,
            resp.status.to_string(),
        );
    }

    let observed = match Identity::parse(&resp.body) {
        Ok(identity) => identity,
        Err(e) => {
            return Outcome::failure(candidate, FailureReason::MalformedResponse, e.to_string())
        }
    };

    if baseline.is_exposed_by(&observed) {
        return Outcome::failure(
            candidate,
            FailureReason::NotMasked,
            format!("resolver saw {}", observed.address),
        );
    }

    // A relay is only kept if it can be filed under a country.
    if observed.group.trim().is_empty() {
        return Outcome::failure(
            candidate,
            FailureReason::MalformedResponse,
            format!("resolver saw {} without a country", observed.address),
        );
    }

    Outcome::Success(ActiveRelay {
        address: candidate.address.clone(),
        port: candidate.port,
        delay,
        resolved_address: observed.address,
        group: observed.group,
        org: observed.org,
    })
}

/// Validator bound to one run's transport, baseline and deadline.
/// Cheap to clone (Arc).
#[derive(Clone)]
pub struct CandidateValidator {
    transport: Arc<dyn IdentityTransport>,
    baseline: Arc<BaselineIdentity>,
    deadline: Duration,
}

impl CandidateValidator {
    pub fn new(
        transport: Arc<dyn IdentityTransport>,
        baseline: BaselineIdentity,
        deadline: Duration,
    ) -> Self {
        Self {
            transport,
            baseline: Arc::new(baseline),
            deadline,
        }
    }

    pub async fn check(&self, candidate: &Candidate) -> Outcome {
        validate(
            self.transport.as_ref(),
            candidate,
            &self.baseline,
            self.deadline,
        )
        .await
    }
}
