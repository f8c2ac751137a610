//! Span builder macros for relay-probe instrumentation.

/// Root span of one probe run.
///
/// `candidates`, `saved` and `elapsed_secs` are recorded once the run reaches
/// the point where they are known.
#[macro_export]
macro_rules! run_span {
    ($run_id:expr) => {
        tracing::info_span!(
            "probe_run",
            run_id = %$run_id,
            candidates = tracing::field::Empty,
            saved = tracing::field::Empty,
            elapsed_secs = tracing::field::Empty,
        )
    };
}

/// Span for the unrouted baseline identity lookup.
#[macro_export]
macro_rules! baseline_span {
    ($timeout:expr) => {
        tracing::info_span!(
            "baseline_resolve",
            timeout_ms = ($timeout.as_millis() as u64),
            status = tracing::field::Empty,
            address = tracing::field::Empty,
        )
    };
}

/// Span for a single candidate validation.
///
/// Usage: `probe_span!(candidate.address, candidate.port)`.
#[macro_export]
macro_rules! probe_span {
    ($address:expr, $port:expr) => {
        tracing::info_span!(
            "probe_candidate",
            address = %$address,
            port = $port,
            latency_ms = tracing::field::Empty,
            status = tracing::field::Empty,
            outcome = tracing::field::Empty,
        )
    };
}
