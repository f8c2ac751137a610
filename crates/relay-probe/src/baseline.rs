//! Unrouted lookup of the caller's own identity.

use std::time::Duration;

use tracing::Instrument;

use crate::error::InitializationError;
use crate::identity::{BaselineIdentity, Identity};
use crate::transport::{IdentityTransport, Route};

/// Establish the baseline every candidate is compared against.
///
/// Any failure is an [`InitializationError`]; the run cannot continue without
/// a baseline.
pub async fn resolve_baseline(
    transport: &dyn IdentityTransport,
    timeout: Duration,
) -> Result<BaselineIdentity, InitializationError> {
    let span = relay_tracing::baseline_span!(timeout);
    fetch_baseline(transport, timeout).instrument(span).await
}

async fn fetch_baseline(
    transport: &dyn IdentityTransport,
    timeout: Duration,
) -> Result<BaselineIdentity, InitializationError> {
    let resp = tokio::time::timeout(timeout, transport.fetch(Route::Direct))
        .await
        .map_err(|_| InitializationError::Timeout(timeout))??;

    tracing::Span::current().record("status", resp.status);
    if !resp.is_success() {
        return Err(InitializationError::Status(resp.status));
    }

    let identity =
        Identity::parse(&resp.body).map_err(|e| InitializationError::Malformed(e.to_string()))?;
    tracing::Span::current().record("address", identity.address.as_str());

    tracing::info!(
        address = %identity.address,
        group = %identity.group,
        org = %identity.org,
        "Baseline identity resolved"
    );
    Ok(BaselineIdentity::new(identity))
}
