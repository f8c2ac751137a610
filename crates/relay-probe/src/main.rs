//! relay-probe: checks a list of relay endpoints and keeps the ones that
//! actually hide the caller's address from an identity-resolution service.

mod aggregate;
mod baseline;
mod candidate;
mod config;
mod error;
mod executor;
mod identity;
mod pipeline;
mod report;
mod stats;
mod transport;
mod validator;

use std::path::PathBuf;
use std::sync::Arc;

use config::ProbeConfig;
use transport::HttpTransport;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let flag = |name: &str| {
        args.iter()
            .position(|a| a == name)
            .and_then(|i| args.get(i + 1).cloned())
    };

    let config_path = flag("--config")
        .or_else(|| args.get(1).filter(|a| !a.starts_with('-')).cloned())
        .or_else(|| std::env::var("RELAY_PROBE_CONFIG").ok())
        .unwrap_or_else(|| "relay-probe.toml".to_string());

    let concurrency = flag("--concurrency")
        .map(|n| n.parse::<usize>())
        .transpose()?;
    let input = flag("--input").map(PathBuf::from);

    let mut config = ProbeConfig::load(&config_path)?;
    config.apply_overrides(concurrency, input)?;

    // The tonic OTLP exporter needs a reactor, so the runtime comes first.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let tracing_guard = relay_tracing::init_tracing(&config.tracing);

        tracing::info!(
            config_path = %config_path,
            resolver = %config.resolver.url,
            input = %config.files.raw_list.display(),
            concurrency = config.probe.concurrency,
            otlp = tracing_guard.exporting(),
            "Starting relay-probe"
        );

        let result = run(config).await;
        drop(tracing_guard);
        result
    })
}

async fn run(config: ProbeConfig) -> anyhow::Result<()> {
    let transport = HttpTransport::new(config.resolver.url.clone(), config.probe.proxy_scheme)?;

    match pipeline::run(&config, Arc::new(transport)).await {
        Ok(summary) => {
            tracing::info!(
                candidates = summary.candidates,
                saved = summary.stats.saved,
                "Total relays saved: {}",
                summary.stats.saved
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Run aborted");
            Err(e)
        }
    }
}
