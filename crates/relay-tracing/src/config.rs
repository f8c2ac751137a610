//! `[tracing]` section of the probe configuration.

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

const FALLBACK_FILTER: &str = "info";

#[derive(Debug, Clone, Deserialize)]
pub struct TracingConfig {
    /// `service.name` resource attribute on exported spans.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Collector address, e.g. `http://localhost:4317`. Unset or blank keeps
    /// spans local to stderr.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,

    #[serde(default)]
    pub protocol: OtlpProtocol,

    /// `EnvFilter` directives, e.g. `relay_probe=debug,warn`.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OtlpProtocol {
    #[default]
    Grpc,
    Http,
}

/// Stderr line format.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

fn default_service_name() -> String {
    "relay-probe".to_string()
}

fn default_log_level() -> String {
    FALLBACK_FILTER.to_string()
}

impl TracingConfig {
    /// Collector endpoint to export to, if export is enabled.
    ///
    /// An env override such as `RELAY_TRACING__OTLP_ENDPOINT=` switches
    /// export off rather than pointing the exporter at an empty URL.
    pub fn export_endpoint(&self) -> Option<&str> {
        self.otlp_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|endpoint| !endpoint.is_empty())
    }

    /// Event filter built from `log_level`; unparseable directives fall back
    /// to `info`.
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.log_level).unwrap_or_else(|_| EnvFilter::new(FALLBACK_FILTER))
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            otlp_endpoint: None,
            protocol: OtlpProtocol::default(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}
