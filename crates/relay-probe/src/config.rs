//! Configuration types and loading logic.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::bail;
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use relay_tracing::TracingConfig;
use serde::Deserialize;

use crate::transport::ProxyScheme;

/// Top-level probe configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeConfig {
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub probe: CheckConfig,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
}

/// Identity-resolution service settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_resolver_url")]
    pub url: String,

    /// Deadline for the unrouted baseline lookup.
    #[serde(default = "default_baseline_timeout")]
    pub timeout_secs: u64,
}

/// Per-candidate check settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckConfig {
    /// Maximum number of validations in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Deadline for one whole validation attempt.
    #[serde(default = "default_check_timeout")]
    pub timeout_secs: u64,

    /// Entries kept per group in the group-bucket artifact.
    #[serde(default = "default_bucket_cap")]
    pub bucket_cap: usize,

    #[serde(default)]
    pub proxy_scheme: ProxyScheme,
}

/// Input and output artifact locations.
#[derive(Debug, Clone, Deserialize)]
pub struct FilesConfig {
    /// Candidate list to read. Rewritten with the deduplicated records.
    #[serde(default = "default_raw_list")]
    pub raw_list: PathBuf,

    #[serde(default = "default_active_list")]
    pub active_list: PathBuf,

    #[serde(default = "default_kv_pair")]
    pub kv_pair: PathBuf,
}

fn default_resolver_url() -> String {
    "https://myip.ipeek.workers.dev".to_string()
}

fn default_baseline_timeout() -> u64 {
    10
}

fn default_concurrency() -> usize {
    99
}

fn default_check_timeout() -> u64 {
    5
}

fn default_bucket_cap() -> usize {
    10
}

fn default_raw_list() -> PathBuf {
    PathBuf::from("./rawProxyList.txt")
}

fn default_active_list() -> PathBuf {
    PathBuf::from("./ProxyList.txt")
}

fn default_kv_pair() -> PathBuf {
    PathBuf::from("./kvProxyList.json")
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            url: default_resolver_url(),
            timeout_secs: default_baseline_timeout(),
        }
    }
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_secs: default_check_timeout(),
            bucket_cap: default_bucket_cap(),
            proxy_scheme: ProxyScheme::default(),
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            raw_list: default_raw_list(),
            active_list: default_active_list(),
            kv_pair: default_kv_pair(),
        }
    }
}

impl ResolverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl CheckConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ProbeConfig {
    /// Load configuration from a TOML file and environment variables.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (RELAY_ prefix, __ for nesting)
    /// 2. TOML config file (may be absent)
    /// 3. Defaults
    pub fn load(config_path: &str) -> anyhow::Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(config_path))
                .merge(Env::prefixed("RELAY_").split("__")),
        )
    }

    fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let config: ProbeConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.probe.concurrency == 0 {
            bail!("probe.concurrency must be at least 1");
        }
        if self.probe.bucket_cap == 0 {
            bail!("probe.bucket_cap must be at least 1");
        }
        if self.probe.timeout_secs == 0 || self.resolver.timeout_secs == 0 {
            bail!("timeouts must be at least one second");
        }
        Ok(())
    }

    /// Apply command-line overrides, which take precedence over file and env.
    pub fn apply_overrides(
        &mut self,
        concurrency: Option<usize>,
        input: Option<PathBuf>,
    ) -> anyhow::Result<()> {
        if let Some(n) = concurrency {
            self.probe.concurrency = n;
        }
        if let Some(path) = input {
            self.files.raw_list = path;
        }
        self.validate()
    }
}
