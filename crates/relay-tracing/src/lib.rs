//! Tracing setup for relay-probe: fmt/JSON logging with optional OTLP export,
//! plus the span macros used across a probe run.

pub mod config;
pub mod otlp;
pub mod spans;

pub use config::{LogFormat, OtlpProtocol, TracingConfig};
pub use otlp::{init_tracing, TracingGuard};
