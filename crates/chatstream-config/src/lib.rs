//! Configuration for chatstream
//!
//! Loads a TOML file describing the configured LLM providers and telemetry
//! exporters, with `{{ env.VAR }}` placeholders expanded before parsing.

#![allow(clippy::must_use_candidate)]

mod env;
pub mod llm;
mod loader;
pub mod telemetry;

use serde::Deserialize;

pub use llm::*;
pub use telemetry::TelemetryConfig;

/// Top-level chatstream configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// LLM provider configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
