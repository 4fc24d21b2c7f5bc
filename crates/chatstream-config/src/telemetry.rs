use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

/// Telemetry configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Service name for telemetry metadata
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Additional resource attributes
    #[serde(default)]
    pub resource_attributes: HashMap<String, String>,
    /// Default exporter shared by tracing and metrics
    #[serde(default)]
    pub exporter: Option<ExporterConfig>,
    /// Tracing-specific configuration
    #[serde(default)]
    pub tracing: Option<TracingConfig>,
    /// Metrics-specific configuration
    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
}

impl TelemetryConfig {
    /// Whether any OTLP exporter is configured
    pub fn has_exporter(&self) -> bool {
        self.exporter.is_some()
            || self.tracing.as_ref().is_some_and(|t| t.exporter.is_some())
            || self.metrics.as_ref().is_some_and(|m| m.exporter.is_some())
    }

    /// Exporter for traces, falling back to the shared exporter
    pub fn trace_exporter(&self) -> Option<&ExporterConfig> {
        self.tracing
            .as_ref()
            .and_then(|t| t.exporter.as_ref())
            .or(self.exporter.as_ref())
    }

    /// Exporter for metrics, falling back to the shared exporter
    pub fn metrics_exporter(&self) -> Option<&ExporterConfig> {
        self.metrics
            .as_ref()
            .and_then(|m| m.exporter.as_ref())
            .or(self.exporter.as_ref())
    }
}

/// OTLP exporter configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterConfig {
    /// OTLP endpoint URL
    pub endpoint: Url,
    /// Export protocol
    #[serde(default)]
    pub protocol: ExportProtocol,
    /// Export timeout (e.g. "10s")
    #[serde(default)]
    pub timeout: Option<String>,
}

impl ExporterConfig {
    /// Parsed export timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the timeout cannot be parsed
    pub fn timeout(&self) -> anyhow::Result<Option<Duration>> {
        self.timeout
            .as_deref()
            .map(|raw| duration_str::parse(raw).map_err(|e| anyhow::anyhow!("invalid exporter timeout '{raw}': {e}")))
            .transpose()
    }
}

/// OTLP export protocol
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportProtocol {
    /// gRPC (default)
    #[default]
    Grpc,
    /// HTTP/protobuf
    HttpProto,
}

/// Tracing configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TracingConfig {
    /// Sampling rate (0.0 to 1.0)
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: f64,
    /// Use parent-based sampler
    #[serde(default = "default_true")]
    pub parent_based: bool,
    /// Override the default exporter for tracing
    #[serde(default)]
    pub exporter: Option<ExporterConfig>,
}

/// Metrics configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Export interval (e.g. "30s")
    #[serde(default)]
    pub interval: Option<String>,
    /// Override the default exporter for metrics
    #[serde(default)]
    pub exporter: Option<ExporterConfig>,
}

impl MetricsConfig {
    /// Parsed export interval
    ///
    /// # Errors
    ///
    /// Returns an error if the interval cannot be parsed
    pub fn interval(&self) -> anyhow::Result<Option<Duration>> {
        self.interval
            .as_deref()
            .map(|raw| duration_str::parse(raw).map_err(|e| anyhow::anyhow!("invalid metrics interval '{raw}': {e}")))
            .transpose()
    }
}

fn default_service_name() -> String {
    "chatstream".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_sampling_rate() -> f64 {
    1.0
}

#[allow(clippy::missing_const_for_fn)]
fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_exporter_overrides_shared_exporter() {
        let config: TelemetryConfig = toml::from_str(
            r#"
            [exporter]
            endpoint = "http://collector:4317"

            [tracing]
            sampling_rate = 0.5

            [metrics]
            interval = "15s"

            [metrics.exporter]
            endpoint = "http://metrics:4318"
            protocol = "http_proto"
            timeout = "5s"
            "#,
        )
        .unwrap();

        assert_eq!(config.service_name, "chatstream");
        assert!(config.has_exporter());
        assert_eq!(config.trace_exporter().unwrap().endpoint.as_str(), "http://collector:4317/");

        let metrics = config.metrics_exporter().unwrap();
        assert!(matches!(metrics.protocol, ExportProtocol::HttpProto));
        assert_eq!(metrics.timeout().unwrap(), Some(Duration::from_secs(5)));
        assert_eq!(
            config.metrics.as_ref().unwrap().interval().unwrap(),
            Some(Duration::from_secs(15))
        );
        assert!(config.tracing.as_ref().unwrap().parent_based);
    }

    #[test]
    fn no_exporter_by_default() {
        let config: TelemetryConfig = toml::from_str("service_name = \"cli\"").unwrap();
        assert!(!config.has_exporter());
        assert!(config.trace_exporter().is_none());
    }
}
