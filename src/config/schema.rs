//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! Every section has a `Default` so the service starts with no environment at all.

use serde::{Deserialize, Serialize};

/// Root configuration for the cart service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// OTLP export settings for the reporting pipeline.
    pub telemetry: TelemetryConfig,

    /// Graceful shutdown bounds.
    pub shutdown: ShutdownConfig,

    /// Simulated handler latency.
    pub simulation: SimulationConfig,

    /// Log output settings.
    pub logging: LoggingConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Wire protocol used to reach the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExportProtocol {
    /// OTLP over gRPC (port 4317 by convention).
    #[default]
    Grpc,
    /// OTLP protobuf over HTTP (port 4318 by convention).
    HttpProtobuf,
}

impl ExportProtocol {
    /// Parse the `OTEL_EXPORTER_OTLP_PROTOCOL` spelling.
    pub fn from_env_value(value: &str) -> Option<Self> {
        match value.trim() {
            "grpc" => Some(Self::Grpc),
            "http/protobuf" => Some(Self::HttpProtobuf),
            _ => None,
        }
    }

    /// Endpoint used when nothing is configured.
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::Grpc => "http://localhost:4317",
            Self::HttpProtobuf => "http://localhost:4318/v1/metrics",
        }
    }
}

/// Reporting pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Collector endpoint. `None` means the protocol default.
    pub endpoint: Option<String>,

    /// OTLP transport.
    pub protocol: ExportProtocol,

    /// Extra headers sent with every export (credentials, tenant ids).
    pub headers: Vec<(String, String)>,

    /// Interval between periodic exports in milliseconds.
    pub export_interval_ms: u64,

    /// Upper bound for a single export in milliseconds.
    pub export_timeout_ms: u64,

    /// `service.name` used when the environment does not provide one.
    pub default_service_name: String,
}

impl TelemetryConfig {
    /// The endpoint the exporter will actually dial.
    pub fn resolved_endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.protocol.default_endpoint())
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            protocol: ExportProtocol::Grpc,
            headers: Vec::new(),
            export_interval_ms: 10_000,
            export_timeout_ms: 10_000,
            default_service_name: "cart-service".to_string(),
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long in-flight requests may keep running after a signal, in seconds.
    pub grace_period_secs: u64,

    /// Upper bound for flushing the reporting pipeline, in seconds.
    pub pipeline_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: 5,
            pipeline_timeout_secs: 5,
        }
    }
}

/// Artificial latency added by the demo handlers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Enable simulated delays.
    pub enabled: bool,

    /// `/ok` delay range in milliseconds, `[min, max)`.
    pub ok_delay_ms: (u64, u64),

    /// `/error` delay range in milliseconds, `[min, max)`.
    pub error_delay_ms: (u64, u64),
}

impl SimulationConfig {
    /// No artificial delays at all.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ok_delay_ms: (20, 170),
            error_delay_ms: (30, 230),
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human readable output for development.
    #[default]
    Pretty,
    /// One JSON object per line for log aggregation.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set.
    pub default_filter: String,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_filter: "cart_service=info,tower_http=info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}
