//! Reporting pipeline: periodic OTLP export of everything the registry records.
//!
//! # Responsibilities
//! - Build the OTLP exporter (gRPC or HTTP/protobuf) from `TelemetryConfig`
//! - Attach resource attributes (service, host, process, OS)
//! - Run one periodic reader task on the Tokio runtime
//! - Flush and stop within a bounded time on shutdown
//!
//! # Design Decisions
//! - Export failures are reported by the SDK through `tracing` and dropped;
//!   the next tick exports fresh data, nothing is retried here
//! - Shutdown blocks on the SDK, so it runs on the blocking pool under a timeout

use std::collections::HashMap;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use opentelemetry::metrics::{Meter, MeterProvider as _};
use opentelemetry_otlp::{
    MetricExporter, Protocol, WithExportConfig, WithHttpConfig, WithTonicConfig,
};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::{runtime, Resource};
use thiserror::Error;
use tonic::metadata::MetadataMap;

use crate::config::{ExportProtocol, TelemetryConfig};
use crate::observability::resource::build_resource;

/// Errors raised by the reporting pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Exporter could not be built; fatal at startup.
    #[error("Invalid exporter configuration: {0}")]
    Configuration(String),

    /// A flush or final export failed; logged and skipped.
    #[error("Metric export failed: {0}")]
    Export(String),

    /// Shutdown did not finish in time; the process exits anyway.
    #[error("Pipeline shutdown timed out after {0:?}")]
    ShutdownTimeout(Duration),
}

/// Owner of the meter provider and its periodic export task.
pub struct ReportingPipeline {
    provider: SdkMeterProvider,
}

impl ReportingPipeline {
    /// Build the exporter and start periodic export.
    ///
    /// Must be called from inside a Tokio runtime.
    pub fn initialize(config: &TelemetryConfig) -> Result<Self, PipelineError> {
        let endpoint = config.resolved_endpoint().to_string();
        let timeout = Duration::from_millis(config.export_timeout_ms);

        let exporter = match config.protocol {
            ExportProtocol::Grpc => MetricExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint.clone())
                .with_timeout(timeout)
                .with_metadata(grpc_metadata(&config.headers)?)
                .build(),
            ExportProtocol::HttpProtobuf => MetricExporter::builder()
                .with_http()
                .with_protocol(Protocol::HttpBinary)
                .with_endpoint(endpoint.clone())
                .with_timeout(timeout)
                .with_headers(config.headers.iter().cloned().collect::<HashMap<_, _>>())
                .build(),
        }
        .map_err(|e| PipelineError::Configuration(e.to_string()))?;

        let reader = PeriodicReader::builder(exporter, runtime::Tokio)
            .with_interval(Duration::from_millis(config.export_interval_ms))
            .with_timeout(timeout)
            .build();

        let pipeline = Self::from_reader(reader, build_resource(&config.default_service_name));

        tracing::info!(
            endpoint = %endpoint,
            protocol = ?config.protocol,
            interval_ms = config.export_interval_ms,
            "Reporting pipeline started"
        );
        Ok(pipeline)
    }

    /// Wrap an already configured reader.
    pub fn from_reader(reader: PeriodicReader, resource: Resource) -> Self {
        let provider = SdkMeterProvider::builder()
            .with_reader(reader)
            .with_resource(resource)
            .build();
        Self { provider }
    }

    /// Meter bound to this pipeline.
    pub fn meter(&self, name: &'static str) -> Meter {
        self.provider.meter(name)
    }

    /// Export everything recorded so far.
    pub fn force_flush(&self) -> Result<(), PipelineError> {
        self.provider
            .force_flush()
            .map_err(|e| PipelineError::Export(e.to_string()))
    }

    /// Flush and stop the periodic export, waiting at most `timeout`.
    pub async fn shutdown(self, timeout: Duration) -> Result<(), PipelineError> {
        let provider = self.provider;
        let task = tokio::task::spawn_blocking(move || provider.shutdown());

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(Ok(()))) => {
                tracing::info!("Reporting pipeline stopped");
                Ok(())
            }
            Ok(Ok(Err(e))) => Err(PipelineError::Export(e.to_string())),
            Ok(Err(join)) => Err(PipelineError::Export(join.to_string())),
            Err(_) => Err(PipelineError::ShutdownTimeout(timeout)),
        }
    }
}

fn grpc_metadata(headers: &[(String, String)]) -> Result<MetadataMap, PipelineError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| PipelineError::Configuration(format!("header {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| PipelineError::Configuration(format!("header {name}: {e}")))?;
        map.insert(name, value);
    }
    Ok(MetadataMap::from_headers(map))
}
