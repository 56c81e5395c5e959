//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Bind the listener first; accept only once metrics are ready to record
//! - Shut down in reverse: drain HTTP, then flush the reporting pipeline
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The pipeline flush runs whether serving ended cleanly or not

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::cart::Cart;
use crate::config::{ConfigError, ServiceConfig};
use crate::http::{AppState, HttpServer, ServerError};
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics::register_service_metrics;
use crate::observability::{MetricRegistry, MetricsError, PipelineError, ReportingPipeline, METER_NAME};

/// Anything that stops the service from starting or running.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Run the service until SIGINT/SIGTERM.
pub async fn run(config: ServiceConfig) -> Result<(), StartupError> {
    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());
    run_until(config, shutdown).await
}

/// Run the service until `shutdown` is triggered.
pub async fn run_until(config: ServiceConfig, shutdown: Shutdown) -> Result<(), StartupError> {
    // Bind before the pipeline exists: dropping its meter provider runs a
    // final blocking export.
    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(ServerError::Bind)?;
    tracing::info!(
        address = %config.listener.bind_address,
        "Listening for connections"
    );

    let pipeline = ReportingPipeline::initialize(&config.telemetry)?;

    let registry = MetricRegistry::new(pipeline.meter(METER_NAME));
    let cart = Cart::new();
    let http_metrics = register_service_metrics(&registry, &cart)?;

    let server = HttpServer::new(
        AppState::new(cart, config.simulation.clone()),
        Arc::new(http_metrics),
        Duration::from_secs(config.shutdown.grace_period_secs),
    );
    let served = server.run(listener, shutdown.subscribe()).await;
    if let Err(e) = &served {
        tracing::error!(error = %e, "HTTP server failed");
    }

    let flush_timeout = Duration::from_secs(config.shutdown.pipeline_timeout_secs);
    match pipeline.shutdown(flush_timeout).await {
        Ok(()) => {}
        Err(e @ PipelineError::ShutdownTimeout(_)) => {
            tracing::warn!(error = %e, "Reporting pipeline did not stop in time")
        }
        Err(e) => tracing::warn!(error = %e, "Final metric export failed"),
    }
    drop(registry);

    served.map_err(StartupError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test(flavor = "multi_thread")]
    async fn taken_port_fails_without_waiting_on_the_collector() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();

        let mut config = ServiceConfig::default();
        config.listener.bind_address = taken.local_addr().unwrap().to_string();
        // Unroutable, so any export attempt would hang until its timeout.
        config.telemetry.endpoint = Some("http://10.255.255.1:4317".into());
        config.telemetry.export_timeout_ms = 10_000;

        let started = Instant::now();
        let err = run_until(config, Shutdown::new()).await.unwrap_err();

        assert!(matches!(err, StartupError::Server(ServerError::Bind(_))));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
