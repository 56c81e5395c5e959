//! Cart service
//!
//! A small HTTP service whose every route is instrumented and whose
//! measurements are exported over OTLP.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id ─▶ trace ─▶ metrics middleware ─▶ handler
//!                                                │                    │
//!                                                │ latency / errors   │ cart add / read
//!                                                ▼                    ▼
//!                                         MetricRegistry ◀──────── Cart (atomic)
//!                                                │        cart.items gauge
//!                                                ▼
//!                                      ReportingPipeline (every 10s)
//!                                                │ OTLP (gRPC or HTTP)
//!                                                ▼
//!                                            Collector
//! ```
//!
//! Configuration comes from the environment only (see `config::loader`).

use std::process::ExitCode;

use cart_service::config;
use cart_service::lifecycle::{self, StartupError};
use cart_service::observability::logging::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let loaded = config::load_from_env();

    let logging = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    if let Err(e) = init_logging(&logging) {
        eprintln!("failed to install log subscriber: {e}");
    }

    tracing::info!("cart-service v{} starting", env!("CARGO_PKG_VERSION"));

    let config = match loaded.map_err(StartupError::from) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        endpoint = %config.telemetry.resolved_endpoint(),
        protocol = ?config.telemetry.protocol,
        export_interval_ms = config.telemetry.export_interval_ms,
        grace_period_secs = config.shutdown.grace_period_secs,
        "Configuration loaded"
    );

    match lifecycle::run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}
