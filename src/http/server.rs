//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the four service routes
//! - Instrument each route with the metrics middleware
//! - Wire up request ids and request tracing
//! - Serve until shutdown, then drain in-flight requests within a grace period

use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, http::Request, Router};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::cart::Cart;
use crate::config::SimulationConfig;
use crate::http::handlers;
use crate::http::middleware::instrument_route;
use crate::observability::RecorderPtr;

/// Errors raised while serving.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("Server task failed: {0}")]
    Task(String),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub cart: Cart,
    pub simulation: Arc<SimulationConfig>,
}

impl AppState {
    pub fn new(cart: Cart, simulation: SimulationConfig) -> Self {
        Self {
            cart,
            simulation: Arc::new(simulation),
        }
    }
}

/// HTTP server for the cart service.
pub struct HttpServer {
    router: Router,
    grace_period: Duration,
}

impl HttpServer {
    /// Create a server whose routes record into `recorder`.
    pub fn new(state: AppState, recorder: RecorderPtr, grace_period: Duration) -> Self {
        Self {
            router: Self::build_router(state, &recorder),
            grace_period,
        }
    }

    /// Build the Axum router with all middleware layers.
    pub fn build_router(state: AppState, recorder: &RecorderPtr) -> Router {
        Router::new()
            .route("/ok", instrument_route("/ok", handlers::ok, recorder))
            .route("/error", instrument_route("/error", handlers::error, recorder))
            .route("/cart/add", instrument_route("/cart/add", handlers::cart_add, recorder))
            .route("/cart/items", instrument_route("/cart/items", handlers::cart_items, recorder))
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// A copy of the router, for driving the service without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires, then drain.
    ///
    /// New connections stop immediately; in-flight requests get
    /// `grace_period` to finish before they are abandoned.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let Self {
            router,
            grace_period,
        } = self;
        let addr = listener.local_addr().map_err(ServerError::Bind)?;
        tracing::info!(address = %addr, "HTTP server starting");

        let (drain_tx, drain_rx) = oneshot::channel::<()>();
        let mut serving = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = drain_rx.await;
                })
                .await
        });

        tokio::select! {
            result = &mut serving => {
                // The server stopped without being asked to.
                return flatten(result);
            }
            _ = shutdown.recv() => {}
        }

        tracing::info!(grace_period = ?grace_period, "Draining in-flight requests");
        let _ = drain_tx.send(());

        match tokio::time::timeout(grace_period, &mut serving).await {
            Ok(result) => flatten(result)?,
            Err(_) => {
                serving.abort();
                tracing::warn!(
                    grace_period = ?grace_period,
                    "Grace period elapsed, abandoning in-flight requests"
                );
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn flatten(
    result: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), ServerError> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ServerError::Serve(e)),
        Err(e) => Err(ServerError::Task(e.to_string())),
    }
}
