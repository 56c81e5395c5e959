//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, request tracing)
//!     → middleware.rs (start timer)
//!     → handlers.rs (simulated work, cart updates)
//!     → middleware.rs (stop timer, record latency / errors)
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod server;

pub use middleware::{instrument_route, MetricsLayer, MetricsService};
pub use server::{AppState, HttpServer, ServerError};
