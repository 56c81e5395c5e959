//! Cart service library: an instrumented HTTP service exporting OTLP metrics.

pub mod cart;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use cart::Cart;
pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
