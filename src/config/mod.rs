//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! process environment (SERVER_ADDR, OTEL_*, ...)
//!     → loader.rs (overlay onto defaults)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → handed by value to each subsystem at startup
//! ```
//!
//! # Design Decisions
//! - No config file and no CLI flags; the environment is the only input
//! - All fields have defaults so an empty environment is a valid setup
//! - Validation separates parsing from semantic checks and reports all errors

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_from_env, load_from_lookup, ConfigError};
pub use schema::{
    ExportProtocol, ListenerConfig, LogFormat, LoggingConfig, ServiceConfig, ShutdownConfig,
    SimulationConfig, TelemetryConfig,
};
pub use validation::ValidationError;
