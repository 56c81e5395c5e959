//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Listener → Pipeline → Registry + instruments → Serve
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs + startup.rs):
//!     Signal received → Stop accepting → Drain (bounded) → Flush pipeline (bounded) → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: bind first so a taken port fails before any exporter
//!   exists; connections queue until serving starts
//! - Ordered shutdown: server drains before the final metric flush
//! - Both drain and flush have deadlines; the process never hangs on exit

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{run, StartupError};
