//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! http middleware
//!     → metrics.rs (RequestRecorder → counter + histogram)
//! cart state
//!     → metrics.rs (cart.items gauge callback)
//! MetricRegistry meter
//!     → pipeline.rs (PeriodicReader → OTLP exporter → collector)
//!     → resource.rs (service / host / process / OS attributes)
//! every subsystem
//!     → logging.rs (tracing subscriber)
//! ```
//!
//! # Design Decisions
//! - Recording is lock-free and never waits on export
//! - Export runs on its own periodic task; failures only cost data points
//! - The meter is passed around explicitly instead of living in a global

pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod resource;

pub use metrics::{
    HttpMetrics, MetricRegistry, MetricsError, RecorderPtr, RequestLabels, RequestRecorder,
    METER_NAME,
};
pub use pipeline::{PipelineError, ReportingPipeline};
