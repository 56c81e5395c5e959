//! Metric registry and HTTP request instruments.
//!
//! # Metrics
//! - `http.error_requests` (counter): 5xx responses by method, route, status
//! - `http.duration_ms` (histogram): request latency in milliseconds
//! - `cart.items` (observable gauge): current cart size, sampled per export
//!
//! # Design Decisions
//! - The registry wraps an injected `Meter`; there is no global provider
//! - Instrument names are unique per registry, duplicates are rejected
//! - Recording goes through the `RequestRecorder` trait so the middleware
//!   does not depend on the OpenTelemetry types

use std::sync::{Arc, Mutex};

use dashmap::DashSet;
use opentelemetry::metrics::{Counter, Histogram, Meter, ObservableGauge};
use opentelemetry::KeyValue;
use thiserror::Error;

use crate::cart::Cart;

/// Instrumentation scope name for every service instrument.
pub const METER_NAME: &str = "assignment-metrics";

pub const ERROR_REQUESTS: &str = "http.error_requests";
pub const REQUEST_DURATION_MS: &str = "http.duration_ms";
pub const CART_ITEMS: &str = "cart.items";

/// Errors raised while declaring instruments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricsError {
    #[error("instrument {0:?} is already registered")]
    DuplicateInstrument(String),
}

/// Process-wide set of named instruments bound to one meter.
pub struct MetricRegistry {
    meter: Meter,
    names: DashSet<String>,
    // Observable instruments stay registered while their handle is alive.
    gauges: Mutex<Vec<ObservableGauge<u64>>>,
}

impl MetricRegistry {
    pub fn new(meter: Meter) -> Self {
        Self {
            meter,
            names: DashSet::new(),
            gauges: Mutex::new(Vec::new()),
        }
    }

    fn claim(&self, name: &str) -> Result<(), MetricsError> {
        if self.names.insert(name.to_string()) {
            Ok(())
        } else {
            Err(MetricsError::DuplicateInstrument(name.to_string()))
        }
    }

    /// Declare a monotonic counter.
    pub fn declare_counter(
        &self,
        name: &'static str,
        description: &'static str,
    ) -> Result<Counter<u64>, MetricsError> {
        self.claim(name)?;
        Ok(self
            .meter
            .u64_counter(name)
            .with_description(description)
            .build())
    }

    /// Declare a histogram; buckets are left to the SDK defaults.
    pub fn declare_histogram(
        &self,
        name: &'static str,
        unit: &'static str,
        description: &'static str,
    ) -> Result<Histogram<f64>, MetricsError> {
        self.claim(name)?;
        Ok(self
            .meter
            .f64_histogram(name)
            .with_unit(unit)
            .with_description(description)
            .build())
    }

    /// Declare a gauge whose value is pulled from `callback` at every export.
    ///
    /// The callback runs on the export task and must not block.
    pub fn declare_async_gauge<F>(
        &self,
        name: &'static str,
        description: &'static str,
        callback: F,
    ) -> Result<(), MetricsError>
    where
        F: Fn() -> u64 + Send + Sync + 'static,
    {
        self.claim(name)?;
        let gauge = self
            .meter
            .u64_observable_gauge(name)
            .with_description(description)
            .with_callback(move |observer| observer.observe(callback(), &[]))
            .build();
        self.gauges
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(gauge);
        Ok(())
    }

    /// Whether an instrument with this name has been declared.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

/// Labels attached to every HTTP-derived measurement.
///
/// `route` is the declared route name, never the raw request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLabels {
    pub method: String,
    pub route: Arc<str>,
    pub status_code: u16,
}

impl RequestLabels {
    pub fn is_server_error(&self) -> bool {
        self.status_code >= 500
    }

    pub fn to_attributes(&self) -> [KeyValue; 3] {
        [
            KeyValue::new("http.method", self.method.clone()),
            KeyValue::new("http.route", self.route.to_string()),
            KeyValue::new("http.status_code", i64::from(self.status_code)),
        ]
    }
}

/// Sink for per-request measurements.
pub trait RequestRecorder: Send + Sync + 'static {
    /// Record one latency observation in milliseconds.
    fn record_latency(&self, labels: &RequestLabels, elapsed_ms: f64);

    /// Count one failed (5xx) request.
    fn record_error(&self, labels: &RequestLabels);
}

/// Shared handle to whichever recorder the service runs with.
pub type RecorderPtr = Arc<dyn RequestRecorder>;

/// OpenTelemetry-backed request instruments.
#[derive(Clone)]
pub struct HttpMetrics {
    error_requests: Counter<u64>,
    duration_ms: Histogram<f64>,
}

impl HttpMetrics {
    /// Declare the request instruments on `registry`.
    pub fn register(registry: &MetricRegistry) -> Result<Self, MetricsError> {
        let error_requests =
            registry.declare_counter(ERROR_REQUESTS, "Count of HTTP 5xx responses")?;
        let duration_ms = registry.declare_histogram(
            REQUEST_DURATION_MS,
            "ms",
            "HTTP request latency in milliseconds",
        )?;
        Ok(Self {
            error_requests,
            duration_ms,
        })
    }
}

impl RequestRecorder for HttpMetrics {
    fn record_latency(&self, labels: &RequestLabels, elapsed_ms: f64) {
        self.duration_ms.record(elapsed_ms, &labels.to_attributes());
    }

    fn record_error(&self, labels: &RequestLabels) {
        self.error_requests.add(1, &labels.to_attributes());
    }
}

/// Register the `cart.items` gauge, sampling `cart` at every export.
pub fn register_cart_gauge(registry: &MetricRegistry, cart: &Cart) -> Result<(), MetricsError> {
    let cart = cart.clone();
    registry.declare_async_gauge(CART_ITEMS, "Current number of items in cart", move || {
        cart.items()
    })
}

/// Declare every service instrument and return the request recorder.
pub fn register_service_metrics(
    registry: &MetricRegistry,
    cart: &Cart,
) -> Result<HttpMetrics, MetricsError> {
    let http = HttpMetrics::register(registry)?;
    register_cart_gauge(registry, cart)?;
    Ok(http)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::metrics::MeterProvider as _;
    use opentelemetry_sdk::metrics::data::{Gauge, Histogram, Metric, ResourceMetrics, Sum};
    use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
    use opentelemetry_sdk::runtime;
    use opentelemetry_sdk::testing::metrics::InMemoryMetricExporter;

    fn registry() -> (SdkMeterProvider, MetricRegistry) {
        let provider = SdkMeterProvider::default();
        let registry = MetricRegistry::new(provider.meter(METER_NAME));
        (provider, registry)
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let (_provider, registry) = registry();
        registry.declare_counter("requests", "first").unwrap();

        let err = registry
            .declare_histogram("requests", "ms", "second")
            .unwrap_err();
        assert_eq!(err, MetricsError::DuplicateInstrument("requests".into()));
    }

    #[test]
    fn service_metrics_register_once() {
        let (_provider, registry) = registry();
        let cart = Cart::new();
        register_service_metrics(&registry, &cart).unwrap();

        assert!(registry.contains(ERROR_REQUESTS));
        assert!(registry.contains(REQUEST_DURATION_MS));
        assert!(registry.contains(CART_ITEMS));
        assert!(register_service_metrics(&registry, &cart).is_err());
    }

    #[test]
    fn recording_without_reader_is_harmless() {
        let (_provider, registry) = registry();
        let http = HttpMetrics::register(&registry).unwrap();
        let labels = RequestLabels {
            method: "GET".into(),
            route: Arc::from("/error"),
            status_code: 500,
        };
        http.record_latency(&labels, 12.0);
        http.record_error(&labels);
    }

    fn find<'a>(batches: &'a [ResourceMetrics], name: &str) -> &'a Metric {
        batches
            .iter()
            .rev()
            .flat_map(|batch| batch.scope_metrics.iter())
            .flat_map(|scope| scope.metrics.iter())
            .find(|metric| metric.name == name)
            .unwrap_or_else(|| panic!("{name} was not exported"))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn service_metrics_reach_the_exporter() {
        let exporter = InMemoryMetricExporter::default();
        let reader = PeriodicReader::builder(exporter.clone(), runtime::Tokio).build();
        let provider = SdkMeterProvider::builder().with_reader(reader).build();
        let registry = MetricRegistry::new(provider.meter(METER_NAME));

        let cart = Cart::new();
        let http = register_service_metrics(&registry, &cart).unwrap();
        cart.add(3);
        cart.add(4);

        let failed = RequestLabels {
            method: "GET".into(),
            route: Arc::from("/error"),
            status_code: 500,
        };
        http.record_latency(&failed, 42.0);
        http.record_error(&failed);

        tokio::task::block_in_place(|| provider.force_flush()).unwrap();
        let batches = exporter.get_finished_metrics().unwrap();

        let expected = failed.to_attributes();

        let duration = find(&batches, REQUEST_DURATION_MS);
        assert_eq!(duration.unit, "ms");
        let histogram = duration
            .data
            .as_any()
            .downcast_ref::<Histogram<f64>>()
            .unwrap();
        assert_eq!(histogram.data_points.len(), 1);
        let point = &histogram.data_points[0];
        assert_eq!(point.count, 1);
        assert_eq!(point.sum, 42.0);
        for kv in &expected {
            assert!(point.attributes.contains(kv), "missing {kv:?}");
        }

        let errors = find(&batches, ERROR_REQUESTS)
            .data
            .as_any()
            .downcast_ref::<Sum<u64>>()
            .unwrap();
        assert_eq!(errors.data_points.len(), 1);
        assert_eq!(errors.data_points[0].value, 1);
        for kv in &expected {
            assert!(errors.data_points[0].attributes.contains(kv), "missing {kv:?}");
        }

        let items = find(&batches, CART_ITEMS)
            .data
            .as_any()
            .downcast_ref::<Gauge<u64>>()
            .unwrap();
        assert_eq!(items.data_points[0].value, cart.items());
        assert_eq!(items.data_points[0].value, 7);

        let _ = tokio::task::block_in_place(|| provider.shutdown());
    }

    #[test]
    fn labels_map_to_attributes() {
        let labels = RequestLabels {
            method: "GET".into(),
            route: Arc::from("/cart/add"),
            status_code: 200,
        };
        let attrs = labels.to_attributes();
        assert_eq!(attrs[0], KeyValue::new("http.method", "GET"));
        assert_eq!(attrs[1], KeyValue::new("http.route", "/cart/add"));
        assert_eq!(attrs[2], KeyValue::new("http.status_code", 200i64));
        assert!(!labels.is_server_error());
    }
}
