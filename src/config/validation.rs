//! Configuration validation.
//!
//! Serde and the loader handle syntax; this module checks that the values
//! make sense together. Every problem is reported, not just the first.

use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue};
use thiserror::Error;
use url::Url;

use crate::config::schema::ServiceConfig;

/// A single problem with a configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason} (got {value:?})")]
pub struct ValidationError {
    /// Environment variable or config path that holds the value.
    pub field: &'static str,
    /// Offending value as written.
    pub value: String,
    /// What is wrong with it.
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Check a fully assembled configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "SERVER_ADDR",
            &config.listener.bind_address,
            "not a socket address",
        ));
    }

    let endpoint = config.telemetry.resolved_endpoint();
    if let Err(reason) = check_endpoint(endpoint) {
        errors.push(ValidationError::new(
            "OTEL_EXPORTER_OTLP_ENDPOINT",
            endpoint,
            reason,
        ));
    }

    for (name, value) in &config.telemetry.headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                "OTEL_EXPORTER_OTLP_HEADERS",
                name,
                "invalid header name",
            ));
        }
        if HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::new(
                "OTEL_EXPORTER_OTLP_HEADERS",
                value,
                "invalid header value",
            ));
        }
    }

    if config.telemetry.export_interval_ms == 0 {
        errors.push(ValidationError::new(
            "OTEL_METRIC_EXPORT_INTERVAL",
            "0",
            "must be greater than zero",
        ));
    }
    if config.telemetry.export_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "OTEL_METRIC_EXPORT_TIMEOUT",
            "0",
            "must be greater than zero",
        ));
    }
    if config.shutdown.pipeline_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "PIPELINE_SHUTDOWN_SECS",
            "0",
            "must be greater than zero",
        ));
    }

    let sim = &config.simulation;
    if sim.enabled {
        for (field, (min, max)) in [("ok_delay_ms", sim.ok_delay_ms), ("error_delay_ms", sim.error_delay_ms)] {
            if min >= max {
                errors.push(ValidationError::new(
                    field,
                    format!("{min}..{max}"),
                    "range must be non-empty",
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_endpoint(endpoint: &str) -> Result<(), String> {
    let url = Url::parse(endpoint).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme {}", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&ServiceConfig::default()), Ok(()));
    }

    #[test]
    fn reports_every_problem() {
        let mut config = ServiceConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.telemetry.endpoint = Some("ftp://collector".into());
        config.telemetry.export_interval_ms = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "SERVER_ADDR",
                "OTEL_EXPORTER_OTLP_ENDPOINT",
                "OTEL_METRIC_EXPORT_INTERVAL"
            ]
        );
    }

    #[test]
    fn rejects_unparseable_endpoint() {
        let mut config = ServiceConfig::default();
        config.telemetry.endpoint = Some("collector:4317 with spaces".into());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_bad_header_name() {
        let mut config = ServiceConfig::default();
        config
            .telemetry
            .headers
            .push(("bad header".into(), "value".into()));
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].reason, "invalid header name");
    }

    #[test]
    fn empty_delay_range_only_matters_when_enabled() {
        let mut config = ServiceConfig::default();
        config.simulation.ok_delay_ms = (50, 50);
        assert!(validate_config(&config).is_err());

        config.simulation.enabled = false;
        assert!(validate_config(&config).is_ok());
    }
}
