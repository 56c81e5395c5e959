//! Configuration loading from the process environment.

use percent_encoding::percent_decode_str;
use thiserror::Error;

use crate::config::schema::{ExportProtocol, LogFormat, ServiceConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Validation failed: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from environment variables.
pub fn load_from_env() -> Result<ServiceConfig, ConfigError> {
    load_from_lookup(|key| std::env::var(key).ok())
}

/// Load configuration from an arbitrary key lookup.
///
/// Unset and empty variables leave the default in place.
pub fn load_from_lookup<F>(lookup: F) -> Result<ServiceConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    let mut config = ServiceConfig::default();
    let mut errors = Vec::new();

    if let Some(addr) = get("SERVER_ADDR") {
        config.listener.bind_address = addr.trim().to_string();
    }

    // Telemetry: signal-specific variables win over the generic ones.
    let protocol = get("OTEL_EXPORTER_OTLP_METRICS_PROTOCOL")
        .map(|v| ("OTEL_EXPORTER_OTLP_METRICS_PROTOCOL", v))
        .or_else(|| get("OTEL_EXPORTER_OTLP_PROTOCOL").map(|v| ("OTEL_EXPORTER_OTLP_PROTOCOL", v)));
    if let Some((field, value)) = protocol {
        match ExportProtocol::from_env_value(&value) {
            Some(p) => config.telemetry.protocol = p,
            None => errors.push(ValidationError::new(
                field,
                value,
                "expected grpc or http/protobuf",
            )),
        }
    }

    if let Some(endpoint) = get("OTEL_EXPORTER_OTLP_METRICS_ENDPOINT") {
        config.telemetry.endpoint = Some(endpoint.trim().to_string());
    } else if let Some(endpoint) = get("OTEL_EXPORTER_OTLP_ENDPOINT") {
        config.telemetry.endpoint = Some(signal_endpoint(&endpoint, config.telemetry.protocol));
    }

    let headers = get("OTEL_EXPORTER_OTLP_METRICS_HEADERS")
        .map(|v| ("OTEL_EXPORTER_OTLP_METRICS_HEADERS", v))
        .or_else(|| get("OTEL_EXPORTER_OTLP_HEADERS").map(|v| ("OTEL_EXPORTER_OTLP_HEADERS", v)));
    if let Some((field, value)) = headers {
        match parse_headers(&value) {
            Ok(parsed) => config.telemetry.headers = parsed,
            Err(pair) => errors.push(ValidationError::new(field, pair, "expected key=value")),
        }
    }

    if let Some(service_name) = get("OTEL_SERVICE_NAME") {
        config.telemetry.default_service_name = service_name.trim().to_string();
    }

    if let Some(v) = parse_number(&get, "OTEL_METRIC_EXPORT_INTERVAL", &mut errors) {
        config.telemetry.export_interval_ms = v;
    }
    if let Some(v) = parse_number(&get, "OTEL_METRIC_EXPORT_TIMEOUT", &mut errors) {
        config.telemetry.export_timeout_ms = v;
    }
    if let Some(v) = parse_number(&get, "SHUTDOWN_GRACE_SECS", &mut errors) {
        config.shutdown.grace_period_secs = v;
    }
    if let Some(v) = parse_number(&get, "PIPELINE_SHUTDOWN_SECS", &mut errors) {
        config.shutdown.pipeline_timeout_secs = v;
    }

    if let Some(value) = get("SIMULATE_LATENCY") {
        match parse_bool(&value) {
            Some(enabled) => config.simulation.enabled = enabled,
            None => errors.push(ValidationError::new(
                "SIMULATE_LATENCY",
                value,
                "expected true or false",
            )),
        }
    }

    if let Some(value) = get("LOG_FORMAT") {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => config.logging.format = LogFormat::Pretty,
            "json" => config.logging.format = LogFormat::Json,
            _ => errors.push(ValidationError::new("LOG_FORMAT", value, "expected pretty or json")),
        }
    }

    if let Err(mut semantic) = validate_config(&config) {
        errors.append(&mut semantic);
    }

    if errors.is_empty() {
        Ok(config)
    } else {
        Err(ConfigError::Invalid(errors))
    }
}

/// Parse the OTLP `key=value,key2=value2` header list.
///
/// Keys and values are percent-decoded. Returns the first malformed pair on
/// error.
pub fn parse_headers(raw: &str) -> Result<Vec<(String, String)>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').ok_or_else(|| pair.to_string())?;
            let key = percent_decode(key.trim()).ok_or_else(|| pair.to_string())?;
            let value = percent_decode(value.trim()).ok_or_else(|| pair.to_string())?;
            if key.trim().is_empty() {
                return Err(pair.to_string());
            }
            Ok((key.trim().to_ascii_lowercase(), value))
        })
        .collect()
}

fn percent_decode(raw: &str) -> Option<String> {
    percent_decode_str(raw)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// Derive the metrics endpoint from the generic `OTEL_EXPORTER_OTLP_ENDPOINT`.
///
/// HTTP needs the `/v1/metrics` path appended; gRPC uses the base address.
fn signal_endpoint(base: &str, protocol: ExportProtocol) -> String {
    let base = base.trim();
    match protocol {
        ExportProtocol::Grpc => base.to_string(),
        ExportProtocol::HttpProtobuf => format!("{}/v1/metrics", base.trim_end_matches('/')),
    }
}

fn parse_number<G>(get: &G, key: &'static str, errors: &mut Vec<ValidationError>) -> Option<u64>
where
    G: Fn(&str) -> Option<String>,
{
    let value = get(key)?;
    match value.trim().parse::<u64>() {
        Ok(v) => Some(v),
        Err(_) => {
            errors.push(ValidationError::new(key, value, "expected a non-negative integer"));
            None
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
