//! Resource attributes attached to every exported batch.
//!
//! The SDK default resource already covers `OTEL_SERVICE_NAME` and
//! `OTEL_RESOURCE_ATTRIBUTES`. Host, process and OS attributes are added here
//! from local introspection.

use opentelemetry::{Key, KeyValue, Value};
use opentelemetry_sdk::Resource;

const SERVICE_NAME: &str = "service.name";

/// Build the resource for the reporting pipeline.
///
/// `default_service_name` is only used when the environment left the SDK
/// with its `unknown_service` placeholder.
pub fn build_resource(default_service_name: &str) -> Resource {
    let from_env = Resource::default();
    let mut attributes = host_attributes();
    attributes.extend(process_attributes());
    attributes.extend(os_attributes());

    if needs_service_name(from_env.get(Key::from_static_str(SERVICE_NAME))) {
        attributes.push(KeyValue::new(SERVICE_NAME, default_service_name.to_string()));
    }

    from_env.merge(&Resource::new(attributes))
}

fn needs_service_name(current: Option<Value>) -> bool {
    match current {
        Some(value) => value.as_str().starts_with("unknown_service"),
        None => true,
    }
}

fn host_attributes() -> Vec<KeyValue> {
    let mut attributes = vec![KeyValue::new("host.arch", std::env::consts::ARCH)];
    if let Some(name) = hostname() {
        attributes.push(KeyValue::new("host.name", name));
    }
    attributes
}

fn hostname() -> Option<String> {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/proc/sys/kernel/hostname").ok())
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

fn process_attributes() -> Vec<KeyValue> {
    let mut attributes = vec![
        KeyValue::new("process.pid", i64::from(std::process::id())),
        KeyValue::new("process.runtime.name", "rust"),
    ];
    if let Ok(exe) = std::env::current_exe() {
        if let Some(name) = exe.file_name().and_then(|n| n.to_str()) {
            attributes.push(KeyValue::new("process.executable.name", name.to_string()));
        }
        attributes.push(KeyValue::new(
            "process.executable.path",
            exe.display().to_string(),
        ));
    }
    let args: Vec<String> = std::env::args().collect();
    if !args.is_empty() {
        attributes.push(KeyValue::new("process.command_line", args.join(" ")));
    }
    attributes
}

fn os_attributes() -> Vec<KeyValue> {
    vec![
        KeyValue::new("os.type", std::env::consts::OS),
        KeyValue::new("os.family", std::env::consts::FAMILY),
    ]
}
