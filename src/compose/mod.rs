//! Compose document model and the merge/normalization core.
//!
//! A compose document is kept as a [`serde_json::Value`] with ordered maps, so
//! keys come out of a render in the order they went in. The top level holds a
//! `services` section plus any number of resource sections (`volumes`,
//! `secrets`, `networks`, `x-*` extensions, ...). Unknown keys pass through.

mod lists;
mod merge;
mod ports;

pub use lists::handle_lists_merges;
pub use merge::{MergePolicy, Merger};
pub use ports::{
    PortCollision, PortList, PortMode, PortProtocol, PortSpec, merge_ports, normalize_ports, parse_port,
    ports_to_values,
};

use crate::error::{RenderError, Result};
use serde_json::{Map, Value};
use tracing::debug;

/// A parsed compose file. The root is always a mapping.
pub type Document = Map<String, Value>;

pub const SERVICES: &str = "services";
pub const PORTS: &str = "ports";
pub const IMAGE: &str = "image";
pub const VOLUMES: &str = "volumes";
pub const SECRETS: &str = "secrets";

/// Name of a value's kind, used in error messages.
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

/// Whether a key holds something worth merging into.
///
/// Null, empty mappings, empty sequences and empty strings count as unset.
pub fn is_set(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Replace every service's `ports` with its canonical port records.
///
/// Services without ports (or with an empty list) are left alone.
pub fn normalize_services_ports(document: &mut Document) -> Result<()> {
    let Some(Value::Object(services)) = document.get_mut(SERVICES) else {
        return Ok(());
    };
    for (name, service) in services.iter_mut() {
        let Value::Object(service) = service else {
            continue;
        };
        match service.get_mut(PORTS) {
            Some(Value::Array(raw)) if !raw.is_empty() => {
                let ports = normalize_ports(raw)?;
                debug!(service = %name, count = ports.len(), "Normalized service ports");
                *raw = ports_to_values(&ports)?;
            }
            Some(Value::Array(_)) | Some(Value::Null) | None => {}
            Some(other) => {
                return Err(RenderError::invalid_port(
                    other.clone(),
                    format!("ports of service `{}` must be a sequence", name),
                ));
            }
        }
    }
    Ok(())
}
