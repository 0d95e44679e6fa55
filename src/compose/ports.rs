//! Service port normalization.
//!
//! Port declarations come in three shapes: a bare integer (`80`), a short
//! string (`"8080:80/udp"`) and the long mapping syntax. All of them are
//! parsed into a [`PortSpec`] and then accumulated into a [`PortList`], which
//! keeps at most one record per published `(protocol, published)` pair and at
//! most one unpublished record per `(protocol, target)` pair.

use crate::error::{RenderError, Result};
use regex_lite::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::LazyLock;

static PORT_STRING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?P<published>\d{1,5}):)?(?P<target>\d{1,5})(?:/(?P<protocol>[A-Za-z]+))?$")
        .expect("port pattern is a valid regex")
});

const MAPPING_KEYS: [&str; 5] = ["target", "published", "protocol", "mode", "name"];

/// Transport protocol of a port binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortProtocol {
    #[default]
    Tcp,
    Udp,
}

impl PortProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortProtocol::Tcp => "tcp",
            PortProtocol::Udp => "udp",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "tcp" => Some(PortProtocol::Tcp),
            "udp" => Some(PortProtocol::Udp),
            _ => None,
        }
    }
}

impl fmt::Display for PortProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network mode written on every canonical port. Only `awsvpc` exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortMode {
    #[default]
    Awsvpc,
}

/// Canonical port record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortSpec {
    pub protocol: PortProtocol,
    pub target: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<u16>,
    pub mode: PortMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl PortSpec {
    pub fn new(protocol: PortProtocol, target: u16, published: Option<u16>) -> Self {
        Self {
            protocol,
            target,
            published,
            mode: PortMode::Awsvpc,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name derived from protocol and target, e.g. `tcp_80`.
    pub fn default_name(&self) -> String {
        format!("{}_{}", self.protocol, self.target)
    }

    /// Convert to the document representation.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// What to do when a published port is declared again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortCollision {
    /// The later declaration's target replaces the earlier one.
    LastWins,
    /// The record already in the list is kept untouched.
    KeepExisting,
}

/// Working list of canonical ports for one service.
#[derive(Debug, Clone, Default)]
pub struct PortList {
    ports: Vec<PortSpec>,
}

impl PortList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one record, resolving collisions with records already present.
    pub fn add(&mut self, port: PortSpec, collision: PortCollision) {
        let Some(published) = port.published else {
            let duplicate = self
                .ports
                .iter()
                .any(|p| p.published.is_none() && p.protocol == port.protocol && p.target == port.target);
            if !duplicate {
                self.ports.push(port);
            }
            return;
        };

        let existing = self
            .ports
            .iter_mut()
            .find(|p| p.published == Some(published) && p.protocol == port.protocol);
        match (existing, collision) {
            (None, _) => self.ports.push(port),
            (Some(existing), PortCollision::LastWins) => {
                // The name travels with the target it describes.
                existing.target = port.target;
                existing.name = port.name;
            }
            (Some(_), PortCollision::KeepExisting) => {}
        }
    }

    pub fn extend(&mut self, ports: impl IntoIterator<Item = PortSpec>, collision: PortCollision) {
        for port in ports {
            self.add(port, collision);
        }
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Assign default names and return the canonical records.
    pub fn finish(self) -> Vec<PortSpec> {
        self.ports
            .into_iter()
            .map(|mut port| {
                if port.name.is_none() {
                    port.name = Some(port.default_name());
                }
                port
            })
            .collect()
    }
}

/// Parse one raw port declaration.
pub fn parse_port(raw: &Value) -> Result<PortSpec> {
    match raw {
        Value::Number(n) => {
            let target = n
                .as_u64()
                .and_then(|v| u16::try_from(v).ok())
                .ok_or_else(|| RenderError::invalid_port(n, "port must be an integer between 0 and 65535"))?;
            Ok(PortSpec::new(PortProtocol::Tcp, target, None))
        }
        Value::String(s) => parse_port_string(s),
        Value::Object(map) => parse_port_mapping(map),
        other => Err(RenderError::invalid_port(
            other,
            "ports must be integers, strings or mappings",
        )),
    }
}

fn parse_port_string(raw: &str) -> Result<PortSpec> {
    let caps = PORT_STRING_RE
        .captures(raw.trim())
        .ok_or_else(|| RenderError::invalid_port(raw, "expected [published:]target[/protocol]"))?;

    let protocol = match caps.name("protocol") {
        Some(m) => PortProtocol::from_str(m.as_str())
            .ok_or_else(|| RenderError::invalid_port(raw, format!("unknown protocol `{}`", m.as_str())))?,
        None => PortProtocol::Tcp,
    };
    let target = match caps.name("target") {
        Some(m) => port_number(raw, m.as_str())?,
        None => return Err(RenderError::invalid_port(raw, "missing target port")),
    };
    let published = caps
        .name("published")
        .map(|m| port_number(raw, m.as_str()))
        .transpose()?;

    Ok(PortSpec::new(protocol, target, published))
}

fn parse_port_mapping(map: &Map<String, Value>) -> Result<PortSpec> {
    let spec = || Value::Object(map.clone());

    if let Some(key) = map.keys().find(|k| !MAPPING_KEYS.contains(&k.as_str())) {
        return Err(RenderError::invalid_port(
            spec(),
            format!("unsupported key `{}`, valid keys are {}", key, MAPPING_KEYS.join(", ")),
        ));
    }

    let target = match map.get("target") {
        Some(v) => port_field(&spec(), "target", v)?,
        None => return Err(RenderError::invalid_port(spec(), "`target` is required")),
    };
    let published = match map.get("published") {
        None | Some(Value::Null) => None,
        Some(v) => Some(port_field(&spec(), "published", v)?),
    };
    let protocol = match map.get("protocol") {
        None | Some(Value::Null) => PortProtocol::Tcp,
        Some(Value::String(p)) => PortProtocol::from_str(p)
            .ok_or_else(|| RenderError::invalid_port(spec(), format!("unknown protocol `{}`", p)))?,
        Some(other) => {
            return Err(RenderError::invalid_port(
                spec(),
                format!("protocol must be a string, got {}", other),
            ));
        }
    };

    let mut port = PortSpec::new(protocol, target, published);
    match map.get("name") {
        None | Some(Value::Null) => {}
        Some(Value::String(name)) => port.name = Some(name.clone()),
        Some(other) => {
            return Err(RenderError::invalid_port(
                spec(),
                format!("name must be a string, got {}", other),
            ));
        }
    }
    Ok(port)
}

fn port_field(spec: &Value, field: &str, value: &Value) -> Result<u16> {
    let parsed = match value {
        Value::Number(n) => n.as_u64().and_then(|v| u16::try_from(v).ok()),
        Value::String(s) => s.trim().parse::<u16>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        RenderError::invalid_port(
            spec,
            format!("`{}` must be a port number between 0 and 65535, got {}", field, value),
        )
    })
}

fn port_number(raw: &str, digits: &str) -> Result<u16> {
    digits
        .parse::<u16>()
        .map_err(|_| RenderError::invalid_port(raw, format!("{} is out of range", digits)))
}

/// Parse and accumulate a raw port sequence. Later published declarations win.
pub fn normalize_ports(raw_ports: &[Value]) -> Result<Vec<PortSpec>> {
    let mut list = PortList::new();
    for raw in raw_ports {
        list.add(parse_port(raw)?, PortCollision::LastWins);
    }
    Ok(list.finish())
}

/// Merge two raw port sequences of the same service.
///
/// The override's ports are accumulated first; the original's ports are then
/// added without displacing any override binding.
pub fn merge_ports(original: &[Value], override_ports: &[Value]) -> Result<Vec<PortSpec>> {
    let mut list = PortList::new();
    for raw in override_ports {
        list.add(parse_port(raw)?, PortCollision::LastWins);
    }
    // Collisions within the original resolve on their own before the override is consulted.
    let mut original_list = PortList::new();
    for raw in original {
        original_list.add(parse_port(raw)?, PortCollision::LastWins);
    }
    list.extend(original_list.ports, PortCollision::KeepExisting);
    Ok(list.finish())
}

/// Convert canonical records back into document values.
pub fn ports_to_values(ports: &[PortSpec]) -> Result<Vec<Value>> {
    ports.iter().map(PortSpec::to_value).collect()
}
