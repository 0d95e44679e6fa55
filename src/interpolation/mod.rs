//! Environment variable interpolation.
//!
//! [`expand`] implements the substitution grammar on a single string and
//! [`Interpolator`] walks a whole document, rewriting every string leaf.
//! Variables are looked up through a [`VariableSource`] so tests can supply
//! their own values instead of touching the process environment.

mod expand;

pub use expand::expand;

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Lookup of variable values by name.
pub trait VariableSource {
    fn get(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl VariableSource for ProcessEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl VariableSource for HashMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        HashMap::get(self, name).cloned()
    }
}

impl VariableSource for BTreeMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        BTreeMap::get(self, name).cloned()
    }
}

/// How references to undefined variables are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UndefinedVariables {
    /// Substitute the empty string.
    #[default]
    Empty,
    /// Leave the reference as written for a downstream consumer.
    Keep,
}

impl UndefinedVariables {
    fn default_value(self) -> Option<&'static str> {
        match self {
            UndefinedVariables::Empty => Some(""),
            UndefinedVariables::Keep => None,
        }
    }
}

/// Expands variable references against one source.
pub struct Interpolator {
    source: Box<dyn VariableSource>,
    undefined: UndefinedVariables,
}

impl Interpolator {
    pub fn new(source: impl VariableSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            undefined: UndefinedVariables::default(),
        }
    }

    /// Interpolator reading the process environment.
    pub fn from_env() -> Self {
        Self::new(ProcessEnv)
    }

    pub fn with_undefined(mut self, undefined: UndefinedVariables) -> Self {
        self.undefined = undefined;
        self
    }

    pub fn undefined(&self) -> UndefinedVariables {
        self.undefined
    }

    /// Expand one string.
    pub fn expand(&self, text: &str, skip_escaped: bool) -> String {
        expand(text, self.source.as_ref(), self.undefined.default_value(), skip_escaped)
    }

    /// Rewrite every string leaf of `value` in place, escapes included.
    pub fn interpolate(&self, value: &mut Value) {
        match value {
            Value::String(s) => {
                if s.contains('$') {
                    *s = self.expand(s, true);
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.interpolate(item);
                }
            }
            Value::Object(map) => {
                for (_, item) in map.iter_mut() {
                    self.interpolate(item);
                }
            }
            Value::Null | Value::Bool(_) | Value::Number(_) => {}
        }
    }
}

impl std::fmt::Debug for Interpolator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpolator")
            .field("undefined", &self.undefined)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn interpolator() -> Interpolator {
        Interpolator::new(HashMap::from([
            ("TAG".to_string(), "2.0".to_string()),
            ("PORT".to_string(), "8080".to_string()),
        ]))
    }

    #[test]
    fn test_interpolate_walks_whole_tree() {
        let mut doc = json!({
            "services": {
                "web": {
                    "image": "nginx:${TAG}",
                    "ports": ["${PORT}:80", {"target": 80}],
                    "environment": [{"A": "$$literal"}, ["$TAG"]],
                    "replicas": 2,
                    "enabled": true
                }
            }
        });
        interpolator().interpolate(&mut doc);
        assert_eq!(
            doc,
            json!({
                "services": {
                    "web": {
                        "image": "nginx:2.0",
                        "ports": ["8080:80", {"target": 80}],
                        "environment": [{"A": "$literal"}, ["2.0"]],
                        "replicas": 2,
                        "enabled": true
                    }
                }
            })
        );
    }

    #[test]
    fn test_keep_undefined_mode() {
        let interp = interpolator().with_undefined(UndefinedVariables::Keep);
        let mut doc = json!({"a": "${MISSING}-$TAG", "b": "${MISSING:-x}"});
        interp.interpolate(&mut doc);
        assert_eq!(doc, json!({"a": "${MISSING}-2.0", "b": "x"}));
    }

    #[test]
    fn test_empty_mode_blanks_undefined() {
        let mut doc = json!({"a": "${MISSING}-$TAG"});
        interpolator().interpolate(&mut doc);
        assert_eq!(doc, json!({"a": "-2.0"}));
    }

    #[test]
    fn test_keys_are_not_interpolated() {
        let mut doc = json!({"$TAG": "v"});
        interpolator().interpolate(&mut doc);
        assert_eq!(doc, json!({"$TAG": "v"}));
    }
}
