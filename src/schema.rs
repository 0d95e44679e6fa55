//! JSON Schema validation of rendered documents.
//!
//! The default schema ships inside the binary; a different one can be loaded
//! from disk. Validation reports every violation, not just the first.

use crate::error::{RenderError, Result, SchemaViolation};
use serde_json::Value;
use std::path::Path;

/// Schema embedded at build time.
pub const DEFAULT_SCHEMA: &str = include_str!("../schema/compose-spec.json");

/// A compiled schema.
pub struct SchemaValidator {
    validator: jsonschema::Validator,
}

impl SchemaValidator {
    /// Compile a schema document.
    pub fn new(schema: &Value) -> Result<Self> {
        let validator =
            jsonschema::validator_for(schema).map_err(|e| RenderError::InvalidSchema(e.to_string()))?;
        Ok(Self { validator })
    }

    /// Compile the embedded compose schema.
    pub fn embedded() -> Result<Self> {
        let schema: Value = serde_json::from_str(DEFAULT_SCHEMA)?;
        Self::new(&schema)
    }

    /// Load and compile a schema file (JSON or YAML).
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| RenderError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let schema: Value = serde_yaml::from_str(&content).map_err(|source| RenderError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(&schema)
    }

    /// Every violation of the schema by `instance`, empty when valid.
    pub fn violations(&self, instance: &Value) -> Vec<SchemaViolation> {
        self.validator
            .iter_errors(instance)
            .map(|error| SchemaViolation {
                path: error.instance_path.to_string(),
                message: error.to_string(),
            })
            .collect()
    }

    /// Fail with [`RenderError::SchemaValidation`] unless `instance` is valid.
    pub fn validate(&self, instance: &Value) -> Result<()> {
        let violations = self.violations(instance);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(RenderError::SchemaValidation { violations })
        }
    }
}

impl std::fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_embedded_schema_compiles() {
        SchemaValidator::embedded().unwrap();
    }

    #[test]
    fn test_valid_document() {
        let validator = SchemaValidator::embedded().unwrap();
        let doc = json!({
            "version": "3.8",
            "services": {
                "web": {
                    "image": "nginx",
                    "ports": [{"protocol": "tcp", "target": 80, "published": 80, "mode": "awsvpc", "name": "tcp_80"}],
                    "environment": {"A": "1", "B": 2},
                    "x-custom": {"anything": true}
                }
            },
            "volumes": {"data": null},
            "x-cluster": {"Use": "prod"}
        });
        validator.validate(&doc).unwrap();
    }

    #[test]
    fn test_invalid_document_reports_all_violations() {
        let validator = SchemaValidator::embedded().unwrap();
        let doc = json!({
            "servicez": {},
            "services": {"web": {"image": 42}}
        });
        let violations = validator.violations(&doc);
        assert!(violations.len() >= 2);
        assert!(violations.iter().any(|v| v.path == "/services/web/image"));
        assert!(matches!(
            validator.validate(&doc),
            Err(RenderError::SchemaValidation { .. })
        ));
    }

    #[test]
    fn test_raw_ports_rejected() {
        let validator = SchemaValidator::embedded().unwrap();
        let doc = json!({"services": {"web": {"ports": ["80:80"]}}});
        assert!(validator.validate(&doc).is_err());
    }

    #[test]
    fn test_invalid_schema() {
        let err = SchemaValidator::new(&json!({"type": 12})).unwrap_err();
        assert!(matches!(err, RenderError::InvalidSchema(_)));
    }
}
