//! Structured error types for the render pipeline.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A single schema violation reported by the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// JSON pointer to the offending value inside the document.
    pub path: String,
    /// Human readable description from the validator.
    pub message: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Errors raised while loading, merging, normalizing, validating or emitting
/// compose documents. Every variant is fatal for the pipeline.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The override value cannot be merged into the original value's kind.
    #[error("cannot merge `{key}`: original is a {original}, override is a {override_kind}")]
    MergeConflict {
        key: String,
        original: &'static str,
        override_kind: &'static str,
    },

    /// A port declaration does not follow `[published:]target[/protocol]`
    /// or the long mapping syntax.
    #[error("invalid port specification `{spec}`: {reason}")]
    InvalidPortSpec { spec: String, reason: String },

    /// The fully rendered document failed schema validation.
    #[error("schema validation failed:\n{}", format_violations(.violations))]
    SchemaValidation { violations: Vec<SchemaViolation> },

    /// The schema itself could not be compiled.
    #[error("invalid JSON schema: {0}")]
    InvalidSchema(String),

    /// The pipeline was given nothing to render.
    #[error("at least one compose file is required")]
    NoInput,

    /// The input parsed but is not a compose document.
    #[error("{}: {reason}", .path.display())]
    InvalidDocument { path: PathBuf, reason: String },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to emit YAML: {0}")]
    Emit(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Tool settings could not be loaded.
    #[error("settings error: {0}")]
    Settings(String),
}

impl RenderError {
    pub fn merge_conflict(key: &str, original: &'static str, override_kind: &'static str) -> Self {
        Self::MergeConflict {
            key: key.to_string(),
            original,
            override_kind,
        }
    }

    pub fn invalid_port(spec: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self::InvalidPortSpec {
            spec: spec.to_string(),
            reason: reason.into(),
        }
    }
}

fn format_violations(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("  - {}", v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Result type for render operations.
pub type Result<T> = std::result::Result<T, RenderError>;
