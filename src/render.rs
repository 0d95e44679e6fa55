//! Render pipeline.
//!
//! Loads compose files in order and folds them into one document, normalizes
//! every service's ports, interpolates variables, validates the result and
//! emits it either as-is or wrapped in the CloudFormation macro envelope:
//!
//! ```yaml
//! Fn::Transform:
//!   Name: compose-x
//!   Parameters:
//!     Raw: <document>
//! ```

use crate::compose::{Document, IMAGE, MergePolicy, Merger, SERVICES, normalize_services_ports};
use crate::config::{DEFAULT_MACRO_NAME, Settings};
use crate::error::{RenderError, Result};
use crate::interpolation::{Interpolator, UndefinedVariables, VariableSource};
use crate::schema::SchemaValidator;
use serde_json::{Map, Value, json};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Key of the macro envelope.
pub const TRANSFORM_KEY: &str = "Fn::Transform";

/// Options for one render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Expand variable references (merge-time and final pass).
    pub interpolate: bool,
    /// How undefined variables are rendered.
    pub undefined: UndefinedVariables,
    /// Validate before emitting.
    pub validate: bool,
    /// Schema file; the embedded schema is used when `None`.
    pub schema: Option<PathBuf>,
    /// Name written in the macro envelope.
    pub macro_name: String,
    /// Set-semantics keys for sequence merges.
    pub merge: MergePolicy,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            interpolate: true,
            undefined: UndefinedVariables::default(),
            validate: true,
            schema: None,
            macro_name: DEFAULT_MACRO_NAME.to_string(),
            merge: MergePolicy::default(),
        }
    }
}

impl From<&Settings> for RenderOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            interpolate: true,
            undefined: settings.undefined_variables(),
            validate: settings.validate,
            schema: settings.schema.clone(),
            macro_name: settings.macro_name.clone(),
            merge: settings.merge.clone(),
        }
    }
}

/// Runs the render pipeline.
#[derive(Debug)]
pub struct Renderer {
    options: RenderOptions,
    interpolator: Interpolator,
}

impl Renderer {
    /// Renderer reading variables from the process environment.
    pub fn new(options: RenderOptions) -> Self {
        let interpolator = Interpolator::from_env().with_undefined(options.undefined);
        Self { options, interpolator }
    }

    /// Read variables from `source` instead of the process environment.
    pub fn with_variables(mut self, source: impl VariableSource + 'static) -> Self {
        self.interpolator = Interpolator::new(source).with_undefined(self.options.undefined);
        self
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Load, merge and render `files`, in order.
    pub fn render_files<P: AsRef<Path>>(&self, files: &[P]) -> Result<RenderedCompose> {
        let documents = files
            .iter()
            .map(|path| load_compose_file(path.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        self.render_documents(documents)
    }

    /// Merge and render already parsed documents, in order.
    pub fn render_documents(&self, documents: impl IntoIterator<Item = Document>) -> Result<RenderedCompose> {
        let mut documents = documents.into_iter();
        let mut definition = documents.next().ok_or(RenderError::NoInput)?;

        let merger = if self.options.interpolate {
            Merger::new(&self.options.merge).with_interpolator(&self.interpolator)
        } else {
            Merger::new(&self.options.merge)
        };
        for (index, override_doc) in documents.enumerate() {
            debug!(layer = index + 1, "Merging compose document");
            merger.merge_config_files(&mut definition, &override_doc)?;
        }

        normalize_services_ports(&mut definition)?;

        let mut definition = Value::Object(definition);
        if self.options.interpolate {
            self.interpolator.interpolate(&mut definition);
        }

        if self.options.validate {
            let validator = match self.options.schema {
                Some(ref path) => SchemaValidator::from_file(path)?,
                None => SchemaValidator::embedded()?,
            };
            validator.validate(&definition)?;
            debug!("Rendered document passed schema validation");
        }

        Ok(RenderedCompose {
            definition,
            macro_name: self.options.macro_name.clone(),
        })
    }
}

/// Read and parse one compose file.
pub fn load_compose_file(path: &Path) -> Result<Document> {
    let content = std::fs::read_to_string(path).map_err(|source| RenderError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "Loaded compose file");
    parse_compose_str(&content, path)
}

/// Parse compose YAML, resolving `<<` merge keys. `path` is only used in errors.
pub fn parse_compose_str(content: &str, path: &Path) -> Result<Document> {
    let parse_error = |source| RenderError::Parse {
        path: path.to_path_buf(),
        source,
    };
    let mut yaml: serde_yaml::Value = serde_yaml::from_str(content).map_err(parse_error)?;
    yaml.apply_merge().map_err(parse_error)?;
    stringify_keys(&mut yaml);
    let value: Value = serde_yaml::from_value(yaml).map_err(parse_error)?;

    match value {
        Value::Object(document) => Ok(document),
        Value::Null => Err(RenderError::InvalidDocument {
            path: path.to_path_buf(),
            reason: "file is empty".to_string(),
        }),
        other => Err(RenderError::InvalidDocument {
            path: path.to_path_buf(),
            reason: format!(
                "root must be a mapping, found a {}",
                crate::compose::kind_name(&other)
            ),
        }),
    }
}

/// Rewrite scalar mapping keys (`1:`, `true:`) as strings, recursively.
/// Tagged and collection keys are left for the conversion to reject.
fn stringify_keys(value: &mut serde_yaml::Value) {
    use serde_yaml::Value as Yaml;

    match value {
        Yaml::Mapping(mapping) => {
            for (key, mut item) in std::mem::take(mapping) {
                stringify_keys(&mut item);
                let key = match key {
                    Yaml::Bool(b) => Yaml::String(b.to_string()),
                    Yaml::Number(n) => Yaml::String(n.to_string()),
                    Yaml::Null => Yaml::String("null".to_string()),
                    other => other,
                };
                mapping.insert(key, item);
            }
        }
        Yaml::Sequence(items) => items.iter_mut().for_each(stringify_keys),
        Yaml::Tagged(tagged) => stringify_keys(&mut tagged.value),
        Yaml::Null | Yaml::Bool(_) | Yaml::Number(_) | Yaml::String(_) => {}
    }
}

/// Result of a successful render.
#[derive(Debug, Clone)]
pub struct RenderedCompose {
    definition: Value,
    macro_name: String,
}

impl RenderedCompose {
    /// The merged, normalized, interpolated document.
    pub fn definition(&self) -> &Value {
        &self.definition
    }

    pub fn into_definition(self) -> Value {
        self.definition
    }

    /// The value to emit, wrapped in the macro envelope when asked.
    pub fn output(&self, macro_mode: bool) -> Value {
        if macro_mode {
            json!({
                TRANSFORM_KEY: {
                    "Name": self.macro_name,
                    "Parameters": {"Raw": self.definition}
                }
            })
        } else {
            self.definition.clone()
        }
    }

    /// Emit as YAML.
    pub fn to_yaml(&self, macro_mode: bool) -> Result<String> {
        Ok(serde_yaml::to_string(&self.output(macro_mode))?)
    }

    /// Write YAML to `output`, or to stdout when `None`.
    pub fn write_output(&self, output: Option<&Path>, macro_mode: bool) -> Result<()> {
        let yaml = self.to_yaml(macro_mode)?;
        match output {
            Some(path) => {
                write_file(path, yaml.as_bytes())?;
                info!(path = %path.display(), "Wrote rendered compose file");
            }
            None => {
                let mut stdout = std::io::stdout().lock();
                stdout
                    .write_all(yaml.as_bytes())
                    .and_then(|_| stdout.flush())
                    .map_err(|source| RenderError::Write {
                        path: PathBuf::from("<stdout>"),
                        source,
                    })?;
            }
        }
        Ok(())
    }

    /// Image reference of every service declaring one, in service order.
    /// Services without an image are skipped with a warning.
    pub fn services_images(&self) -> Map<String, Value> {
        let mut images = Map::new();
        let Some(Value::Object(services)) = self.definition.get(SERVICES) else {
            return images;
        };
        for (name, service) in services {
            match service.get(IMAGE) {
                Some(Value::String(image)) => {
                    images.insert(name.clone(), Value::String(image.clone()));
                }
                _ => warn!(service = %name, "Service has no image defined, skipping"),
            }
        }
        images
    }

    /// Write the service → image mapping as pretty JSON.
    pub fn write_services_images(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.services_images())?;
        write_file(path, json.as_bytes())?;
        info!(path = %path.display(), "Wrote service images");
        Ok(())
    }
}

fn write_file(path: &Path, content: &[u8]) -> Result<()> {
    std::fs::write(path, content).map_err(|source| RenderError::Write {
        path: path.to_path_buf(),
        source,
    })
}
