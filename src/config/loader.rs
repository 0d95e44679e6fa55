//! Settings loader. Each tier is read as a [`SettingsOverlay`] and applied in order.

use super::types::{PROJECT_SETTINGS_FILE, Settings, SettingsOverlay};
use crate::error::{RenderError, Result};
use crate::interpolation::{ProcessEnv, VariableSource};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CONFIG_PATH_ENV: &str = "COMPOSE_RENDER_CONFIG_PATH";
pub const MACRO_NAME_ENV: &str = "COMPOSE_RENDER_MACRO_NAME";
pub const SCHEMA_ENV: &str = "COMPOSE_RENDER_SCHEMA";

/// Settings tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SettingsTier {
    /// Built-in defaults (lowest priority)
    Defaults = 0,
    /// `compose-render.yaml` in the working directory
    Project = 1,
    /// File passed with `--config` or `COMPOSE_RENDER_CONFIG_PATH`
    Explicit = 2,
    /// Environment variables (highest priority)
    Environment = 3,
}

impl std::fmt::Display for SettingsTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsTier::Defaults => write!(f, "defaults"),
            SettingsTier::Project => write!(f, "project"),
            SettingsTier::Explicit => write!(f, "explicit"),
            SettingsTier::Environment => write!(f, "environment"),
        }
    }
}

/// Files for each settings tier.
#[derive(Debug, Clone, Default)]
pub struct SettingsPaths {
    /// Project settings file, skipped when missing or malformed
    pub project_file: Option<PathBuf>,
    /// Explicit settings file, which must exist and parse
    pub explicit_file: Option<PathBuf>,
}

impl SettingsPaths {
    /// Discover settings files from the working directory and environment.
    pub fn discover(explicit: Option<PathBuf>) -> Self {
        Self::discover_with(explicit, &ProcessEnv)
    }

    /// Discover settings files, reading environment variables from `env`.
    pub fn discover_with(explicit: Option<PathBuf>, env: &dyn VariableSource) -> Self {
        let explicit_file = explicit.or_else(|| env.get(CONFIG_PATH_ENV).map(PathBuf::from));
        Self {
            project_file: Some(PathBuf::from(PROJECT_SETTINGS_FILE)),
            explicit_file,
        }
    }
}

/// Loads [`Settings`] from every tier.
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    pub paths: SettingsPaths,
    settings: Settings,
    /// Highest tier that contributed a value
    top_tier: SettingsTier,
}

impl SettingsLoader {
    /// Load settings using the process environment.
    pub fn load(paths: SettingsPaths) -> Result<Self> {
        Self::load_with_env(paths, &ProcessEnv)
    }

    /// Load settings reading environment overrides from `env`.
    pub fn load_with_env(paths: SettingsPaths, env: &dyn VariableSource) -> Result<Self> {
        let mut settings = Settings::default();
        let mut top_tier = SettingsTier::Defaults;

        if let Some(ref project_file) = paths.project_file {
            if project_file.exists() {
                match read_settings_file(project_file) {
                    Ok(overlay) => {
                        debug!(path = %project_file.display(), "Loaded project settings");
                        settings.apply(overlay);
                        top_tier = SettingsTier::Project;
                    }
                    Err(e) => warn!("Ignoring project settings {}: {}", project_file.display(), e),
                }
            }
        }

        if let Some(ref explicit_file) = paths.explicit_file {
            settings.apply(read_settings_file(explicit_file)?);
            debug!(path = %explicit_file.display(), "Loaded explicit settings");
            top_tier = SettingsTier::Explicit;
        }

        let env_overlay = env_overrides(env);
        if !env_overlay.is_empty() {
            settings.apply(env_overlay);
            top_tier = SettingsTier::Environment;
        }

        Ok(Self {
            paths,
            settings,
            top_tier,
        })
    }

    /// Get the loaded settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Highest tier that contributed to the settings.
    pub fn top_tier(&self) -> SettingsTier {
        self.top_tier
    }

    /// Consume the loader and return the settings.
    pub fn into_settings(self) -> Settings {
        self.settings
    }
}

fn read_settings_file(path: &Path) -> Result<SettingsOverlay> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| RenderError::Settings(format!("cannot read {}: {}", path.display(), e)))?;
    let parse_error = |e: serde_yaml::Error| RenderError::Settings(format!("cannot parse {}: {}", path.display(), e));
    let value: serde_yaml::Value = serde_yaml::from_str(&content).map_err(parse_error)?;
    match value {
        // An empty file contributes nothing.
        serde_yaml::Value::Null => Ok(SettingsOverlay::default()),
        serde_yaml::Value::Mapping(_) => serde_yaml::from_value(value).map_err(parse_error),
        other => Err(RenderError::Settings(format!(
            "{} must contain a mapping, found {}",
            path.display(),
            yaml_kind(&other)
        ))),
    }
}

fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Sequence(_) => "a sequence",
        serde_yaml::Value::Tagged(_) => "a tagged value",
        _ => "a scalar",
    }
}

fn env_overrides(env: &dyn VariableSource) -> SettingsOverlay {
    SettingsOverlay {
        macro_name: env.get(MACRO_NAME_ENV).filter(|v| !v.is_empty()),
        schema: env.get(SCHEMA_ENV).filter(|v| !v.is_empty()).map(PathBuf::from),
        ..SettingsOverlay::default()
    }
}
