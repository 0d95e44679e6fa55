//! Settings types.

use crate::compose::MergePolicy;
use crate::interpolation::UndefinedVariables;
use serde::Deserialize;
use std::path::PathBuf;

/// Default name of the CloudFormation macro wrapping the output.
pub const DEFAULT_MACRO_NAME: &str = "compose-x";

/// File name looked up in the working directory for project settings.
pub const PROJECT_SETTINGS_FILE: &str = "compose-render.yaml";

/// Settings controlling a render.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// `Name` of the `Fn::Transform` envelope written in macro mode.
    #[serde(default = "default_macro_name")]
    pub macro_name: String,

    /// JSON Schema file to validate against instead of the embedded one.
    #[serde(default)]
    pub schema: Option<PathBuf>,

    /// Validate the rendered document before emitting it (default: true).
    #[serde(default = "default_validate")]
    pub validate: bool,

    /// Leave references to undefined variables as written (default: false).
    #[serde(default)]
    pub keep_undefined: bool,

    /// Sequence keys merged with set semantics.
    #[serde(default)]
    pub merge: MergePolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            macro_name: default_macro_name(),
            schema: None,
            validate: default_validate(),
            keep_undefined: false,
            merge: MergePolicy::default(),
        }
    }
}

impl Settings {
    pub fn undefined_variables(&self) -> UndefinedVariables {
        if self.keep_undefined {
            UndefinedVariables::Keep
        } else {
            UndefinedVariables::Empty
        }
    }

    /// Apply a higher tier on top of these settings.
    pub fn apply(&mut self, overlay: SettingsOverlay) {
        if let Some(macro_name) = overlay.macro_name {
            self.macro_name = macro_name;
        }
        if let Some(schema) = overlay.schema {
            self.schema = Some(schema);
        }
        if let Some(validate) = overlay.validate {
            self.validate = validate;
        }
        if let Some(keep_undefined) = overlay.keep_undefined {
            self.keep_undefined = keep_undefined;
        }
        if let Some(keys) = overlay.merge.resource_uniqify_keys {
            self.merge.resource_uniqify_keys = keys;
        }
        if let Some(keys) = overlay.merge.service_uniqify_keys {
            self.merge.service_uniqify_keys = keys;
        }
    }
}

/// One tier's contribution. Fields left out keep the value from lower tiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SettingsOverlay {
    pub macro_name: Option<String>,
    pub schema: Option<PathBuf>,
    pub validate: Option<bool>,
    pub keep_undefined: Option<bool>,
    #[serde(default)]
    pub merge: MergePolicyOverlay,
}

/// Partial [`MergePolicy`]; a list given here replaces the lower tier's list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MergePolicyOverlay {
    pub resource_uniqify_keys: Option<Vec<String>>,
    pub service_uniqify_keys: Option<Vec<String>>,
}

impl SettingsOverlay {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn default_macro_name() -> String {
    DEFAULT_MACRO_NAME.to_string()
}

fn default_validate() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_gives_defaults() {
        let settings: Settings = serde_yaml::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.macro_name, "compose-x");
        assert!(settings.validate);
        assert_eq!(settings.undefined_variables(), UndefinedVariables::Empty);
    }

    #[test]
    fn test_overlay_only_touches_given_fields() {
        let mut settings = Settings {
            schema: Some(PathBuf::from("base.json")),
            ..Settings::default()
        };
        let overlay: SettingsOverlay =
            serde_yaml::from_str("validate: false\nschema: null\nmerge:\n  resource_uniqify_keys: []\n").unwrap();
        settings.apply(overlay);

        assert!(!settings.validate);
        assert_eq!(settings.macro_name, DEFAULT_MACRO_NAME);
        assert_eq!(settings.schema, Some(PathBuf::from("base.json")));
        assert!(settings.merge.resource_uniqify_keys.is_empty());
        assert_eq!(
            settings.merge.service_uniqify_keys,
            MergePolicy::default_service_uniqify_keys()
        );
    }

    #[test]
    fn test_empty_overlay() {
        let overlay: SettingsOverlay = serde_yaml::from_str("{}").unwrap();
        assert!(overlay.is_empty());
        let mut settings = Settings::default();
        settings.apply(overlay);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_partial_merge_policy_keeps_other_defaults() {
        let settings: Settings = serde_yaml::from_str(
            "keep_undefined: true\nmerge:\n  service_uniqify_keys: [volumes]\n",
        )
        .unwrap();
        assert_eq!(settings.merge.service_uniqify_keys, vec!["volumes".to_string()]);
        assert_eq!(
            settings.merge.resource_uniqify_keys,
            MergePolicy::default_resource_uniqify_keys()
        );
        assert_eq!(settings.undefined_variables(), UndefinedVariables::Keep);
    }
}
