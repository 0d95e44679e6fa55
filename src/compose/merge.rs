//! Compose document merging.
//!
//! Applies an override document on top of an original one:
//! - Mappings present on both sides are merged recursively
//! - Keys only the override has are copied in
//! - Sequences are combined with [`handle_lists_merges`], as a set for the
//!   keys listed in the [`MergePolicy`]
//! - Service `ports` go through the port accumulation rules instead
//! - Strings are interpolated as they are taken from the override
//! - Any other value replaces the original one

use super::lists::handle_lists_merges;
use super::ports::{merge_ports, ports_to_values};
use super::{Document, PORTS, SECRETS, SERVICES, VOLUMES, is_set, kind_name};
use crate::error::{RenderError, Result};
use crate::interpolation::Interpolator;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, trace};

/// Sequence keys merged with set semantics, per merge context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePolicy {
    /// Keys deduplicated inside top-level resource sections.
    #[serde(default = "MergePolicy::default_resource_uniqify_keys")]
    pub resource_uniqify_keys: Vec<String>,

    /// Keys deduplicated inside service definitions.
    #[serde(default = "MergePolicy::default_service_uniqify_keys")]
    pub service_uniqify_keys: Vec<String>,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            resource_uniqify_keys: Self::default_resource_uniqify_keys(),
            service_uniqify_keys: Self::default_service_uniqify_keys(),
        }
    }
}

impl MergePolicy {
    pub fn default_resource_uniqify_keys() -> Vec<String> {
        [VOLUMES, SECRETS, "ManagedPolicyArns", "Sources"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    pub fn default_service_uniqify_keys() -> Vec<String> {
        let mut keys = Self::default_resource_uniqify_keys();
        keys.extend(
            ["configs", "depends_on", "cap_add", "cap_drop", "security_opt"]
                .into_iter()
                .map(String::from),
        );
        keys
    }

    fn uniqify(&self, scope: Scope, key: &str) -> bool {
        let keys = match scope {
            Scope::Resource => &self.resource_uniqify_keys,
            Scope::Service | Scope::ServiceNested => &self.service_uniqify_keys,
        };
        keys.iter().any(|k| k == key)
    }
}

/// Where in the document a merge is happening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// Inside a top-level section other than `services`.
    Resource,
    /// Directly inside one service definition.
    Service,
    /// Deeper inside a service definition.
    ServiceNested,
}

impl Scope {
    fn nested(self) -> Self {
        match self {
            Scope::Resource => Scope::Resource,
            Scope::Service | Scope::ServiceNested => Scope::ServiceNested,
        }
    }
}

/// Merges compose documents according to a [`MergePolicy`].
#[derive(Debug, Clone, Copy)]
pub struct Merger<'a> {
    policy: &'a MergePolicy,
    interpolator: Option<&'a Interpolator>,
}

impl<'a> Merger<'a> {
    pub fn new(policy: &'a MergePolicy) -> Self {
        Self {
            policy,
            interpolator: None,
        }
    }

    /// Interpolate override strings as they are merged in.
    pub fn with_interpolator(mut self, interpolator: &'a Interpolator) -> Self {
        self.interpolator = Some(interpolator);
        self
    }

    /// Merge `override_doc` over a copy of `original`, leaving both untouched.
    pub fn merge(&self, original: &Document, override_doc: &Document) -> Result<Document> {
        let mut merged = original.clone();
        self.merge_config_files(&mut merged, override_doc)?;
        Ok(merged)
    }

    /// Merge `override_doc` into `original` in place.
    ///
    /// `services` sections are merged service by service; other sections
    /// present as mappings on both sides are merged recursively; sections
    /// unset in `original` are copied from `override_doc`.
    pub fn merge_config_files(&self, original: &mut Document, override_doc: &Document) -> Result<()> {
        for (key, override_value) in override_doc {
            if override_value.is_null() {
                continue;
            }
            if !is_set(original.get(key)) {
                original.insert(key.clone(), override_value.clone());
                continue;
            }

            if key == SERVICES {
                match (original.get_mut(key), override_value) {
                    (Some(Value::Object(services)), Value::Object(override_services)) => {
                        self.merge_services(services, override_services)?;
                    }
                    (Some(existing), _) => {
                        return Err(RenderError::merge_conflict(
                            key,
                            kind_name(existing),
                            kind_name(override_value),
                        ));
                    }
                    (None, _) => {}
                }
                continue;
            }

            if let Some(Value::Object(_)) = original.get(key) {
                if !override_value.is_object() {
                    return Err(RenderError::merge_conflict(key, "mapping", kind_name(override_value)));
                }
            }
            self.merge_entry(original, key, override_value, Scope::Resource)?;
        }
        Ok(())
    }

    /// Merge one resource definition (a mapping under a top-level section).
    pub fn merge_definitions(&self, original: &mut Map<String, Value>, override_def: &Map<String, Value>) -> Result<()> {
        self.merge_mappings(original, override_def, Scope::Resource)
    }

    /// Merge one service definition into another.
    pub fn merge_service_definition(
        &self,
        original: &mut Map<String, Value>,
        override_def: &Map<String, Value>,
    ) -> Result<()> {
        self.merge_mappings(original, override_def, Scope::Service)
    }

    fn merge_services(&self, original: &mut Map<String, Value>, override_services: &Map<String, Value>) -> Result<()> {
        for (name, override_def) in override_services {
            if !is_set(original.get(name)) {
                debug!(service = %name, "Adding service from override");
                original.insert(name.clone(), override_def.clone());
                continue;
            }
            match (original.get_mut(name), override_def) {
                (Some(_), Value::Null) => {}
                (Some(Value::Object(service)), Value::Object(override_service)) => {
                    debug!(service = %name, "Merging service definition");
                    self.merge_service_definition(service, override_service)?;
                }
                (Some(existing), _) => {
                    return Err(RenderError::merge_conflict(
                        name,
                        kind_name(existing),
                        kind_name(override_def),
                    ));
                }
                (None, _) => {}
            }
        }
        Ok(())
    }

    fn merge_mappings(&self, original: &mut Map<String, Value>, override_def: &Map<String, Value>, scope: Scope) -> Result<()> {
        for (key, override_value) in override_def {
            self.merge_entry(original, key, override_value, scope)?;
        }
        Ok(())
    }

    /// Merge one key. Strings landing on an existing value are expanded here;
    /// values adopted into an unset key are copied as written and left to the
    /// final interpolation pass.
    fn merge_entry(&self, original: &mut Map<String, Value>, key: &str, override_value: &Value, scope: Scope) -> Result<()> {
        // Mapping into a non-empty mapping: recurse.
        if let (Value::Object(override_map), Some(Value::Object(original_map))) = (override_value, original.get_mut(key)) {
            if !original_map.is_empty() {
                return self.merge_mappings(original_map, override_map, scope.nested());
            }
        }

        if original.get(key).map_or(true, Value::is_null) {
            original.insert(key.to_string(), override_value.clone());
            return Ok(());
        }
        let Some(existing) = original.get_mut(key) else {
            return Ok(());
        };

        match override_value {
            Value::Array(override_items) => {
                let existing_kind = kind_name(existing);
                let Value::Array(original_items) = existing else {
                    return Err(RenderError::merge_conflict(key, existing_kind, "sequence"));
                };
                if scope == Scope::Service && key == PORTS {
                    let ports = merge_ports(original_items, override_items)?;
                    *original_items = ports_to_values(&ports)?;
                } else {
                    let uniqify = self.policy.uniqify(scope, key);
                    trace!(key, uniqify, "Merging sequences");
                    *original_items = handle_lists_merges(original_items, override_items, uniqify);
                }
            }
            Value::String(s) => {
                *existing = Value::String(self.expand(s));
            }
            other => *existing = other.clone(),
        }
        Ok(())
    }

    fn expand(&self, text: &str) -> String {
        match self.interpolator {
            Some(interpolator) => interpolator.expand(text, false),
            None => text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("test document must be a mapping"),
        }
    }

    fn merge(original: Value, override_doc: Value) -> Result<Value> {
        let policy = MergePolicy::default();
        Merger::new(&policy)
            .merge(&doc(original), &doc(override_doc))
            .map(Value::Object)
    }

    #[test]
    fn test_services_merged_by_name() {
        let merged = merge(
            json!({"services": {"web": {"image": "nginx", "environment": {"A": "1"}}}}),
            json!({"services": {
                "web": {"environment": {"B": "2"}},
                "worker": {"image": "busybox"}
            }}),
        )
        .unwrap();
        assert_eq!(
            merged,
            json!({"services": {
                "web": {"image": "nginx", "environment": {"A": "1", "B": "2"}},
                "worker": {"image": "busybox"}
            }})
        );
    }

    #[test]
    fn test_scalar_override_replaces() {
        let merged = merge(
            json!({"services": {"web": {"image": "nginx", "replicas": 1, "privileged": false}}}),
            json!({"services": {"web": {"image": "httpd", "replicas": 3, "privileged": true}}}),
        )
        .unwrap();
        assert_eq!(
            merged,
            json!({"services": {"web": {"image": "httpd", "replicas": 3, "privileged": true}}})
        );
    }

    #[test]
    fn test_list_override_of_mapping_is_conflict() {
        let err = merge(
            json!({"services": {"web": {"environment": {"A": "1"}}}}),
            json!({"services": {"web": {"environment": ["A=2"]}}}),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RenderError::MergeConflict { ref key, original: "mapping", override_kind: "sequence" } if key == "environment"
        ));
    }

    #[test]
    fn test_mapping_override_of_scalar_replaces() {
        let merged = merge(
            json!({"services": {"web": {"logging": "none"}}}),
            json!({"services": {"web": {"logging": {"driver": "awslogs"}}}}),
        )
        .unwrap();
        assert_eq!(merged, json!({"services": {"web": {"logging": {"driver": "awslogs"}}}}));
    }

    #[test]
    fn test_service_ports_use_port_merge() {
        let merged = merge(
            json!({"services": {"web": {"ports": ["80:80", 443]}}}),
            json!({"services": {"web": {"ports": ["80:8080"]}}}),
        )
        .unwrap();
        assert_eq!(
            merged["services"]["web"]["ports"],
            json!([
                {"protocol": "tcp", "target": 8080, "published": 80, "mode": "awsvpc", "name": "tcp_8080"},
                {"protocol": "tcp", "target": 443, "mode": "awsvpc", "name": "tcp_443"}
            ])
        );
    }

    #[test]
    fn test_nested_ports_key_is_a_plain_list() {
        let merged = merge(
            json!({"services": {"web": {"x-lb": {"ports": ["a"]}}}}),
            json!({"services": {"web": {"x-lb": {"ports": ["b"]}}}}),
        )
        .unwrap();
        assert_eq!(merged["services"]["web"]["x-lb"]["ports"], json!(["a", "b"]));
    }

    #[test]
    fn test_service_volumes_uniqified() {
        let merged = merge(
            json!({"services": {"web": {"volumes": [{"source": "data", "target": "/d"}, "logs:/logs"]}}}),
            json!({"services": {"web": {"volumes": [{"target": "/d", "source": "data"}, "logs:/logs", "tmp:/tmp"]}}}),
        )
        .unwrap();
        assert_eq!(
            merged["services"]["web"]["volumes"],
            json!([{"source": "data", "target": "/d"}, "logs:/logs", "tmp:/tmp"])
        );
    }

    #[test]
    fn test_non_uniqify_key_keeps_duplicate_mappings() {
        let merged = merge(
            json!({"services": {"web": {"healthchecks": [{"cmd": "a"}]}}}),
            json!({"services": {"web": {"healthchecks": [{"cmd": "a"}]}}}),
        )
        .unwrap();
        assert_eq!(merged["services"]["web"]["healthchecks"], json!([{"cmd": "a"}, {"cmd": "a"}]));
    }

    #[test]
    fn test_resource_sections_merged() {
        let merged = merge(
            json!({
                "volumes": {"data": {"driver": "local"}},
                "x-cluster": {"Use": "prod", "Subnets": ["a"]}
            }),
            json!({
                "volumes": {"data": {"labels": {"k": "v"}}, "cache": {}},
                "x-cluster": {"Subnets": ["b"]},
                "secrets": {"token": {"file": "./t"}}
            }),
        )
        .unwrap();
        assert_eq!(
            merged,
            json!({
                "volumes": {"data": {"driver": "local", "labels": {"k": "v"}}, "cache": {}},
                "x-cluster": {"Use": "prod", "Subnets": ["a", "b"]},
                "secrets": {"token": {"file": "./t"}}
            })
        );
    }

    #[test]
    fn test_top_level_mapping_overridden_by_sequence_is_conflict() {
        let err = merge(json!({"volumes": {"data": {}}}), json!({"volumes": ["data"]})).unwrap_err();
        assert!(matches!(err, RenderError::MergeConflict { .. }));
    }

    #[test]
    fn test_empty_override_is_noop() {
        let original = json!({"services": {"web": {"image": "nginx", "ports": ["80:80"]}}, "volumes": {"a": {}}});
        let merged = merge(original.clone(), json!({})).unwrap();
        assert_eq!(merged, original);
    }

    #[test]
    fn test_null_original_adopts_override() {
        let merged = merge(
            json!({"services": {"web": null, "db": {"volumes": null}}}),
            json!({"services": {"web": {"image": "nginx"}, "db": {"volumes": ["d:/d"]}}}),
        )
        .unwrap();
        assert_eq!(
            merged,
            json!({"services": {"web": {"image": "nginx"}, "db": {"volumes": ["d:/d"]}}})
        );
    }

    #[test]
    fn test_original_is_not_mutated() {
        let policy = MergePolicy::default();
        let original = doc(json!({"services": {"web": {"image": "nginx"}}}));
        let override_doc = doc(json!({"services": {"web": {"image": "httpd"}}}));
        let merged = Merger::new(&policy).merge(&original, &override_doc).unwrap();
        assert_eq!(original["services"]["web"]["image"], json!("nginx"));
        assert_eq!(merged["services"]["web"]["image"], json!("httpd"));
    }

    #[test]
    fn test_override_strings_interpolated_eagerly() {
        let policy = MergePolicy::default();
        let interpolator = Interpolator::new(HashMap::from([("TAG".to_string(), "3.1".to_string())]));
        let merger = Merger::new(&policy).with_interpolator(&interpolator);
        let merged = merger
            .merge(
                &doc(json!({"services": {"web": {"image": "nginx:${OLD}", "command": "echo $$HOME"}}})),
                &doc(json!({"services": {"web": {"image": "nginx:${TAG}", "command": "echo $$HOME"}}})),
            )
            .unwrap();
        assert_eq!(merged["services"]["web"]["image"], json!("nginx:3.1"));
        assert_eq!(merged["services"]["web"]["command"], json!("echo $$HOME"));
    }

    #[test]
    fn test_adopted_strings_left_for_final_pass() {
        let policy = MergePolicy::default();
        let interpolator = Interpolator::new(HashMap::from([("TAG".to_string(), "3.1".to_string())]));
        let merger = Merger::new(&policy).with_interpolator(&interpolator);
        let merged = merger
            .merge(
                &doc(json!({"services": {"web": {"image": "nginx", "user": null}}})),
                &doc(json!({"services": {"web": {"image": "nginx:${TAG}", "user": "${TAG}", "hostname": "web-${TAG}"}}})),
            )
            .unwrap();
        assert_eq!(merged["services"]["web"]["image"], json!("nginx:3.1"));
        assert_eq!(merged["services"]["web"]["user"], json!("${TAG}"));
        assert_eq!(merged["services"]["web"]["hostname"], json!("web-${TAG}"));
    }

    #[test]
    fn test_strings_kept_verbatim_without_interpolator() {
        let merged = merge(
            json!({"services": {"web": {"image": "nginx"}}}),
            json!({"services": {"web": {"image": "nginx:${TAG}"}}}),
        )
        .unwrap();
        assert_eq!(merged["services"]["web"]["image"], json!("nginx:${TAG}"));
    }

    #[test]
    fn test_custom_policy_controls_uniqify() {
        let policy = MergePolicy {
            resource_uniqify_keys: vec![],
            service_uniqify_keys: vec!["env_file".to_string()],
        };
        let merged = Merger::new(&policy)
            .merge(
                &doc(json!({"services": {"web": {"env_file": [{"path": "a"}], "volumes": [{"s": 1}]}}})),
                &doc(json!({"services": {"web": {"env_file": [{"path": "a"}], "volumes": [{"s": 1}]}}})),
            )
            .unwrap();
        assert_eq!(merged["services"]["web"]["env_file"], json!([{"path": "a"}]));
        assert_eq!(merged["services"]["web"]["volumes"], json!([{"s": 1}, {"s": 1}]));
    }
}
