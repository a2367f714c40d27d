//! Change detector
//!
//! The detector maps a list of changed file paths onto the set of
//! affected components, with a reason per component. It is the first
//! stage of plan generation and owns all path-matching rules:
//! - intent document changes affect every component
//! - component-local paths come out of the component spec, with a
//!   `<provider>/<name>` convention as fallback
//! - provider configuration and shared-module paths affect whole
//!   provider families

use std::collections::HashMap;
use std::fmt;

use globset::Glob;

use crate::types::{Component, Repository};

/// Why a component was marked affected. The first matching rule wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    IntentDefinition,
    ComponentFiles,
    ProviderConfiguration,
    SharedModule,
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ChangeReason::IntentDefinition => "Intent definition changed",
            ChangeReason::ComponentFiles => "Component files changed",
            ChangeReason::ProviderConfiguration => "Provider configuration changed",
            ChangeReason::SharedModule => "Shared module changed",
        };
        f.write_str(text)
    }
}

/// One affected component, with the paths that triggered it
#[derive(Debug, Clone)]
pub struct ComponentChange {
    pub component_name: String,
    pub provider: String,
    pub component_type: String,
    pub reason: ChangeReason,
    pub affected_paths: Vec<String>,
}

/// Identifies which components are affected by file changes
pub struct ChangeDetector<'a> {
    intents: &'a [Repository],
}

impl<'a> ChangeDetector<'a> {
    pub fn new(intents: &'a [Repository]) -> Self {
        Self { intents }
    }

    /// Analyze changed files and return affected components, one entry
    /// per component name across all intents, in declaration order.
    pub fn detect_changes(&self, changed_files: &[String]) -> Vec<ComponentChange> {
        let mut order: Vec<String> = Vec::new();
        let mut changes: HashMap<String, ComponentChange> = HashMap::new();

        for intent in self.intents {
            for component in &intent.components {
                let Some(change) = self.check_component(component, changed_files) else {
                    continue;
                };
                match changes.get_mut(&component.name) {
                    Some(existing) => {
                        existing.affected_paths.extend(change.affected_paths);
                    }
                    None => {
                        order.push(component.name.clone());
                        changes.insert(component.name.clone(), change);
                    }
                }
            }
        }

        order
            .into_iter()
            .filter_map(|name| changes.remove(&name))
            .collect()
    }

    fn check_component(
        &self,
        component: &Component,
        changed_files: &[String],
    ) -> Option<ComponentChange> {
        let provider = component
            .component_type
            .split('.')
            .next()
            .unwrap_or_default()
            .to_string();

        let mut affected_paths: Vec<String> = Vec::new();
        let mut reason: Option<ChangeReason> = None;
        let record = |paths: &mut Vec<String>,
                          reason_slot: &mut Option<ChangeReason>,
                          file: &str,
                          rule: ChangeReason| {
            paths.push(file.to_string());
            reason_slot.get_or_insert(rule);
        };

        // Rule 1: the intent document itself changed
        for file in changed_files {
            if is_intent_document(file) {
                record(
                    &mut affected_paths,
                    &mut reason,
                    file,
                    ChangeReason::IntentDefinition,
                );
            }
        }

        // Rule 2: component-local paths
        for pattern in component_paths(component, &provider) {
            for file in changed_files {
                if path_matches(file, &pattern) {
                    record(
                        &mut affected_paths,
                        &mut reason,
                        file,
                        ChangeReason::ComponentFiles,
                    );
                }
            }
        }

        // Rule 3: provider-level paths
        for pattern in provider_paths(&provider) {
            for file in changed_files {
                if path_matches(file, &pattern) {
                    record(
                        &mut affected_paths,
                        &mut reason,
                        file,
                        ChangeReason::ProviderConfiguration,
                    );
                }
            }
        }

        // Rule 4: shared module paths
        for pattern in shared_module_paths(component, &provider) {
            for file in changed_files {
                if path_matches(file, &pattern) {
                    record(
                        &mut affected_paths,
                        &mut reason,
                        file,
                        ChangeReason::SharedModule,
                    );
                }
            }
        }

        let reason = reason?;
        Some(ComponentChange {
            component_name: component.name.clone(),
            provider,
            component_type: component.component_type.clone(),
            reason,
            affected_paths,
        })
    }
}

fn is_intent_document(file: &str) -> bool {
    matches!(
        std::path::Path::new(file).file_name().and_then(|n| n.to_str()),
        Some("intent.yaml") | Some("sourceplane.yaml")
    )
}

/// Paths specific to one component, read from its spec; falls back to
/// the `<provider>/<name>` convention when the spec names none.
fn component_paths(component: &Component, provider: &str) -> Vec<String> {
    let mut paths = Vec::new();

    match provider {
        "terraform" => {
            if let Some(source) = component.spec_str(&["module", "source"]) {
                // Registry references like terraform-aws-modules/... are not local
                if !source.starts_with("terraform-") {
                    paths.push(source.to_string());
                }
            }
            if let Some(path) = component.spec_str(&["path"]) {
                paths.push(path.to_string());
            }
        }
        "helm" => {
            if let Some(path) = component.spec_str(&["chart", "path"]) {
                paths.push(path.to_string());
            }
            if let Some(path) = component.spec_str(&["chartPath"]) {
                paths.push(path.to_string());
            }
            if let Some(path) = component.spec_str(&["valuesPath"]) {
                paths.push(path.to_string());
            }
        }
        _ => {}
    }

    if paths.is_empty() {
        paths.push(format!("{}/{}", provider, component.name));
    }

    paths
}

/// Paths that affect every component of a provider
fn provider_paths(provider: &str) -> Vec<String> {
    vec![
        format!("providers/{}/provider.yaml", provider),
        format!("providers/{}/schema.yaml", provider),
        format!(".sourceplane/providers/{}", provider),
    ]
}

/// Shared-module paths a component transitively depends on
fn shared_module_paths(component: &Component, provider: &str) -> Vec<String> {
    let mut paths = Vec::new();

    match provider {
        "terraform" => {
            if let Some(source) = component.spec_str(&["module", "source"]) {
                if source.starts_with("./") || source.starts_with("../") {
                    paths.push(source.to_string());
                }
            }
            paths.push("terraform/modules".to_string());
        }
        "helm" => {
            paths.push("helm/charts".to_string());
        }
        _ => {}
    }

    paths
}

/// A changed path matches a pattern on exact equality, directory-prefix
/// containment, or glob match. Glob compile errors are non-fatal and
/// count as no match.
fn path_matches(file: &str, pattern: &str) -> bool {
    if file == pattern {
        return true;
    }
    if file.starts_with(&format!("{}/", pattern)) {
        return true;
    }
    match Glob::new(pattern) {
        Ok(glob) => glob.compile_matcher().is_match(file),
        Err(err) => {
            tracing::warn!(pattern, error = %err, "ignoring unparseable path pattern");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RepositoryMetadata;
    use serde_json::json;

    fn component(name: &str, component_type: &str, spec: serde_json::Value) -> Component {
        Component {
            name: name.to_string(),
            component_type: component_type.to_string(),
            spec: serde_json::from_value(spec).unwrap(),
            inputs: Default::default(),
        }
    }

    fn intent(components: Vec<Component>) -> Repository {
        Repository {
            api_version: "sourceplane.io/v1".to_string(),
            kind: "Intent".to_string(),
            metadata: RepositoryMetadata {
                name: "platform".to_string(),
                ..Default::default()
            },
            providers: Default::default(),
            provider: None,
            components,
            relationships: Vec::new(),
        }
    }

    fn changed(files: &[&str]) -> Vec<String> {
        files.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_intent_document_change_marks_every_component() {
        let intents = vec![intent(vec![
            component("vpc", "terraform.network", json!({})),
            component("api", "helm.service", json!({})),
        ])];
        let detector = ChangeDetector::new(&intents);

        let changes = detector.detect_changes(&changed(&["intent.yaml"]));
        assert_eq!(changes.len(), 2);
        for change in &changes {
            assert_eq!(change.reason, ChangeReason::IntentDefinition);
            assert_eq!(change.affected_paths, vec!["intent.yaml"]);
        }
    }

    #[test]
    fn test_nested_sourceplane_yaml_counts_as_intent_change() {
        let intents = vec![intent(vec![component("vpc", "terraform.network", json!({}))])];
        let detector = ChangeDetector::new(&intents);
        let changes = detector.detect_changes(&changed(&["teams/infra/sourceplane.yaml"]));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].reason, ChangeReason::IntentDefinition);
    }

    #[test]
    fn test_convention_path_used_when_spec_has_none() {
        let intents = vec![intent(vec![
            component("vpc-network", "terraform.network", json!({})),
            component("api-service", "helm.service", json!({})),
        ])];
        let detector = ChangeDetector::new(&intents);

        let changes = detector.detect_changes(&changed(&["terraform/vpc-network/main.tf"]));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].component_name, "vpc-network");
        assert_eq!(changes[0].provider, "terraform");
        assert_eq!(changes[0].reason, ChangeReason::ComponentFiles);
    }

    #[test]
    fn test_spec_paths_override_convention() {
        let intents = vec![intent(vec![component(
            "db",
            "terraform.database",
            json!({ "path": "infra/db" }),
        )])];
        let detector = ChangeDetector::new(&intents);

        assert_eq!(
            detector
                .detect_changes(&changed(&["infra/db/main.tf"]))
                .len(),
            1
        );
        // Explicit path replaces the terraform/db convention
        assert!(detector
            .detect_changes(&changed(&["terraform/db/main.tf"]))
            .is_empty());
    }

    #[test]
    fn test_helm_chart_path_and_values_path() {
        let intents = vec![intent(vec![component(
            "api",
            "helm.service",
            json!({ "chart": { "path": "charts/api" }, "valuesPath": "envs/api.yaml" }),
        )])];
        let detector = ChangeDetector::new(&intents);

        assert_eq!(
            detector
                .detect_changes(&changed(&["charts/api/templates/deploy.yaml"]))
                .len(),
            1
        );
        assert_eq!(detector.detect_changes(&changed(&["envs/api.yaml"])).len(), 1);
    }

    #[test]
    fn test_registry_module_source_is_not_a_local_path() {
        let intents = vec![intent(vec![component(
            "vpc",
            "terraform.network",
            json!({ "module": { "source": "terraform-aws-modules/vpc/aws" } }),
        )])];
        let detector = ChangeDetector::new(&intents);
        assert!(detector
            .detect_changes(&changed(&["terraform-aws-modules/vpc/aws/main.tf"]))
            .is_empty());
    }

    #[test]
    fn test_provider_configuration_change() {
        let intents = vec![intent(vec![component("vpc", "terraform.network", json!({}))])];
        let detector = ChangeDetector::new(&intents);

        let changes = detector.detect_changes(&changed(&["providers/terraform/provider.yaml"]));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].reason, ChangeReason::ProviderConfiguration);
    }

    #[test]
    fn test_shared_module_change_for_relative_module_source() {
        let intents = vec![intent(vec![component(
            "vpc",
            "terraform.network",
            json!({ "module": { "source": "./modules/vpc" }, "path": "terraform/vpc" }),
        )])];
        let detector = ChangeDetector::new(&intents);

        let changes = detector.detect_changes(&changed(&["./modules/vpc/main.tf"]));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].reason, ChangeReason::SharedModule);

        let changes = detector.detect_changes(&changed(&["terraform/modules/tags/main.tf"]));
        assert_eq!(changes[0].reason, ChangeReason::SharedModule);
    }

    #[test]
    fn test_helm_shared_charts_directory() {
        let intents = vec![intent(vec![component("api", "helm.service", json!({}))])];
        let detector = ChangeDetector::new(&intents);
        let changes = detector.detect_changes(&changed(&["helm/charts/common/Chart.yaml"]));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].reason, ChangeReason::SharedModule);
    }

    #[test]
    fn test_first_matching_reason_wins_and_paths_merge() {
        let intents = vec![intent(vec![component("vpc", "terraform.network", json!({}))])];
        let detector = ChangeDetector::new(&intents);

        let changes = detector.detect_changes(&changed(&[
            "intent.yaml",
            "terraform/vpc/main.tf",
            "providers/terraform/schema.yaml",
        ]));
        assert_eq!(changes.len(), 1);
        let change = &changes[0];
        assert_eq!(change.reason, ChangeReason::IntentDefinition);
        assert_eq!(change.affected_paths.len(), 3);
    }

    #[test]
    fn test_same_component_name_across_intents_is_deduplicated() {
        let intents = vec![
            intent(vec![component("vpc", "terraform.network", json!({}))]),
            intent(vec![component("vpc", "terraform.network", json!({}))]),
        ];
        let detector = ChangeDetector::new(&intents);
        let changes = detector.detect_changes(&changed(&["terraform/vpc/main.tf"]));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].affected_paths.len(), 2);
    }

    #[test]
    fn test_glob_pattern_matching() {
        assert!(path_matches("terraform/vpc/main.tf", "terraform/vpc"));
        assert!(path_matches("terraform/vpc", "terraform/vpc"));
        assert!(path_matches("envs/prod.yaml", "envs/*.yaml"));
        assert!(!path_matches("terraform/vpc2/main.tf", "terraform/vpc"));
        // Invalid glob is a warning, not a match
        assert!(!path_matches("anything", "bad[glob"));
    }

    #[test]
    fn test_no_changed_files_yields_no_changes() {
        let intents = vec![intent(vec![component("vpc", "terraform.network", json!({}))])];
        let detector = ChangeDetector::new(&intents);
        assert!(detector.detect_changes(&[]).is_empty());
    }
}
