//! Planner
//!
//! The Planner turns a plan request plus loaded intents into a fully
//! ordered, cycle-free execution plan:
//! - delegate change attribution to the detector
//! - expand each changed component into an action list
//! - build the dependency graph and sort it topologically
//! - emit one job per (component, action) pair
//!
//! The Planner does NOT handle:
//! - rendering the plan into a CI platform's workflow format
//! - running jobs (see the executor)

mod graph;

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::detector::ChangeDetector;
use crate::registry::{ProviderRegistry, RegistryError};
use crate::types::{
    Component, IntentError, Job, JobMetadata, Plan, PlanMetadata, PlanRequest, ProviderAction,
    ProviderMetadata, Repository, RESERVED_JOB_KEYS,
};

use graph::DependencyNode;

/// Planner errors. All of them abort planning whole; the engine never
/// emits a partial plan.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    MalformedIntent(#[from] IntentError),

    #[error("provider '{name}' not found (available providers: {})", .available.join(", "))]
    ProviderNotFound { name: String, available: Vec<String> },

    #[error("component '{0}' not found in intent")]
    ComponentNotFound(String),

    #[error("circular dependency detected in component graph")]
    CircularDependency,
}

/// Generates CI execution plans
pub struct Planner<'a> {
    registry: &'a ProviderRegistry,
}

impl<'a> Planner<'a> {
    pub fn new(registry: &'a ProviderRegistry) -> Self {
        Self { registry }
    }

    /// Create a complete CI execution plan from a request
    pub fn generate_plan(
        &self,
        request: &PlanRequest,
        intents: &[Repository],
    ) -> Result<Plan, PlanError> {
        for intent in intents {
            intent.validate()?;
        }

        // Stage 1: change detection
        let detector = ChangeDetector::new(intents);
        let changes = detector.detect_changes(&request.changed_files);
        if request.changed_only && changes.is_empty() {
            return Ok(self.empty_plan(request));
        }

        // Stage 2: expand components into dependency nodes
        let mut nodes = Vec::with_capacity(changes.len());
        for change in &changes {
            let provider = self.lookup_provider(&change.provider)?;
            let component = find_component(&change.component_name, intents)
                .ok_or_else(|| PlanError::ComponentNotFound(change.component_name.clone()))?;

            nodes.push(DependencyNode {
                component_name: change.component_name.clone(),
                provider: change.provider.clone(),
                actions: determine_actions(&request.mode, provider),
                dependencies: extract_dependencies(component, intents),
            });
        }

        // Stage 3: dependency graph and topological sort
        let sorted = graph::topological_sort(nodes)?;

        // Stage 4: job emission
        let jobs = self.generate_jobs(&sorted, request)?;

        Ok(Plan {
            target: request.target.clone(),
            mode: request.mode.clone(),
            metadata: plan_metadata(request),
            jobs,
        })
    }

    fn lookup_provider(&self, name: &str) -> Result<&ProviderMetadata, PlanError> {
        self.registry.get(name).map_err(|err| match err {
            RegistryError::NotRegistered(name) => PlanError::ProviderNotFound {
                name,
                available: self.registry.list(),
            },
        })
    }

    fn empty_plan(&self, request: &PlanRequest) -> Plan {
        Plan {
            target: request.target.clone(),
            mode: request.mode.clone(),
            metadata: plan_metadata(request),
            jobs: Vec::new(),
        }
    }

    fn generate_jobs(
        &self,
        nodes: &[DependencyNode],
        request: &PlanRequest,
    ) -> Result<Vec<Job>, PlanError> {
        let mut jobs = Vec::new();

        for node in nodes {
            let provider = self.lookup_provider(&node.provider)?;

            for (action_idx, action) in node.actions.iter().enumerate() {
                let id = format!("{}-{}", node.component_name, action);

                // Actions of one component form a chain; only the chain
                // root carries cross-component dependencies.
                let depends_on = if action_idx > 0 {
                    vec![format!(
                        "{}-{}",
                        node.component_name,
                        node.actions[action_idx - 1]
                    )]
                } else {
                    node.dependencies
                        .iter()
                        .filter_map(|dep| {
                            let dep_node = nodes.iter().find(|n| &n.component_name == dep)?;
                            let last = dep_node.actions.last()?;
                            Some(format!("{}-{}", dep, last))
                        })
                        .collect()
                };

                let provider_action = provider.thin_ci.action(action);
                let inputs = build_job_inputs(node, provider, provider_action, request);
                let mut metadata = platform_metadata(&request.target, node, action);

                let mut extra = Map::new();
                if let Some(provider_action) = provider_action {
                    for (key, value) in &provider_action.job_template {
                        if RESERVED_JOB_KEYS.contains(&key.as_str()) {
                            tracing::debug!(
                                job = %id,
                                key = %key,
                                "job template may not override a reserved job field"
                            );
                            continue;
                        }
                        if key == "metadata" {
                            merge_template_metadata(&mut metadata, value);
                            continue;
                        }
                        if key == "inputs" {
                            tracing::debug!(
                                job = %id,
                                "job template 'inputs' is ignored; action inputs already merge"
                            );
                            continue;
                        }
                        extra.insert(key.clone(), value.clone());
                    }
                }

                jobs.push(Job {
                    id,
                    component: node.component_name.clone(),
                    provider: node.provider.clone(),
                    action: action.clone(),
                    inputs,
                    depends_on,
                    metadata,
                    extra,
                });
            }
        }

        Ok(jobs)
    }
}

/// Which actions should run for a component, given the request mode and
/// the provider's supported action set
fn determine_actions(mode: &str, provider: &ProviderMetadata) -> Vec<String> {
    let wanted: &[&str] = match mode {
        "plan" => &["validate", "plan"],
        "apply" => &["validate", "plan", "apply"],
        "destroy" => &["destroy"],
        _ => &[],
    };

    wanted
        .iter()
        .filter(|action| provider.thin_ci.has_action(action))
        .map(|action| action.to_string())
        .collect()
}

/// Dependencies from intent-level relationships and component-level
/// `spec.relationships`, concatenated. Duplicates are not deduplicated;
/// the graph tolerates them.
fn extract_dependencies(component: &Component, intents: &[Repository]) -> Vec<String> {
    let mut dependencies = Vec::new();

    for intent in intents {
        for rel in &intent.relationships {
            if rel.from == component.name && rel.is_dependency() {
                dependencies.push(rel.to.clone());
            }
        }
    }

    dependencies.extend(component.spec_relationship_targets());
    dependencies
}

fn find_component<'a>(name: &str, intents: &'a [Repository]) -> Option<&'a Component> {
    intents.iter().find_map(|intent| intent.component(name))
}

/// Job inputs, merged in order: provider defaults, component name,
/// request environment, provider overrides, then per-action inputs for
/// keys still unset.
fn build_job_inputs(
    node: &DependencyNode,
    provider: &ProviderMetadata,
    action: Option<&ProviderAction>,
    request: &PlanRequest,
) -> Map<String, Value> {
    let mut inputs = Map::new();

    for (key, value) in &provider.thin_ci.defaults {
        inputs.insert(key.clone(), value.clone());
    }

    inputs.insert(
        "component".to_string(),
        Value::String(node.component_name.clone()),
    );

    if !request.environment.is_empty() {
        inputs.insert(
            "environment".to_string(),
            Value::String(request.environment.clone()),
        );
    }

    if let Some(overrides) = request.provider_overrides.get(&node.provider) {
        for (key, value) in overrides {
            inputs.insert(key.clone(), value.clone());
        }
    }

    if let Some(action) = action {
        for (key, value) in &action.inputs {
            inputs.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    inputs
}

/// Platform metadata derived deterministically from the render target
fn platform_metadata(target: &str, node: &DependencyNode, action: &str) -> JobMetadata {
    let mut environment = BTreeMap::new();
    environment.insert("SP_COMPONENT".to_string(), node.component_name.clone());
    environment.insert("SP_PROVIDER".to_string(), node.provider.clone());
    environment.insert("SP_ACTION".to_string(), action.to_string());

    let mut metadata = JobMetadata {
        environment,
        ..Default::default()
    };

    match target {
        "github" => {
            metadata.runs_on = Some("ubuntu-latest".to_string());
            metadata.permissions = Some(vec!["id-token".to_string(), "contents".to_string()]);
            metadata.timeout = Some(30);
        }
        "gitlab" => {
            metadata.runs_on = Some("docker".to_string());
            metadata.timeout = Some(30);
        }
        _ => {}
    }

    metadata
}

/// Merge a job template's `metadata` mapping into planner metadata.
/// Planner-set keys win on conflict.
fn merge_template_metadata(metadata: &mut JobMetadata, template: &Value) {
    let Some(template) = template.as_object() else {
        tracing::warn!("job template 'metadata' is not a mapping; ignoring");
        return;
    };

    for (key, value) in template {
        match key.as_str() {
            "runsOn" => {
                if metadata.runs_on.is_none() {
                    metadata.runs_on = value.as_str().map(str::to_string);
                }
            }
            "permissions" => {
                if metadata.permissions.is_none() {
                    metadata.permissions = serde_json::from_value(value.clone()).ok();
                }
            }
            "env" => {
                if let Some(envs) = value.as_object() {
                    for (env_key, env_value) in envs {
                        if let Some(text) = env_value.as_str() {
                            metadata
                                .environment
                                .entry(env_key.clone())
                                .or_insert_with(|| text.to_string());
                        }
                    }
                }
            }
            "timeout" => {
                if metadata.timeout.is_none() {
                    metadata.timeout = value.as_u64().map(|t| t as u32);
                }
            }
            "continueOnError" => {
                if metadata.continue_on_error.is_none() {
                    metadata.continue_on_error = value.as_bool();
                }
            }
            _ => {
                metadata
                    .extra
                    .entry(key.clone())
                    .or_insert_with(|| value.clone());
            }
        }
    }
}

fn plan_metadata(request: &PlanRequest) -> PlanMetadata {
    PlanMetadata {
        repository: request.repository_path.clone(),
        base_ref: request.base_ref.clone(),
        head_ref: request.head_ref.clone(),
        changed_files: request.changed_files.clone(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        environment: request.environment.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ThinCiConfig;
    use serde_json::json;

    fn provider_with_actions(names: &[&str]) -> ProviderMetadata {
        let actions = names
            .iter()
            .map(|name| ProviderAction {
                name: name.to_string(),
                ..Default::default()
            })
            .collect();
        ProviderMetadata::new(
            "terraform",
            "0.1.0",
            ThinCiConfig {
                actions,
                ..Default::default()
            },
        )
    }

    fn node() -> DependencyNode {
        DependencyNode {
            component_name: "vpc".to_string(),
            provider: "terraform".to_string(),
            actions: vec!["validate".to_string()],
            dependencies: Vec::new(),
        }
    }

    #[test]
    fn test_action_policy_per_mode() {
        let provider = provider_with_actions(&["validate", "plan", "apply", "destroy"]);
        assert_eq!(determine_actions("plan", &provider), vec!["validate", "plan"]);
        assert_eq!(
            determine_actions("apply", &provider),
            vec!["validate", "plan", "apply"]
        );
        assert_eq!(determine_actions("destroy", &provider), vec!["destroy"]);
        assert!(determine_actions("refresh", &provider).is_empty());
    }

    #[test]
    fn test_unsupported_actions_are_skipped() {
        // Provider without a `plan` action in its taxonomy
        let provider = provider_with_actions(&["validate", "apply"]);
        assert_eq!(determine_actions("plan", &provider), vec!["validate"]);
        assert_eq!(
            determine_actions("apply", &provider),
            vec!["validate", "apply"]
        );
        assert!(determine_actions("destroy", &provider).is_empty());
    }

    #[test]
    fn test_inputs_merge_order() {
        // Provider override beats action inputs; defaults survive
        let mut provider = provider_with_actions(&["plan"]);
        provider.thin_ci.defaults = serde_json::from_value(json!({ "timeout": 1800 })).unwrap();
        let action = ProviderAction {
            name: "plan".to_string(),
            inputs: serde_json::from_value(json!({ "workspace": "default", "parallelism": 10 }))
                .unwrap(),
            ..Default::default()
        };

        let mut request = PlanRequest {
            environment: "prod".to_string(),
            ..Default::default()
        };
        request.provider_overrides.insert(
            "terraform".to_string(),
            serde_json::from_value(json!({ "workspace": "prod" })).unwrap(),
        );

        let inputs = build_job_inputs(&node(), &provider, Some(&action), &request);
        assert_eq!(inputs["timeout"], 1800);
        assert_eq!(inputs["component"], "vpc");
        assert_eq!(inputs["environment"], "prod");
        assert_eq!(inputs["workspace"], "prod");
        assert_eq!(inputs["parallelism"], 10);
    }

    #[test]
    fn test_environment_input_omitted_when_empty() {
        let provider = provider_with_actions(&["plan"]);
        let request = PlanRequest::default();
        let inputs = build_job_inputs(&node(), &provider, None, &request);
        assert!(!inputs.contains_key("environment"));
    }

    #[test]
    fn test_platform_metadata_per_target() {
        let github = platform_metadata("github", &node(), "plan");
        assert_eq!(github.runs_on.as_deref(), Some("ubuntu-latest"));
        assert_eq!(
            github.permissions,
            Some(vec!["id-token".to_string(), "contents".to_string()])
        );
        assert_eq!(github.timeout, Some(30));
        assert_eq!(github.environment["SP_COMPONENT"], "vpc");
        assert_eq!(github.environment["SP_ACTION"], "plan");

        let gitlab = platform_metadata("gitlab", &node(), "plan");
        assert_eq!(gitlab.runs_on.as_deref(), Some("docker"));
        assert!(gitlab.permissions.is_none());

        let other = platform_metadata("jenkins", &node(), "plan");
        assert!(other.runs_on.is_none());
        assert!(other.timeout.is_none());
        assert_eq!(other.environment.len(), 3);
    }

    #[test]
    fn test_template_metadata_merge_planner_wins() {
        let mut metadata = platform_metadata("github", &node(), "plan");
        merge_template_metadata(
            &mut metadata,
            &json!({
                "runsOn": "self-hosted",
                "continueOnError": true,
                "env": { "TF_IN_AUTOMATION": "1", "SP_ACTION": "overridden" },
                "approvers": ["infra"]
            }),
        );

        // Planner-set keys win
        assert_eq!(metadata.runs_on.as_deref(), Some("ubuntu-latest"));
        assert_eq!(metadata.environment["SP_ACTION"], "plan");
        // Template-only keys land
        assert_eq!(metadata.continue_on_error, Some(true));
        assert_eq!(metadata.environment["TF_IN_AUTOMATION"], "1");
        assert_eq!(metadata.extra["approvers"], json!(["infra"]));
    }
}
