//! Plan and job types
//!
//! Plan and Job are the engine's only outputs. They serialize to
//! canonical JSON (planner-controlled fields first, then job-template
//! extras in insertion order) and to YAML, and are the sole contract
//! with downstream renderers and the executor.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::provider::ActionStep;

/// All inputs needed to generate a plan
#[derive(Debug, Clone, Default)]
pub struct PlanRequest {
    // Git context
    pub base_ref: String,
    pub head_ref: String,
    pub changed_files: Vec<String>,

    // Repository state
    pub repository_path: String,
    pub intent_files: Vec<String>,

    // CLI flags
    pub target: String,
    pub mode: String,
    pub changed_only: bool,
    pub environment: String,

    // Optional overrides, keyed by provider name
    pub provider_overrides: HashMap<String, Map<String, Value>>,
}

/// Contextual information about a plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanMetadata {
    pub repository: String,
    pub base_ref: String,
    pub head_ref: String,
    /// Always present, empty if none
    #[serde(default)]
    pub changed_files: Vec<String>,
    /// RFC3339, stamped at plan-build time
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub environment: String,
}

/// Platform-specific job configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runs_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty", rename = "env")]
    pub environment: BTreeMap<String, String>,
    /// Minutes; advisory for downstream renderers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_on_error: Option<bool>,
    /// Further template-supplied metadata
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single CI job emitted in a plan.
///
/// The reserved fields are statically typed; everything a provider's
/// `jobTemplate` contributes rides in the flattened extension bag and
/// is read back through the `extra_*` accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub component: String,
    pub provider: String,
    /// validate, plan, apply, destroy
    pub action: String,
    #[serde(default)]
    pub inputs: Map<String, Value>,
    /// Always present, empty if none
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub metadata: JobMetadata,
    /// Fields copied verbatim from the provider's job template
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Reserved job keys the planner always writes; a job template must not
/// override them.
pub(crate) const RESERVED_JOB_KEYS: [&str; 5] =
    ["id", "component", "provider", "action", "dependsOn"];

impl Job {
    /// Read a template-supplied step list (`preSteps` / `postSteps`)
    pub fn extra_steps(&self, key: &str) -> Vec<ActionStep> {
        self.extra
            .get(key)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    /// Read the template-supplied main command list
    pub fn extra_commands(&self) -> Vec<String> {
        self.extra
            .get("commands")
            .and_then(Value::as_array)
            .map(|cmds| {
                cmds.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A complete CI execution plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// e.g. "github", "gitlab"
    pub target: String,
    /// "plan", "apply" or "destroy"
    pub mode: String,
    pub metadata: PlanMetadata,
    /// Emission order is a valid execution order modulo `dependsOn`
    #[serde(default)]
    pub jobs: Vec<Job>,
}

impl Plan {
    /// Find a job by id
    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }
}
