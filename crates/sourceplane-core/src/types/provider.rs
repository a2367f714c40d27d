//! Provider metadata types
//!
//! A provider describes what actions a family of components supports and
//! how each action is shaped: job template, steps, commands, defaults.
//! These records come out of a `provider.yaml` document's `thinCI`
//! section.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single step within an action (pre- or post-step)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionStep {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub command: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub inputs: Map<String, Value>,
}

/// One action a provider exposes to the planner
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAction {
    /// Conventionally one of `validate`, `plan`, `apply`, `destroy`
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Display order relative to other actions; informational only
    #[serde(default)]
    pub order: u32,
    /// Free-form fields merged verbatim into emitted jobs
    #[serde(default)]
    pub job_template: Map<String, Value>,
    #[serde(default)]
    pub pre_steps: Vec<ActionStep>,
    #[serde(default)]
    pub post_steps: Vec<ActionStep>,
    /// Default per-action input values; backfill only, never clobber
    #[serde(default)]
    pub inputs: Map<String, Value>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub commands: Vec<String>,
}

/// The `thinCI` section of a provider document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThinCiConfig {
    #[serde(default)]
    pub actions: Vec<ProviderAction>,
    /// Default input values for all jobs of this provider
    #[serde(default)]
    pub defaults: Map<String, Value>,
    /// Informational default ordering of action names
    #[serde(default)]
    pub ordering: Vec<String>,
}

impl ThinCiConfig {
    /// Whether the provider exposes an action with this name
    pub fn has_action(&self, name: &str) -> bool {
        self.actions.iter().any(|a| a.name == name)
    }

    /// Find an action by name
    pub fn action(&self, name: &str) -> Option<&ProviderAction> {
        self.actions.iter().find(|a| a.name == name)
    }
}

/// Provider metadata as held by the registry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderMetadata {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub thin_ci: ThinCiConfig,
}

impl ProviderMetadata {
    pub fn new(name: impl Into<String>, version: impl Into<String>, thin_ci: ThinCiConfig) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            thin_ci,
        }
    }
}
