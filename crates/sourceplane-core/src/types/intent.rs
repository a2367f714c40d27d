//! Intent document types
//!
//! A Repository record is the in-memory form of an `intent.yaml`
//! (or legacy `sourceplane.yaml`) document: named components, their
//! provider bindings, and the relationships between them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Malformed-intent errors raised when a record fails structural checks
#[derive(Debug, Error)]
pub enum IntentError {
    #[error("malformed intent: {0}")]
    Malformed(String),
}

/// A provider reference declared in an intent document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderRef {
    /// Remote locator (e.g. `github.com/org/repo`); empty means local lookup
    #[serde(default)]
    pub source: String,
    /// Accepted version constraint (not enforced against the fetched ref)
    #[serde(default)]
    pub version: String,
    /// Default input values for all jobs of this provider
    #[serde(default)]
    pub defaults: Map<String, Value>,
}

/// A relationship between two components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub rel_type: String,
}

impl Relationship {
    /// Whether the planner treats this relationship as a dependency edge.
    /// Provider-specific kinds are ignored.
    pub fn is_dependency(&self) -> bool {
        matches!(self.rel_type.as_str(), "depends_on" | "uses")
    }
}

/// One named unit of work in an intent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    /// Type of the form `<provider>.<kind>`
    #[serde(rename = "type", default)]
    pub component_type: String,
    /// Free-form spec carried through to job inputs
    #[serde(default)]
    pub spec: Map<String, Value>,
    /// Legacy alias for `spec`
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub inputs: Map<String, Value>,
}

impl Component {
    /// Provider name derived from the component type, split at the first `.`
    pub fn provider(&self) -> Option<&str> {
        let (provider, _) = self.component_type.split_once('.')?;
        Some(provider)
    }

    /// The effective spec mapping (`spec`, falling back to legacy `inputs`)
    pub fn effective_spec(&self) -> &Map<String, Value> {
        if self.spec.is_empty() {
            &self.inputs
        } else {
            &self.spec
        }
    }

    /// Read a string leaf at the given key path inside the spec.
    ///
    /// All spec reads funnel through here; the planner and detector only
    /// ever look at known-string leaves like `module.source` or
    /// `chart.path`.
    pub fn spec_str(&self, path: &[&str]) -> Option<&str> {
        let (first, rest) = path.split_first()?;
        let mut current = self.effective_spec().get(*first)?;
        for key in rest {
            current = current.get(key)?;
        }
        current.as_str()
    }

    /// Dependency targets declared inside the component spec
    /// (`spec.relationships[].target`). Malformed entries are skipped
    /// with a warning.
    pub fn spec_relationship_targets(&self) -> Vec<String> {
        let Some(Value::Array(entries)) = self.effective_spec().get("relationships") else {
            return Vec::new();
        };
        let mut targets = Vec::new();
        for entry in entries {
            match entry.get("target").and_then(Value::as_str) {
                Some(target) => targets.push(target.to_string()),
                None => {
                    tracing::warn!(
                        component = %self.name,
                        "skipping component relationship without a string 'target'"
                    );
                }
            }
        }
        targets
    }
}

/// Metadata about an intent document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// An intent document (`kind: Intent`, or legacy `kind: Repository`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: RepositoryMetadata,
    #[serde(default)]
    pub providers: HashMap<String, ProviderRef>,
    /// Legacy single-provider form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl Repository {
    /// Structural checks shared by the loader and the planner:
    /// non-empty names, `<provider>.<kind>` types, unique component names.
    pub fn validate(&self) -> Result<(), IntentError> {
        if self.metadata.name.trim().is_empty() {
            return Err(IntentError::Malformed(
                "metadata.name must not be empty".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for component in &self.components {
            if component.name.trim().is_empty() {
                return Err(IntentError::Malformed(format!(
                    "intent '{}' declares a component without a name",
                    self.metadata.name
                )));
            }
            if component.component_type.trim().is_empty() {
                return Err(IntentError::Malformed(format!(
                    "component '{}' is missing a type",
                    component.name
                )));
            }
            if component.provider().is_none() {
                return Err(IntentError::Malformed(format!(
                    "component '{}' has invalid type '{}' (expected <provider>.<kind>)",
                    component.name, component.component_type
                )));
            }
            if !seen.insert(component.name.as_str()) {
                return Err(IntentError::Malformed(format!(
                    "duplicate component name '{}' in intent '{}'",
                    component.name, self.metadata.name
                )));
            }
        }

        Ok(())
    }

    /// Find a component by name
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn component(name: &str, component_type: &str) -> Component {
        Component {
            name: name.to_string(),
            component_type: component_type.to_string(),
            spec: Map::new(),
            inputs: Map::new(),
        }
    }

    fn intent_with(components: Vec<Component>) -> Repository {
        Repository {
            api_version: "sourceplane.io/v1".to_string(),
            kind: "Intent".to_string(),
            metadata: RepositoryMetadata {
                name: "platform".to_string(),
                ..Default::default()
            },
            providers: HashMap::new(),
            provider: None,
            components,
            relationships: Vec::new(),
        }
    }

    #[test]
    fn test_provider_extracted_from_type() {
        let c = component("vpc", "terraform.network");
        assert_eq!(c.provider(), Some("terraform"));
        assert_eq!(component("svc", "helm.service").provider(), Some("helm"));
        assert_eq!(component("bad", "terraform").provider(), None);
    }

    #[test]
    fn test_validate_rejects_type_without_dot() {
        let intent = intent_with(vec![component("bad", "foo")]);
        let err = intent.validate().unwrap_err();
        assert!(err.to_string().contains("invalid type 'foo'"));
    }

    #[test]
    fn test_validate_rejects_duplicate_component_names() {
        let intent = intent_with(vec![
            component("vpc", "terraform.network"),
            component("vpc", "terraform.cluster"),
        ]);
        let err = intent.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate component name 'vpc'"));
    }

    #[test]
    fn test_validate_rejects_missing_type() {
        let intent = intent_with(vec![component("vpc", "")]);
        let err = intent.validate().unwrap_err();
        assert!(err.to_string().contains("missing a type"));
    }

    #[test]
    fn test_spec_str_walks_nested_keys() {
        let mut c = component("vpc", "terraform.network");
        c.spec = serde_json::from_value(json!({
            "module": { "source": "./modules/vpc" },
            "path": "terraform/vpc"
        }))
        .unwrap();

        assert_eq!(c.spec_str(&["module", "source"]), Some("./modules/vpc"));
        assert_eq!(c.spec_str(&["path"]), Some("terraform/vpc"));
        assert_eq!(c.spec_str(&["missing"]), None);
        assert_eq!(c.spec_str(&["module", "version"]), None);
    }

    #[test]
    fn test_legacy_inputs_used_when_spec_empty() {
        let mut c = component("api", "helm.service");
        c.inputs = serde_json::from_value(json!({ "chartPath": "helm/api" })).unwrap();
        assert_eq!(c.spec_str(&["chartPath"]), Some("helm/api"));
    }

    #[test]
    fn test_spec_relationship_targets_skips_malformed_entries() {
        let mut c = component("api", "helm.service");
        c.spec = serde_json::from_value(json!({
            "relationships": [
                { "target": "postgres-db", "type": "uses" },
                { "kind": "no-target" },
                { "target": 42 }
            ]
        }))
        .unwrap();
        assert_eq!(c.spec_relationship_targets(), vec!["postgres-db"]);
    }

    #[test]
    fn test_intent_document_parses_from_yaml() {
        let doc = r#"
apiVersion: sourceplane.io/v1
kind: Intent
metadata:
  name: platform
  owner: infra-team
providers:
  terraform:
    source: github.com/sourceplane/provider-terraform
    version: ">=0.1.0"
components:
  - name: vpc
    type: terraform.network
    spec:
      path: terraform/vpc
relationships:
  - from: eks
    to: vpc
    type: depends_on
"#;
        let intent: Repository = serde_yaml::from_str(doc).unwrap();
        assert_eq!(intent.metadata.name, "platform");
        assert_eq!(intent.components.len(), 1);
        assert_eq!(intent.components[0].provider(), Some("terraform"));
        assert!(intent.relationships[0].is_dependency());
        assert_eq!(
            intent.providers["terraform"].source,
            "github.com/sourceplane/provider-terraform"
        );
        intent.validate().unwrap();
    }
}
