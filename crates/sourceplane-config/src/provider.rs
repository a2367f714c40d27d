//! Provider document (`provider.yaml`) loading.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use sourceplane_core::types::{ProviderMetadata, ThinCiConfig};

use crate::loader::ConfigError;

/// A component kind a provider supports; informational for listings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderKindSpec {
    pub name: String,
    #[serde(default)]
    pub full_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
}

/// A full `provider.yaml` document
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderDocument {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(rename = "apiVersion", default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub kinds: Vec<ProviderKindSpec>,
    #[serde(rename = "thinCI", default)]
    pub thin_ci: Option<ThinCiConfig>,
}

impl ProviderDocument {
    /// Convert into registry metadata. The planner requires a
    /// `thinCI.actions` section; a document without one cannot be
    /// planned against.
    pub fn into_metadata(self) -> Result<ProviderMetadata, ConfigError> {
        match self.thin_ci {
            Some(thin_ci) if !thin_ci.actions.is_empty() => {
                Ok(ProviderMetadata::new(self.name, self.version, thin_ci))
            }
            _ => Err(ConfigError::MissingThinCi(self.name)),
        }
    }
}

/// Load a `provider.yaml` document
pub fn load_provider(path: &Path) -> Result<ProviderDocument, ConfigError> {
    let content = fs::read_to_string(path)?;
    let document: ProviderDocument = serde_yaml::from_str(&content)?;
    Ok(document)
}
