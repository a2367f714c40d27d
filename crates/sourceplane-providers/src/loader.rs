//! Registry loading.
//!
//! Resolves every provider referenced by the loaded intents (provider
//! maps, legacy single-provider fields, and component type prefixes),
//! fetches or locates its `provider.yaml`, and registers the parsed
//! metadata. Any provider that cannot be produced fails the whole
//! planning invocation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use sourceplane_config::{load_provider, ConfigError};
use sourceplane_core::registry::ProviderRegistry;
use sourceplane_core::types::{ProviderRef, Repository};

use crate::fetcher::{is_remote_source, FetchError, ProviderFetcher};

/// Registry loading errors
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("provider '{name}' unavailable: {source}")]
    Unavailable {
        name: String,
        #[source]
        source: FetchError,
    },

    #[error("provider '{name}': {source}")]
    Document {
        name: String,
        #[source]
        source: ConfigError,
    },
}

/// Populates a provider registry from loaded intents
pub struct RegistryLoader<'a> {
    repository_path: &'a Path,
    fetcher: &'a dyn ProviderFetcher,
}

impl<'a> RegistryLoader<'a> {
    pub fn new(repository_path: &'a Path, fetcher: &'a dyn ProviderFetcher) -> Self {
        Self {
            repository_path,
            fetcher,
        }
    }

    /// Load metadata for every referenced provider, or fail
    pub async fn load(&self, intents: &[Repository]) -> Result<ProviderRegistry, LoadError> {
        let mut registry = ProviderRegistry::new();

        for name in referenced_providers(intents) {
            let reference = find_reference(intents, &name);
            let directory = self.resolve_directory(&name, reference).await?;

            let manifest = directory.join("provider.yaml");
            let document = load_provider(&manifest).map_err(|source| LoadError::Document {
                name: name.clone(),
                source,
            })?;

            if document.name != name {
                tracing::warn!(
                    referenced = %name,
                    declared = %document.name,
                    "provider.yaml declares a different name; registering under the referenced one"
                );
            }

            let mut metadata =
                document
                    .into_metadata()
                    .map_err(|source| LoadError::Document {
                        name: name.clone(),
                        source,
                    })?;
            metadata.name = name.clone();

            tracing::info!(provider = %name, version = %metadata.version, "provider loaded");
            registry.register(metadata);
        }

        Ok(registry)
    }

    async fn resolve_directory(
        &self,
        name: &str,
        reference: Option<&ProviderRef>,
    ) -> Result<PathBuf, LoadError> {
        let (source, version) = match reference {
            Some(reference) => (reference.source.as_str(), reference.version.as_str()),
            None => ("", ""),
        };

        if source.is_empty() {
            // Local lookup convention
            return Ok(self.repository_path.join("providers").join(name));
        }

        if is_remote_source(source) {
            return self
                .fetcher
                .fetch(name, source, version)
                .await
                .map_err(|source| LoadError::Unavailable {
                    name: name.to_string(),
                    source,
                });
        }

        // Filesystem source, relative to the repository root
        let path = Path::new(source);
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            Ok(self.repository_path.join(path))
        }
    }
}

/// Provider names referenced anywhere in the loaded intents, first
/// occurrence wins the ordering: provider-map keys (sorted per intent),
/// legacy single-provider fields, then component type prefixes.
fn referenced_providers(intents: &[Repository]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    let mut push = |name: &str| {
        if !name.is_empty() && seen.insert(name.to_string()) {
            names.push(name.to_string());
        }
    };

    for intent in intents {
        let mut declared: Vec<&String> = intent.providers.keys().collect();
        declared.sort();
        for name in declared {
            push(name);
        }
        if let Some(legacy) = &intent.provider {
            push(legacy);
        }
        for component in &intent.components {
            if let Some(provider) = component.provider() {
                push(provider);
            }
        }
    }

    names
}

fn find_reference<'a>(intents: &'a [Repository], name: &str) -> Option<&'a ProviderRef> {
    intents.iter().find_map(|intent| intent.providers.get(name))
}
