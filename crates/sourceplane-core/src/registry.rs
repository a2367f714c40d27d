//! Provider registry
//!
//! An in-memory mapping from provider name to provider metadata. The
//! registry is populated by a loader before planning starts and is
//! read-only afterwards; it may be shared freely between planning
//! invocations.

use std::collections::HashMap;

use thiserror::Error;

use crate::types::ProviderMetadata;

/// Registry lookup errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("provider '{0}' not registered")]
    NotRegistered(String),
}

/// Mapping from provider name to provider metadata
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, ProviderMetadata>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, overwriting any prior registration under the
    /// same name
    pub fn register(&mut self, provider: ProviderMetadata) {
        self.providers.insert(provider.name.clone(), provider);
    }

    /// Look up a provider by name
    pub fn get(&self, name: &str) -> Result<&ProviderMetadata, RegistryError> {
        self.providers
            .get(name)
            .ok_or_else(|| RegistryError::NotRegistered(name.to_string()))
    }

    /// Sorted names of all registered providers
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
