//! Intent and provider document loading.
//!
//! This crate turns YAML documents on disk into the validated records
//! the core engine consumes: intent files into `Repository` values and
//! `provider.yaml` files into `ProviderMetadata`. It owns document
//! discovery and structural validation; it does not resolve remote
//! provider sources (see sourceplane-providers).

mod loader;
mod provider;

pub use loader::{discover_intent_files, load_intent, load_intents, ConfigError};
pub use provider::{load_provider, ProviderDocument, ProviderKindSpec};
