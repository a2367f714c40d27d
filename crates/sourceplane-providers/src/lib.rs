//! Provider resolution for Sourceplane Thin-CI.
//!
//! Two collaborators around the core's provider registry:
//! - the fetcher resolves a provider source (remote git repository or
//!   local directory) to a filesystem path holding `provider.yaml`
//! - the registry loader walks every provider referenced by the loaded
//!   intents, fetches and parses it, and populates a `ProviderRegistry`
//!   or fails the whole planning invocation

mod fetcher;
mod loader;

pub use fetcher::{is_remote_source, FetchError, GitFetcher, ProviderFetcher};
pub use loader::{LoadError, RegistryLoader};
