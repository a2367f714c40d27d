//! Provider fetching.
//!
//! Remote sources are shallow-cloned into a per-user cache directory
//! (default `~/.sourceplane/providers/<name>`) and fast-forwarded on
//! reuse; a failed update is a warning, not fatal. The cache is not
//! locked across processes: a clone that loses the race tolerates
//! "destination exists" and proceeds with whatever the directory holds.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

/// Fetch errors; all map to the provider-unavailable taxonomy
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("could not determine a home directory for the provider cache")]
    NoHomeDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("git clone of '{repo_source}' failed: {detail}")]
    CloneFailed { repo_source: String, detail: String },

    #[error("provider.yaml not found in {}", .0.display())]
    MissingManifest(PathBuf),
}

/// Resolves a provider source to the local directory containing its
/// `provider.yaml`. Injected into the registry loader; the core treats
/// it as a black box yielding a filesystem path.
#[async_trait]
pub trait ProviderFetcher: Send + Sync {
    async fn fetch(&self, name: &str, source: &str, version: &str)
        -> Result<PathBuf, FetchError>;
}

/// Whether a source is remote (vs. a local filesystem path)
pub fn is_remote_source(source: &str) -> bool {
    source.contains("github.com")
        || source.contains("gitlab.com")
        || source.contains("bitbucket.org")
        || source.starts_with("https://")
        || source.starts_with("http://")
        || source.starts_with("git@")
}

/// Git-backed fetcher with an on-disk cache
pub struct GitFetcher {
    cache_dir: PathBuf,
}

impl GitFetcher {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Cache under `<home>/.sourceplane/providers`
    pub fn with_default_cache() -> Result<Self, FetchError> {
        let home = dirs::home_dir().ok_or(FetchError::NoHomeDir)?;
        Ok(Self::new(home.join(".sourceplane").join("providers")))
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    async fn clone_provider(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        let output = Command::new("git")
            .args(["clone", "--depth", "1", url])
            .arg(dest)
            .output()
            .await?;

        if !output.status.success() {
            let detail = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if dest.exists() {
                // Lost a clone race with a concurrent planner; use what
                // the winner left behind.
                tracing::warn!(
                    dest = %dest.display(),
                    "clone destination already exists, continuing with current contents"
                );
                return Ok(());
            }
            return Err(FetchError::CloneFailed {
                repo_source: url.to_string(),
                detail,
            });
        }
        Ok(())
    }

    async fn update_provider(&self, dir: &Path) {
        let result = Command::new("git")
            .args(["pull", "--ff-only"])
            .current_dir(dir)
            .output()
            .await;

        match result {
            Ok(output) if output.status.success() => {}
            Ok(output) => {
                tracing::warn!(
                    dir = %dir.display(),
                    detail = %String::from_utf8_lossy(&output.stderr).trim(),
                    "failed to fast-forward cached provider, using existing version"
                );
            }
            Err(err) => {
                tracing::warn!(
                    dir = %dir.display(),
                    error = %err,
                    "failed to run git pull, using existing version"
                );
            }
        }
    }
}

#[async_trait]
impl ProviderFetcher for GitFetcher {
    async fn fetch(
        &self,
        name: &str,
        source: &str,
        version: &str,
    ) -> Result<PathBuf, FetchError> {
        if !version.is_empty() {
            tracing::debug!(provider = name, version, "version constraint accepted, not enforced");
        }

        if !is_remote_source(source) {
            // Local filesystem path, returned verbatim
            let dir = PathBuf::from(source);
            return ensure_manifest(dir);
        }

        let (_, url) = parse_source(source);
        let provider_dir = self.cache_dir.join(name);
        tokio::fs::create_dir_all(&self.cache_dir).await?;

        if provider_dir.join(".git").exists() {
            tracing::info!(provider = name, source, "updating cached provider");
            self.update_provider(&provider_dir).await;
        } else {
            tracing::info!(provider = name, source, "fetching provider");
            self.clone_provider(&url, &provider_dir).await?;
        }

        ensure_manifest(provider_dir)
    }
}

fn ensure_manifest(dir: PathBuf) -> Result<PathBuf, FetchError> {
    if dir.join("provider.yaml").exists() {
        Ok(dir)
    } else {
        Err(FetchError::MissingManifest(dir))
    }
}

/// Derive (provider name, clone URL) from a remote source string, e.g.
/// `github.com/org/provider-name` -> `(provider-name,
/// https://github.com/org/provider-name)`.
fn parse_source(source: &str) -> (String, String) {
    if let Some(rest) = source.strip_prefix("git@") {
        let name = rest
            .rsplit(['/', ':'])
            .next()
            .unwrap_or(rest)
            .trim_end_matches(".git");
        return (name.to_string(), source.to_string());
    }

    let stripped = source
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let url = format!("https://{stripped}");

    let parts: Vec<&str> = stripped.split('/').collect();
    if parts.len() < 3 {
        return (stripped.to_string(), url);
    }

    let name = parts[parts.len() - 1].trim_end_matches(".git");
    (name.to_string(), url)
}
