//! Intent document loading and discovery.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use sourceplane_core::types::{IntentError, Repository};

/// Directories never searched for intent documents
const SKIPPED_DIRS: [&str; 3] = [".git", "node_modules", ".terraform"];

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error(transparent)]
    Intent(#[from] IntentError),
    #[error("invalid document: {0}")]
    Invalid(String),
    #[error("provider '{0}' does not define a thinCI.actions section")]
    MissingThinCi(String),
}

/// Load and validate a single intent document
/// (`intent.yaml`, or legacy `sourceplane.yaml`).
pub fn load_intent(path: &Path) -> Result<Repository, ConfigError> {
    let content = fs::read_to_string(path)?;
    let intent: Repository = serde_yaml::from_str(&content)?;

    if intent.api_version.trim().is_empty() {
        return Err(ConfigError::Invalid(format!(
            "{}: apiVersion must not be empty",
            path.display()
        )));
    }
    match intent.kind.as_str() {
        "Intent" | "Repository" => {}
        other => {
            tracing::warn!(path = %path.display(), kind = other, "unexpected document kind");
        }
    }

    intent.validate()?;
    Ok(intent)
}

/// Load every intent document in order
pub fn load_intents<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Repository>, ConfigError> {
    paths.iter().map(|path| load_intent(path.as_ref())).collect()
}

/// Recursively find all `intent.yaml` / `sourceplane.yaml` files under
/// `root`, skipping VCS and vendor directories. Results are sorted for
/// deterministic load order.
pub fn discover_intent_files(root: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        let name = entry.file_name().to_string_lossy();
        !(entry.file_type().is_dir() && SKIPPED_DIRS.contains(&name.as_ref()))
    });

    for entry in walker {
        let entry = entry.map_err(|err| ConfigError::Invalid(err.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name == "intent.yaml" || name == "sourceplane.yaml" {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}
