//! Configuration
//!
//! Resolved from built-in defaults, then an optional JSON file, then
//! command-line / environment overrides applied by the binary.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, StemflowError};
use crate::modules::ModuleRegistry;

/// Default library folder, relative to the working directory.
pub const DEFAULT_LIBRARY_ROOT: &str = "Library";

/// Default folder for export archives.
pub const DEFAULT_EXPORT_DIR: &str = "exports";

/// External program invoked for one module.
///
/// `args` may contain `{input}`, `{original}`, `{project_dir}` and
/// `{module}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerCommand {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment variables for the child process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Folder holding one subfolder per project.
    pub library_root: PathBuf,

    /// Folder export archives are written to.
    pub export_dir: PathBuf,

    /// Runner command per module id.
    pub runners: BTreeMap<String, RunnerCommand>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library_root: PathBuf::from(DEFAULT_LIBRARY_ROOT),
            export_dir: PathBuf::from(DEFAULT_EXPORT_DIR),
            runners: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| StemflowError::FileReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| StemflowError::Config(format!("{}: {}", path.display(), e)))?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `path` when given, otherwise use defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Reject runner entries for modules the registry does not know.
    pub fn validate(&self, registry: &ModuleRegistry) -> Result<()> {
        let unknown: Vec<&str> = self
            .runners
            .keys()
            .map(String::as_str)
            .filter(|id| !registry.contains(id))
            .collect();
        if !unknown.is_empty() {
            return Err(StemflowError::Config(format!(
                "runners configured for unknown modules: {}",
                unknown.join(", ")
            )));
        }

        if let Some((id, _)) = self.runners.iter().find(|(_, cmd)| cmd.program.trim().is_empty()) {
            return Err(StemflowError::Config(format!(
                "runner for '{}' has an empty program",
                id
            )));
        }

        Ok(())
    }
}
