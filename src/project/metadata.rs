//! Project metadata record
//!
//! Defines the `metadata.json` schema kept in every project folder and the
//! whole-record persistence used for it.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, StemflowError};

/// Metadata record file name inside each project folder.
pub const METADATA_FILE: &str = "metadata.json";

/// Current metadata schema version.
pub const SCHEMA_VERSION: &str = "1.0";

/// Temporary name used while rewriting the record.
const METADATA_TMP_FILE: &str = "metadata.json.tmp";

/// Persistent state of one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Schema version of the record.
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    /// Project id; also the folder name under the library root.
    pub id: String,

    /// Display name derived from the original filename.
    pub name: String,

    /// Original audio file inside the project folder, when known.
    #[serde(rename = "original_file", default)]
    pub original_filename: Option<String>,

    /// SHA-256 of the original file at creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_sha256: Option<String>,

    /// Modules whose artifacts have been produced.
    #[serde(default)]
    pub completed_modules: BTreeSet<String>,

    /// Artifact filenames, sorted and deduplicated.
    #[serde(default)]
    pub stems: Vec<String>,

    /// Timestamp when project was created.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Timestamp of last modification.
    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,

    /// Unknown fields preserved for forward compatibility.
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

/// A stem filename paired with its download reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StemRef {
    pub name: String,
    pub download_ref: String,
}

/// Stable per-project, per-file reference: `<project_id>/<filename>`.
pub fn download_ref(project_id: &str, filename: &str) -> String {
    format!("{}/{}", project_id, filename)
}

/// Display name for an original filename: the name without its extension.
pub fn display_name(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| filename.to_string())
}

/// SHA-256 of a file as lowercase hex.
pub fn file_sha256(path: &Path) -> Result<String> {
    let content = fs::read(path).map_err(|e| StemflowError::FileReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(format!("{:x}", Sha256::digest(&content)))
}

impl Project {
    /// Fresh record with no completed modules and no stems.
    pub fn new(id: &str, original_filename: &str) -> Self {
        let now = Utc::now();
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            id: id.to_string(),
            name: display_name(original_filename),
            original_filename: Some(original_filename.to_string()),
            original_sha256: None,
            completed_modules: BTreeSet::new(),
            stems: Vec::new(),
            created_at: now,
            modified_at: now,
            unknown_fields: HashMap::new(),
        }
    }

    /// Get the path to the metadata record inside a project folder.
    pub fn metadata_path(dir: &Path) -> PathBuf {
        dir.join(METADATA_FILE)
    }

    /// Load the record stored in `dir`.
    ///
    /// # Errors
    /// * `FileNotFound` - If the folder has no record
    /// * `Json` - If the record is not valid JSON for this schema
    pub fn load(dir: &Path) -> Result<Self> {
        let path = Self::metadata_path(dir);
        if !path.exists() {
            return Err(StemflowError::FileNotFound { path });
        }

        let content = fs::read_to_string(&path).map_err(|e| StemflowError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        Ok(serde_json::from_str(&content)?)
    }

    /// Replace the record in `dir` with this one.
    ///
    /// The record is written to a temporary file first and renamed over the
    /// old one, so readers never observe a partial record.
    pub fn save(&mut self, dir: &Path) -> Result<()> {
        self.modified_at = Utc::now();

        let content = serde_json::to_string_pretty(self)?;
        let tmp_path = dir.join(METADATA_TMP_FILE);
        fs::write(&tmp_path, content).map_err(|e| StemflowError::FileWriteError {
            path: tmp_path.clone(),
            source: e,
        })?;

        let path = Self::metadata_path(dir);
        fs::rename(&tmp_path, &path).map_err(|e| StemflowError::FileWriteError { path, source: e })?;

        Ok(())
    }

    /// Merge artifact filenames into `stems`, keeping it sorted and free of
    /// duplicates, the original file and the metadata record.
    pub fn merge_stems<S: AsRef<str>>(&mut self, names: &[S]) {
        for name in names {
            let name = name.as_ref();
            if name == METADATA_FILE || self.original_filename.as_deref() == Some(name) {
                continue;
            }
            if let Err(pos) = self.stems.binary_search_by(|s| s.as_str().cmp(name)) {
                self.stems.insert(pos, name.to_string());
            }
        }
    }

    /// Stems with their download references.
    pub fn stem_refs(&self) -> Vec<StemRef> {
        self.stems
            .iter()
            .map(|name| StemRef {
                name: name.clone(),
                download_ref: download_ref(&self.id, name),
            })
            .collect()
    }

    /// Check whether a module has completed for this project.
    pub fn is_completed(&self, module_id: &str) -> bool {
        self.completed_modules.contains(module_id)
    }
}
