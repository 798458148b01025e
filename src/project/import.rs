//! Audio import
//!
//! Copies a local audio file into a fresh project folder so the pipeline can
//! run on it. Acquisition (uploads, URL downloads, transcoding) happens
//! before this point.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::{Result, StemflowError};
use crate::project::scan::sanitize_filename;
use crate::project::store::ProjectStore;

/// Extensions accepted as an original file.
pub const IMPORT_EXTENSIONS: &[&str] = &["wav", "mp3", "ogg", "flac"];

/// A source file staged into a project folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedAudio {
    pub project_id: String,
    pub original_filename: String,
}

/// Stage `source` into the folder of `project_id` under a sanitized name.
///
/// The project record itself is created by the pipeline on first run.
pub fn import_audio(store: &ProjectStore, source: &Path, project_id: &str) -> Result<ImportedAudio> {
    if !source.is_file() {
        return Err(StemflowError::FileNotFound {
            path: source.to_path_buf(),
        });
    }

    let raw_name = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let allowed = raw_name
        .rsplit_once('.')
        .map_or(false, |(_, ext)| {
            IMPORT_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext))
        });
    if !allowed {
        return Err(StemflowError::UnsupportedFormat {
            format: format!("{} (expected one of: {})", raw_name, IMPORT_EXTENSIONS.join(", ")),
        });
    }

    let filename = sanitize_filename(&raw_name);
    if filename.is_empty() || !filename.contains('.') {
        return Err(StemflowError::InvalidFilename { name: raw_name });
    }

    if store.contains(project_id) {
        return Err(StemflowError::AlreadyExists {
            id: project_id.to_string(),
        });
    }
    let dir = store.project_dir(project_id)?;
    fs::create_dir_all(&dir).map_err(|e| StemflowError::DirectoryCreateError {
        path: dir.clone(),
        source: e,
    })?;

    let target = dir.join(&filename);
    fs::copy(source, &target).map_err(|e| StemflowError::FileWriteError {
        path: target.clone(),
        source: e,
    })?;

    info!("Imported {} as {}/{}", source.display(), project_id, filename);
    Ok(ImportedAudio {
        project_id: project_id.to_string(),
        original_filename: filename,
    })
}
