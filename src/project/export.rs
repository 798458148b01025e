//! Project export
//!
//! Bundles a project folder, or a chosen subset of its files, into a
//! gzip-compressed tar archive.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{Result, StemflowError};
use crate::project::scan::is_safe_component;
use crate::project::store::ProjectStore;

/// Write `<id>.tar.gz` (every file in the project folder) or
/// `<id>_selected.tar.gz` (only the named files that exist) into `out_dir`.
///
/// Entries are stored flat, by file name. Returns the archive path.
pub fn export_project<S: AsRef<str>>(
    store: &ProjectStore,
    project_id: &str,
    selection: &[S],
    out_dir: &Path,
) -> Result<PathBuf> {
    let project_dir = store.project_path(project_id)?;

    let mut files: Vec<(PathBuf, String)> = Vec::new();
    if selection.is_empty() {
        for entry in WalkDir::new(&project_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name() {
            let entry = entry.map_err(|e| StemflowError::FileReadError {
                path: project_dir.clone(),
                source: e.into(),
            })?;
            if entry.file_type().is_file() {
                let name = entry.file_name().to_string_lossy().to_string();
                files.push((entry.path().to_path_buf(), name));
            }
        }
    } else {
        for name in selection {
            let name = name.as_ref();
            if !is_safe_component(name) {
                return Err(StemflowError::InvalidFilename {
                    name: name.to_string(),
                });
            }
            let path = project_dir.join(name);
            if path.is_file() {
                files.push((path, name.to_string()));
            } else {
                warn!("Skipping missing file {} in export of {}", name, project_id);
            }
        }
    }

    fs::create_dir_all(out_dir).map_err(|e| StemflowError::DirectoryCreateError {
        path: out_dir.to_path_buf(),
        source: e,
    })?;
    let suffix = if selection.is_empty() { "" } else { "_selected" };
    let archive_path = out_dir.join(format!("{}{}.tar.gz", project_id, suffix));

    let write_err = |e: std::io::Error| StemflowError::FileWriteError {
        path: archive_path.clone(),
        source: e,
    };

    let file = File::create(&archive_path).map_err(write_err)?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    for (path, name) in &files {
        builder.append_path_with_name(path, name).map_err(write_err)?;
    }
    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .map_err(write_err)?;

    info!(
        "Exported {} files of {} to {}",
        files.len(),
        project_id,
        archive_path.display()
    );
    Ok(archive_path)
}
