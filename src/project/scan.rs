//! Library scanning
//!
//! Rebuilds project records from the library folder. A folder's metadata
//! record is authoritative; folders without a usable record fall back to
//! folder-name heuristics (`<timestamp>[_<shortname>]`).

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::audio::is_audio_file;
use crate::error::{Result, StemflowError};
use crate::modules::ModuleRegistry;
use crate::project::metadata::{Project, METADATA_FILE};

/// Reduce an uploaded filename to a safe, portable name.
///
/// Path separators and whitespace become `_`, characters outside ASCII
/// letters, digits, `_`, `.` and `-` are dropped, and leading or trailing
/// `.`/`_` are trimmed. May return an empty string.
pub fn sanitize_filename(name: &str) -> String {
    let spaced: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Check that a name can be used as a single path component.
pub fn is_safe_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

/// Split a legacy folder name into its timestamp and display name.
///
/// `<date>_<time>_<name>` folders use the first two all-digit segments as
/// the timestamp and keep the rest verbatim, digits included. A single
/// leading all-digit segment is a canonical id. When nothing follows the
/// timestamp the folder name itself is the display name.
pub fn parse_folder_name(folder: &str) -> (Option<String>, String) {
    let is_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    let parts: Vec<&str> = folder.splitn(3, '_').collect();

    let (timestamp, rest) = match parts.as_slice() {
        [date, time, rest @ ..] if is_digits(*date) && is_digits(*time) => {
            (format!("{}_{}", date, time), rest.join("_"))
        }
        [ts, rest @ ..] if is_digits(*ts) => (ts.to_string(), rest.join("_")),
        _ => return (None, folder.to_string()),
    };

    if rest.is_empty() {
        (Some(timestamp), folder.to_string())
    } else {
        (Some(timestamp), rest)
    }
}

/// Pick the original file among `audio_files` by exact or sanitized
/// basename match against `name`.
pub fn detect_original(audio_files: &[String], name: &str) -> Option<String> {
    audio_files
        .iter()
        .find(|f| base_name(f) == name)
        .or_else(|| {
            audio_files
                .iter()
                .find(|f| sanitize_filename(base_name(f)) == name)
        })
        .cloned()
}

fn base_name(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    }
}

/// Audio files directly inside `dir`, sorted lexically.
pub fn list_audio_files(dir: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| StemflowError::FileReadError {
            path: dir.to_path_buf(),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if is_audio_file(&name) {
            files.push(name);
        }
    }
    files.sort();
    Ok(files)
}

/// Rebuild the record for one project folder.
pub fn scan_project_folder(dir: &Path, registry: &ModuleRegistry) -> Result<Project> {
    let folder = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| StemflowError::InvalidFilename {
            name: dir.display().to_string(),
        })?;
    let audio_files = list_audio_files(dir)?;

    let mut project = match Project::load(dir) {
        Ok(mut project) => {
            if project.id != folder {
                warn!(
                    "Metadata in {} names project '{}'; using folder name",
                    dir.display(),
                    project.id
                );
                project.id = folder.clone();
            }
            project
        }
        Err(StemflowError::FileNotFound { .. }) => legacy_project(&folder, &audio_files, registry),
        Err(e) => {
            warn!(
                "Unreadable metadata in {} ({}); falling back to folder name",
                dir.display(),
                e
            );
            legacy_project(&folder, &audio_files, registry)
        }
    };

    project.stems.clear();
    project.merge_stems(&audio_files);

    Ok(project)
}

fn legacy_project(folder: &str, audio_files: &[String], registry: &ModuleRegistry) -> Project {
    let (_, name) = parse_folder_name(folder);
    let original = detect_original(audio_files, &name);
    debug!(
        "Legacy project {}: name '{}', original {:?}",
        folder, name, original
    );

    let mut project = Project::new(folder, original.as_deref().unwrap_or(""));
    project.name = name;
    project.original_filename = original;

    let artifacts: Vec<&String> = audio_files
        .iter()
        .filter(|f| project.original_filename.as_ref() != Some(*f))
        .collect();
    let artifacts: Vec<&str> = artifacts.iter().map(|f| f.as_str()).collect();
    project.completed_modules = registry.infer_completed(&artifacts);

    project
}

/// Scan every project folder under `root`.
///
/// Folders that cannot be read are logged and skipped.
pub fn scan_library(root: &Path, registry: &ModuleRegistry) -> Result<Vec<(PathBuf, Project)>> {
    let mut found = Vec::new();

    for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable library entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') {
            continue;
        }

        match scan_project_folder(entry.path(), registry) {
            Ok(project) => found.push((entry.path().to_path_buf(), project)),
            Err(e) => warn!("Error loading {}: {}", entry.path().display(), e),
        }
    }

    found.sort_by(|a, b| b.1.id.cmp(&a.1.id));
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;
    use test_case::test_case;

    #[test_case("My Song.mp3", "My_Song.mp3" ; "spaces")]
    #[test_case("../../etc/passwd", "etc_passwd" ; "path traversal")]
    #[test_case("  tabs\tand  spaces ", "tabs_and_spaces" ; "whitespace runs")]
    #[test_case("Canção.wav", "Cano.wav" ; "non ascii dropped")]
    #[test_case("..hidden.", "hidden" ; "dots trimmed")]
    #[test_case("***", "" ; "nothing left")]
    fn test_sanitize_filename(input: &str, expected: &str) {
        assert_eq!(sanitize_filename(input), expected);
    }

    #[test_case("20240101_120000_My_Song", Some("20240101_120000"), "My_Song" ; "legacy full name")]
    #[test_case("20240101120000_My", Some("20240101120000"), "My" ; "short name")]
    #[test_case("20240101120000", Some("20240101120000"), "20240101120000" ; "timestamp only")]
    #[test_case("imported", None, "imported" ; "no timestamp")]
    #[test_case("20240101_120000_1999_Prince", Some("20240101_120000"), "1999_Prince" ; "numeric name")]
    #[test_case("20240101_120000", Some("20240101_120000"), "20240101_120000" ; "date and time only")]
    fn test_parse_folder_name(folder: &str, timestamp: Option<&str>, name: &str) {
        let (ts, parsed) = parse_folder_name(folder);
        assert_eq!(ts.as_deref(), timestamp);
        assert_eq!(parsed, name);
    }

    #[test]
    fn test_detect_original_prefers_exact_match() {
        let files = vec![
            "My_Song.wav".to_string(),
            "My Song.mp3".to_string(),
            "vocals.wav".to_string(),
        ];
        assert_eq!(detect_original(&files, "My_Song").as_deref(), Some("My_Song.wav"));
        assert_eq!(detect_original(&files, "vocals").as_deref(), Some("vocals.wav"));
        assert_eq!(detect_original(&files, "Other"), None);
    }

    #[test]
    fn test_detect_original_sanitized_match() {
        let files = vec!["My Song.mp3".to_string(), "vocals.wav".to_string()];
        assert_eq!(detect_original(&files, "My_Song").as_deref(), Some("My Song.mp3"));
    }

    #[test]
    fn test_scan_legacy_folder() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("20240101_120000_Track");
        fs::create_dir_all(&dir).unwrap();
        for f in ["Track.mp3", "vocals.wav", "instrumental.wav", "notes.txt"] {
            fs::write(dir.join(f), b"").unwrap();
        }

        let registry = ModuleRegistry::builtin().unwrap();
        let project = scan_project_folder(&dir, &registry).unwrap();

        assert_eq!(project.id, "20240101_120000_Track");
        assert_eq!(project.name, "Track");
        assert_eq!(project.original_filename.as_deref(), Some("Track.mp3"));
        assert_eq!(project.stems, vec!["instrumental.wav", "vocals.wav"]);
        assert!(project.is_completed("vocal_instrumental"));
    }

    #[test]
    fn test_scan_legacy_folder_with_numeric_name() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("20240101_120000_1999_Prince");
        fs::create_dir_all(&dir).unwrap();
        for f in ["1999_Prince.mp3", "vocals.wav"] {
            fs::write(dir.join(f), b"").unwrap();
        }

        let registry = ModuleRegistry::builtin().unwrap();
        let project = scan_project_folder(&dir, &registry).unwrap();

        assert_eq!(project.name, "1999_Prince");
        assert_eq!(project.original_filename.as_deref(), Some("1999_Prince.mp3"));
        assert_eq!(project.stems, vec!["vocals.wav"]);
    }

    #[test]
    fn test_scan_corrupt_metadata_falls_back() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("20240101120000");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(METADATA_FILE), b"{ not json").unwrap();
        fs::write(dir.join("drums.wav"), b"").unwrap();

        let registry = ModuleRegistry::builtin().unwrap();
        let project = scan_project_folder(&dir, &registry).unwrap();

        assert_eq!(project.id, "20240101120000");
        assert_eq!(project.original_filename, None);
        assert_eq!(project.stems, vec!["drums.wav"]);
    }

    #[test]
    fn test_scan_library_sorts_newest_first() {
        let root = TempDir::new().unwrap();
        for id in ["20240101120000", "20240301090000", "20231231235959"] {
            let dir = root.path().join(id);
            fs::create_dir_all(&dir).unwrap();
            Project::new(id, "a.wav").save(&dir).unwrap();
        }
        fs::write(root.path().join("stray.wav"), b"").unwrap();

        let registry = ModuleRegistry::builtin().unwrap();
        let ids: Vec<String> = scan_library(root.path(), &registry)
            .unwrap()
            .into_iter()
            .map(|(_, p)| p.id)
            .collect();

        assert_eq!(ids, vec!["20240301090000", "20240101120000", "20231231235959"]);
    }
}
