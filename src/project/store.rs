//! Project Store
//!
//! Owns every project known to the process: the id → folder index, the
//! in-memory metadata, and the per-project locks used by the pipeline and
//! the mixer. Disk is the source of truth; [`ProjectStore::rescan_from_disk`]
//! discards the in-memory state and rebuilds it from the library folder.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Local;
use tracing::{debug, info};

use crate::error::{Result, StemflowError};
use crate::modules::ModuleRegistry;
use crate::project::metadata::{file_sha256, Project};
use crate::project::scan::{is_safe_component, scan_library};

/// Format of generated project ids. Lexical order equals creation order.
pub const PROJECT_ID_FORMAT: &str = "%Y%m%d%H%M%S";

/// One indexed project: its folder and its current record.
#[derive(Debug, Clone)]
struct ProjectEntry {
    path: PathBuf,
    project: Project,
}

/// File-system backed store of projects under one library root.
pub struct ProjectStore {
    library_root: PathBuf,
    registry: Arc<ModuleRegistry>,
    entries: Mutex<HashMap<String, ProjectEntry>>,
    project_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ProjectStore {
    /// Create an empty store. Nothing is read until [`Self::rescan_from_disk`].
    pub fn new(library_root: &Path, registry: Arc<ModuleRegistry>) -> Self {
        Self {
            library_root: library_root.to_path_buf(),
            registry,
            entries: Mutex::new(HashMap::new()),
            project_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Create the library root if needed and load every project in it.
    pub fn open(library_root: &Path, registry: Arc<ModuleRegistry>) -> Result<Self> {
        fs::create_dir_all(library_root).map_err(|e| StemflowError::DirectoryCreateError {
            path: library_root.to_path_buf(),
            source: e,
        })?;

        let store = Self::new(library_root, registry);
        store.rescan_from_disk()?;
        Ok(store)
    }

    /// Generate a new time-derived project id.
    pub fn new_project_id() -> String {
        Local::now().format(PROJECT_ID_FORMAT).to_string()
    }

    /// Get the library root path.
    pub fn library_root(&self) -> &Path {
        &self.library_root
    }

    /// Get the module registry the store infers legacy completions from.
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Folder a project with this id lives (or will live) in.
    pub fn project_dir(&self, id: &str) -> Result<PathBuf> {
        if !is_safe_component(id) {
            return Err(StemflowError::InvalidFilename {
                name: id.to_string(),
            });
        }
        Ok(self.library_root.join(id))
    }

    /// Check if a project is known to the store
    pub fn contains(&self, id: &str) -> bool {
        self.entries().contains_key(id)
    }

    /// Create a project folder and its initial metadata record.
    ///
    /// A folder that already exists without a record is adopted, so callers
    /// can place the original file before creating the project.
    ///
    /// # Errors
    /// * `AlreadyExists` - If the id is known or the folder already has a record
    pub fn create_project(&self, id: &str, original_filename: &str) -> Result<PathBuf> {
        let dir = self.project_dir(id)?;
        if !is_safe_component(original_filename) {
            return Err(StemflowError::InvalidFilename {
                name: original_filename.to_string(),
            });
        }

        let mut entries = self.entries();
        if entries.contains_key(id) || Project::metadata_path(&dir).exists() {
            return Err(StemflowError::AlreadyExists { id: id.to_string() });
        }

        fs::create_dir_all(&dir).map_err(|e| StemflowError::DirectoryCreateError {
            path: dir.clone(),
            source: e,
        })?;

        let mut project = Project::new(id, original_filename);
        let original_path = dir.join(original_filename);
        if original_path.is_file() {
            project.original_sha256 = Some(file_sha256(&original_path)?);
        }
        project.save(&dir)?;

        info!("Created project {} ({})", id, original_filename);
        entries.insert(
            id.to_string(),
            ProjectEntry {
                path: dir.clone(),
                project,
            },
        );

        Ok(dir)
    }

    /// Get the folder of a known project.
    pub fn project_path(&self, id: &str) -> Result<PathBuf> {
        self.entries()
            .get(id)
            .map(|e| e.path.clone())
            .ok_or_else(|| not_found(id))
    }

    /// Get the current record of a known project.
    pub fn metadata(&self, id: &str) -> Result<Project> {
        self.entries()
            .get(id)
            .map(|e| e.project.clone())
            .ok_or_else(|| not_found(id))
    }

    /// All known projects, newest first.
    pub fn history(&self) -> Vec<Project> {
        let mut projects: Vec<Project> = self.entries().values().map(|e| e.project.clone()).collect();
        projects.sort_by(|a, b| b.id.cmp(&a.id));
        projects
    }

    /// Mark a module completed and merge the artifacts it produced.
    ///
    /// The record is rewritten on disk before the in-memory copy changes.
    pub fn record_module_completion<S: AsRef<str>>(
        &self,
        id: &str,
        module_id: &str,
        new_artifacts: &[S],
    ) -> Result<Project> {
        self.update(id, |project| {
            project.completed_modules.insert(module_id.to_string());
            project.merge_stems(new_artifacts);
        })
    }

    /// Register a derived stem that no module produced (e.g. a mix).
    pub fn record_artifact(&self, id: &str, filename: &str) -> Result<Project> {
        self.update(id, |project| project.merge_stems(&[filename]))
    }

    /// Resolve a download reference to a file inside a known project.
    ///
    /// # Errors
    /// * `InvalidFilename` - If the name is not a single path component
    /// * `ProjectNotFound` - If the id is unknown
    /// * `FileNotFound` - If the file does not exist
    pub fn resolve_file(&self, id: &str, filename: &str) -> Result<PathBuf> {
        if !is_safe_component(filename) {
            return Err(StemflowError::InvalidFilename {
                name: filename.to_string(),
            });
        }
        let path = self.project_path(id)?.join(filename);
        if !path.is_file() {
            return Err(StemflowError::FileNotFound { path });
        }
        Ok(path)
    }

    /// Discard the in-memory index and rebuild it from the library folder.
    ///
    /// Holds the store lock for the whole scan, so no record update can
    /// interleave with it. Returns the number of projects found.
    pub fn rescan_from_disk(&self) -> Result<usize> {
        let mut entries = self.entries();
        info!("Scanning for projects in {}", self.library_root.display());

        let found = scan_library(&self.library_root, &self.registry)?;
        let rebuilt: HashMap<String, ProjectEntry> = found
            .into_iter()
            .map(|(path, project)| (project.id.clone(), ProjectEntry { path, project }))
            .collect();

        *entries = rebuilt;
        info!("Loaded {} projects from disk", entries.len());
        Ok(entries.len())
    }

    /// Lock serializing pipeline and mix work on one project.
    pub fn project_lock(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .project_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(id.to_string()).or_default())
    }

    fn update<F>(&self, id: &str, mutate: F) -> Result<Project>
    where
        F: FnOnce(&mut Project),
    {
        let mut entries = self.entries();
        let entry = entries.get_mut(id).ok_or_else(|| not_found(id))?;

        let mut updated = entry.project.clone();
        mutate(&mut updated);
        updated.save(&entry.path)?;
        debug!(
            "Updated project {}: {} modules, {} stems",
            id,
            updated.completed_modules.len(),
            updated.stems.len()
        );

        entry.project = updated.clone();
        Ok(updated)
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, ProjectEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn not_found(id: &str) -> StemflowError {
    StemflowError::ProjectNotFound { id: id.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn open_store(root: &TempDir) -> ProjectStore {
        let registry = Arc::new(ModuleRegistry::builtin().unwrap());
        ProjectStore::open(root.path(), registry).unwrap()
    }

    #[test]
    fn test_new_project_id_is_sortable_timestamp() {
        let id = ProjectStore::new_project_id();
        assert_eq!(id.len(), 14);
        assert!(id.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_create_and_get() {
        let root = TempDir::new().unwrap();
        let store = open_store(&root);

        let dir = store.create_project("20240301101500", "song.wav").unwrap();
        assert_eq!(dir, root.path().join("20240301101500"));
        assert!(dir.join("metadata.json").exists());

        let project = store.metadata("20240301101500").unwrap();
        assert_eq!(project.name, "song");
        assert!(project.completed_modules.is_empty());
        assert_eq!(store.project_path("20240301101500").unwrap(), dir);
    }

    #[test]
    fn test_create_twice_fails() {
        let root = TempDir::new().unwrap();
        let store = open_store(&root);

        store.create_project("20240301101500", "song.wav").unwrap();
        match store.create_project("20240301101500", "other.wav") {
            Err(StemflowError::AlreadyExists { id }) => assert_eq!(id, "20240301101500"),
            other => panic!("Expected AlreadyExists, got: {:?}", other),
        }
    }

    #[test]
    fn test_create_hashes_staged_original() {
        let root = TempDir::new().unwrap();
        let store = open_store(&root);

        let dir = store.project_dir("20240301101500").unwrap();
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("song.wav"), b"abc").unwrap();
        store.create_project("20240301101500", "song.wav").unwrap();

        let project = store.metadata("20240301101500").unwrap();
        assert_eq!(
            project.original_sha256.as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }

    #[test]
    fn test_unknown_project() {
        let root = TempDir::new().unwrap();
        let store = open_store(&root);

        assert!(matches!(
            store.metadata("missing"),
            Err(StemflowError::ProjectNotFound { .. })
        ));
        assert!(matches!(
            store.record_artifact("missing", "a.wav"),
            Err(StemflowError::ProjectNotFound { .. })
        ));
    }

    #[test]
    fn test_record_completion_persists() {
        let root = TempDir::new().unwrap();
        let store = open_store(&root);
        let dir = store.create_project("20240301101500", "song.wav").unwrap();

        store
            .record_module_completion(
                "20240301101500",
                "vocal_instrumental",
                &["vocals.wav", "instrumental.wav"],
            )
            .unwrap();
        store.record_artifact("20240301101500", "vocals.wav").unwrap();

        let on_disk = Project::load(&dir).unwrap();
        assert_eq!(on_disk.stems, vec!["instrumental.wav", "vocals.wav"]);
        assert!(on_disk.is_completed("vocal_instrumental"));
        assert_eq!(on_disk, store.metadata("20240301101500").unwrap());
    }

    #[test]
    fn test_rescan_drops_vanished_projects() {
        let root = TempDir::new().unwrap();
        let store = open_store(&root);
        let dir = store.create_project("20240301101500", "song.wav").unwrap();
        store.create_project("20240302101500", "other.wav").unwrap();

        fs::remove_dir_all(&dir).unwrap();
        assert_eq!(store.rescan_from_disk().unwrap(), 1);
        assert!(!store.contains("20240301101500"));

        let ids: Vec<String> = store.history().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["20240302101500"]);
    }

    #[test]
    fn test_resolve_file() {
        let root = TempDir::new().unwrap();
        let store = open_store(&root);
        let dir = store.create_project("20240301101500", "song.wav").unwrap();
        fs::write(dir.join("vocals.wav"), b"").unwrap();

        assert_eq!(
            store.resolve_file("20240301101500", "vocals.wav").unwrap(),
            dir.join("vocals.wav")
        );
        assert!(matches!(
            store.resolve_file("20240301101500", "../secret.wav"),
            Err(StemflowError::InvalidFilename { .. })
        ));
        assert!(matches!(
            store.resolve_file("20240301101500", "drums.wav"),
            Err(StemflowError::FileNotFound { .. })
        ));
        assert!(matches!(
            store.resolve_file("nope", "vocals.wav"),
            Err(StemflowError::ProjectNotFound { .. })
        ));
    }

    #[test]
    fn test_project_lock_is_shared_per_id() {
        let root = TempDir::new().unwrap();
        let store = open_store(&root);

        let a = store.project_lock("p1");
        let b = store.project_lock("p1");
        let c = store.project_lock("p2");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
