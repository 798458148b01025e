//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::Cli;
use crate::config::Config;
use crate::error::{Result, StemflowError};
use crate::mix::MixEngine;
use crate::modules::ModuleRegistry;
use crate::pipeline::{CommandRunner, MockRunner, ModuleRunner, PipelineExecutor};
use crate::project::scan::list_audio_files;
use crate::project::{export_project, import_audio, Project, ProjectStore, StemRef};

/// Result of a pipeline run as reported to callers.
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub id: String,
    pub stems: Vec<StemRef>,
}

impl From<&Project> for ProcessResponse {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id.clone(),
            stems: project.stem_refs(),
        }
    }
}

/// Result of a mix.
#[derive(Debug, Serialize)]
pub struct MixResponse {
    pub new_track: String,
}

/// Everything a command needs: resolved configuration, the registry, the
/// opened store and the runner.
pub struct App {
    pub config: Config,
    pub registry: Arc<ModuleRegistry>,
    pub store: Arc<ProjectStore>,
    pub runner: Arc<dyn ModuleRunner>,
}

impl App {
    /// Resolve configuration from the command line and open the library.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut config = Config::resolve(cli.config.as_deref())?;
        if let Some(library) = &cli.library {
            config.library_root = library.clone();
        }
        Self::open(config, cli.mock)
    }

    pub fn open(config: Config, mock: bool) -> Result<Self> {
        let registry = Arc::new(ModuleRegistry::builtin()?);
        config.validate(&registry)?;

        let store = Arc::new(ProjectStore::open(&config.library_root, Arc::clone(&registry))?);
        let runner: Arc<dyn ModuleRunner> = if mock {
            Arc::new(MockRunner::new())
        } else {
            Arc::new(CommandRunner::new(config.runners.clone()))
        };
        debug!("Using {} runner", runner.name());

        Ok(Self {
            config,
            registry,
            store,
            runner,
        })
    }

    fn executor(&self) -> PipelineExecutor {
        PipelineExecutor::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.store),
            Arc::clone(&self.runner),
        )
    }
}

/// Print the module catalog.
pub fn list_modules(app: &App, json: bool) -> Result<()> {
    let modules = app.registry.list_modules();
    if json {
        println!("{}", serde_json::to_string_pretty(modules)?);
        return Ok(());
    }

    println!("Available modules:");
    println!("{:-<60}", "");
    for module in modules {
        let deps = if module.depends_on.is_empty() {
            String::new()
        } else {
            format!(" (after {})", module.depends_on.join(", "))
        };
        println!("{:<20} [{}] {}{}", module.id, module.category, module.description, deps);
    }
    println!("{:-<60}", "");

    Ok(())
}

/// Stage a file as a new project and optionally run modules on it.
pub fn import(app: &App, file: &Path, modules: &[String], id: Option<&str>) -> Result<ProcessResponse> {
    let invalid = app.registry.validate(modules);
    if !invalid.is_empty() {
        return Err(StemflowError::InvalidModule { ids: invalid });
    }

    let project_id = id.map(String::from).unwrap_or_else(ProjectStore::new_project_id);
    let imported = import_audio(&app.store, file, &project_id)?;

    let project = app
        .executor()
        .process(&imported.project_id, &imported.original_filename, modules)?;
    info!("Imported project {}", project.id);
    Ok(ProcessResponse::from(&project))
}

/// Run modules on a project.
pub fn process(
    app: &App,
    project_id: &str,
    modules: &[String],
    original: Option<&str>,
) -> Result<ProcessResponse> {
    let original = match original {
        Some(name) => name.to_string(),
        None => find_original(app, project_id)?,
    };

    let project = app.executor().process(project_id, &original, modules)?;
    Ok(ProcessResponse::from(&project))
}

/// Original filename of a known project, or the only audio file staged in
/// the folder of a new one.
fn find_original(app: &App, project_id: &str) -> Result<String> {
    if let Ok(project) = app.store.metadata(project_id) {
        if let Some(name) = project.original_filename {
            return Ok(name);
        }
    }

    let dir = app.store.project_dir(project_id)?;
    let files = if dir.is_dir() {
        list_audio_files(&dir)?
    } else {
        Vec::new()
    };
    match files.as_slice() {
        [only] => Ok(only.clone()),
        _ => Err(StemflowError::OriginalMissing {
            id: project_id.to_string(),
            filename: String::from("<unspecified>"),
        }),
    }
}

/// Print all projects, newest first.
pub fn show_history(app: &App) -> Result<()> {
    let projects = app.store.history();
    if projects.is_empty() {
        println!("No projects in {}", app.store.library_root().display());
        return Ok(());
    }

    println!("Projects:");
    println!("{:-<60}", "");
    for project in &projects {
        let modules: Vec<&str> = project.completed_modules.iter().map(String::as_str).collect();
        println!(
            "{}  {:<24} stems: {:<3} modules: {}",
            project.id,
            project.name,
            project.stems.len(),
            if modules.is_empty() { "-".to_string() } else { modules.join(", ") }
        );
    }
    println!("{:-<60}", "");

    Ok(())
}

/// Print one project's record as JSON.
pub fn show_project(app: &App, project_id: &str) -> Result<()> {
    let project = app.store.metadata(project_id)?;
    println!("{}", serde_json::to_string_pretty(&project)?);
    Ok(())
}

/// Mix stems of a project.
pub fn unify(app: &App, project_id: &str, tracks: &[String]) -> Result<MixResponse> {
    let engine = MixEngine::new(Arc::clone(&app.store));
    let new_track = engine.unify(project_id, tracks)?;
    Ok(MixResponse { new_track })
}

/// Write an export archive and return its path.
pub fn export(app: &App, project_id: &str, tracks: &[String], out: Option<&Path>) -> Result<PathBuf> {
    let out_dir = out.unwrap_or(&app.config.export_dir);
    let archive = export_project(&app.store, project_id, tracks, out_dir)?;
    println!("Exported: {}", archive.display());
    Ok(archive)
}

/// Rebuild the index from disk.
pub fn rescan(app: &App) -> Result<()> {
    let count = app.store.rescan_from_disk()?;
    println!("Found {} projects in {}", count, app.store.library_root().display());
    Ok(())
}

/// Print a serializable response as JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
