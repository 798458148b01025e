//! Pipeline executor
//!
//! Runs a requested set of modules, plus everything they depend on, against
//! one project. Work is strictly sequential within a project and resumable:
//! modules already completed are never run again.

use std::sync::{Arc, PoisonError};

use tracing::{debug, info, warn};

use super::runner::{execution_error, ModuleRunner, RunContext};
use crate::error::{Result, StemflowError};
use crate::modules::ModuleRegistry;
use crate::project::scan::is_safe_component;
use crate::project::{Project, ProjectStore};

/// Runs module plans against projects of one store.
pub struct PipelineExecutor {
    registry: Arc<ModuleRegistry>,
    store: Arc<ProjectStore>,
    runner: Arc<dyn ModuleRunner>,
}

impl PipelineExecutor {
    /// Create an executor over a registry, a store and the runner doing the work.
    pub fn new(
        registry: Arc<ModuleRegistry>,
        store: Arc<ProjectStore>,
        runner: Arc<dyn ModuleRunner>,
    ) -> Self {
        Self {
            registry,
            store,
            runner,
        }
    }

    /// Get the store projects are recorded in.
    pub fn store(&self) -> &ProjectStore {
        &self.store
    }

    /// Bring `project_id` up to date with `requested` and everything it
    /// depends on.
    ///
    /// Unknown projects are created first; their original file must already
    /// be in the project folder. On a module failure the remaining plan is
    /// abandoned and modules finished earlier in the call stay recorded.
    ///
    /// # Errors
    /// * `InvalidModule` - If any requested id is unregistered (nothing is touched)
    /// * `OriginalMissing` - If a new project's original file is absent
    /// * `ModuleExecution` - If a runner fails or a module's input is missing
    pub fn process<S: AsRef<str>>(
        &self,
        project_id: &str,
        original_filename: &str,
        requested: &[S],
    ) -> Result<Project> {
        let invalid = self.registry.validate(requested);
        if !invalid.is_empty() {
            return Err(StemflowError::InvalidModule { ids: invalid });
        }
        if !is_safe_component(original_filename) {
            return Err(StemflowError::InvalidFilename {
                name: original_filename.to_string(),
            });
        }
        let plan = self.registry.resolve_order(requested)?;

        let lock = self.store.project_lock(project_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        if !self.store.contains(project_id) {
            let dir = self.store.project_dir(project_id)?;
            if !dir.join(original_filename).is_file() {
                return Err(StemflowError::OriginalMissing {
                    id: project_id.to_string(),
                    filename: original_filename.to_string(),
                });
            }
            self.store.create_project(project_id, original_filename)?;
        }

        let project_dir = self.store.project_path(project_id)?;
        let mut project = self.store.metadata(project_id)?;
        let original = project_dir.join(
            project
                .original_filename
                .as_deref()
                .unwrap_or(original_filename),
        );

        info!(
            "Processing {} with plan [{}] via {} runner",
            project_id,
            plan.join(", "),
            self.runner.name()
        );

        for module_id in &plan {
            if project.is_completed(module_id) {
                debug!("Skipping {}: already completed", module_id);
                continue;
            }
            let module = self
                .registry
                .get(module_id)
                .ok_or_else(|| StemflowError::InvalidModule {
                    ids: vec![module_id.clone()],
                })?;

            if !module.produces.is_empty()
                && module.produces.iter().all(|f| project_dir.join(f).is_file())
            {
                info!("{} outputs already on disk, recording without running", module_id);
                project = self
                    .store
                    .record_module_completion(project_id, module_id, &module.produces)?;
                continue;
            }

            let input = match &module.input {
                Some(artifact) => project_dir.join(artifact),
                None => original.clone(),
            };
            if !input.is_file() {
                return Err(execution_error(
                    module_id,
                    &format!("input {} is missing", input.display()),
                ));
            }

            let ctx = RunContext {
                project_id: project_id.to_string(),
                project_dir: project_dir.clone(),
                original: original.clone(),
                input,
                artifacts: project.stems.clone(),
            };

            let produced = self.runner.run(module, &ctx).map_err(|e| match e {
                StemflowError::ModuleExecution { .. } => e,
                other => execution_error(module_id, &other.to_string()),
            });
            let produced = match produced {
                Ok(produced) => produced,
                Err(e) => {
                    warn!("Pipeline for {} stopped at {}: {}", project_id, module_id, e);
                    return Err(e);
                }
            };

            project = self
                .store
                .record_module_completion(project_id, module_id, &produced)?;
            info!("{} completed for {} ({} files)", module_id, project_id, produced.len());
        }

        Ok(project)
    }
}
