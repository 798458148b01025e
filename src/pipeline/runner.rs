//! Module runners
//!
//! A runner performs the actual separation work for one module. The
//! executor decides *what* runs and in which order; runners only know how
//! to turn an input file into stems inside the project folder.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};

use crate::config::RunnerCommand;
use crate::error::{Result, StemflowError};
use crate::modules::ModuleDescriptor;
use crate::project::scan::list_audio_files;

/// Lines of child stderr kept in an execution error.
const STDERR_TAIL_LINES: usize = 10;

/// Everything a runner needs to execute one module.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub project_id: String,

    /// Project folder; runners write their outputs here.
    pub project_dir: PathBuf,

    /// The project's original audio file.
    pub original: PathBuf,

    /// File the module consumes: its declared input artifact, or the
    /// original for root modules.
    pub input: PathBuf,

    /// Artifacts present in the project before this module runs.
    pub artifacts: Vec<String>,
}

/// Trait implemented by everything that can execute a module
pub trait ModuleRunner: Send + Sync {
    /// Run `module` and return the file names it produced in the project
    /// folder.
    fn run(&self, module: &ModuleDescriptor, ctx: &RunContext) -> Result<Vec<String>>;

    /// Short name used in log lines.
    fn name(&self) -> &str {
        "runner"
    }
}

/// Runs each module as an external program.
pub struct CommandRunner {
    commands: BTreeMap<String, RunnerCommand>,
}

impl CommandRunner {
    pub fn new(commands: BTreeMap<String, RunnerCommand>) -> Self {
        Self { commands }
    }

    /// Check whether a command is configured for this module.
    pub fn has_command(&self, module_id: &str) -> bool {
        self.commands.contains_key(module_id)
    }

    fn build(&self, command: &RunnerCommand, module: &ModuleDescriptor, ctx: &RunContext) -> Command {
        let mut cmd = Command::new(&command.program);
        for arg in &command.args {
            cmd.arg(substitute(arg, module, ctx));
        }
        for (key, value) in &command.env {
            cmd.env(key, substitute(value, module, ctx));
        }
        cmd.current_dir(&ctx.project_dir);
        cmd
    }
}

impl ModuleRunner for CommandRunner {
    fn run(&self, module: &ModuleDescriptor, ctx: &RunContext) -> Result<Vec<String>> {
        let command = self
            .commands
            .get(&module.id)
            .ok_or_else(|| execution_error(&module.id, "no runner command configured"))?;

        let before: BTreeSet<String> = list_audio_files(&ctx.project_dir)?.into_iter().collect();

        info!(
            "Running {} for project {}: {} {}",
            module.id,
            ctx.project_id,
            command.program,
            command.args.join(" ")
        );
        let output = self
            .build(command, module, ctx)
            .output()
            .map_err(|e| execution_error(&module.id, &format!("failed to start {}: {}", command.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = stderr_tail(&stderr);
            warn!("{} exited with {}: {}", module.id, output.status, tail);
            return Err(execution_error(
                &module.id,
                &format!("{} exited with {}: {}", command.program, output.status, tail),
            ));
        }

        let after = list_audio_files(&ctx.project_dir)?;
        let mut produced: Vec<String> = after.into_iter().filter(|f| !before.contains(f)).collect();

        if produced.is_empty() {
            // Tools that overwrite outputs in place show no new files
            produced = module
                .produces
                .iter()
                .filter(|f| ctx.project_dir.join(f.as_str()).is_file())
                .cloned()
                .collect();
        }

        debug!("{} produced {:?}", module.id, produced);
        Ok(produced)
    }

    fn name(&self) -> &str {
        "command"
    }
}

/// Replace `{input}`, `{original}`, `{project_dir}` and `{module}`.
pub fn substitute(template: &str, module: &ModuleDescriptor, ctx: &RunContext) -> String {
    template
        .replace("{input}", &path_str(&ctx.input))
        .replace("{original}", &path_str(&ctx.original))
        .replace("{project_dir}", &path_str(&ctx.project_dir))
        .replace("{module}", &module.id)
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

pub(crate) fn execution_error(module_id: &str, reason: &str) -> StemflowError {
    StemflowError::ModuleExecution {
        module: module_id.to_string(),
        reason: reason.to_string(),
    }
}
