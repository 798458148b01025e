//! Mock runner for testing
//!
//! Doesn't separate anything. Writes a short silent WAV for every file a
//! module declares, so the pipeline can be exercised end to end without
//! external tools.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use super::runner::{execution_error, ModuleRunner, RunContext};
use crate::audio::{write_wav, AudioBuffer};
use crate::error::Result;
use crate::modules::ModuleDescriptor;

/// Sample rate of generated stems.
pub const MOCK_SAMPLE_RATE: u32 = 44100;

/// Frames per generated stem (100ms).
pub const MOCK_FRAMES: usize = 4410;

/// Mock runner that fabricates silent stems.
#[derive(Default)]
pub struct MockRunner {
    failing: HashSet<String>,
    invocations: Mutex<HashMap<String, usize>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `module_id` fail on every run.
    pub fn failing(mut self, module_id: &str) -> Self {
        self.failing.insert(module_id.to_string());
        self
    }

    /// How many times `module_id` was run.
    pub fn invocations(&self, module_id: &str) -> usize {
        self.counts().get(module_id).copied().unwrap_or(0)
    }

    /// Total runs over all modules.
    pub fn total_invocations(&self) -> usize {
        self.counts().values().sum()
    }

    fn counts(&self) -> std::sync::MutexGuard<'_, HashMap<String, usize>> {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl ModuleRunner for MockRunner {
    fn run(&self, module: &ModuleDescriptor, ctx: &RunContext) -> Result<Vec<String>> {
        *self.counts().entry(module.id.clone()).or_insert(0) += 1;

        if self.failing.contains(&module.id) {
            return Err(execution_error(&module.id, "mock failure"));
        }

        let silence = AudioBuffer::new(MOCK_FRAMES, 2, MOCK_SAMPLE_RATE);
        for file in &module.produces {
            write_wav(&silence, &ctx.project_dir.join(file))?;
        }

        debug!("Mock {} wrote {:?}", module.id, module.produces);
        Ok(module.produces.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::read_audio;
    use crate::error::StemflowError;
    use crate::modules::{ModuleRegistry, LEAD_BACKING, VOCAL_INSTRUMENTAL};
    use tempfile::TempDir;

    fn context(dir: &std::path::Path) -> RunContext {
        RunContext {
            project_id: "p".to_string(),
            project_dir: dir.to_path_buf(),
            original: dir.join("song.wav"),
            input: dir.join("song.wav"),
            artifacts: Vec::new(),
        }
    }

    #[test]
    fn test_mock_writes_declared_outputs() {
        let dir = TempDir::new().unwrap();
        let registry = ModuleRegistry::builtin().unwrap();
        let runner = MockRunner::new();

        let produced = runner
            .run(registry.get(VOCAL_INSTRUMENTAL).unwrap(), &context(dir.path()))
            .unwrap();

        assert_eq!(produced, vec!["vocals.wav", "instrumental.wav"]);
        let vocals = read_audio(&dir.path().join("vocals.wav")).unwrap();
        assert_eq!(vocals.sample_rate, MOCK_SAMPLE_RATE);
        assert_eq!(vocals.num_frames(), MOCK_FRAMES);
        assert_eq!(runner.invocations(VOCAL_INSTRUMENTAL), 1);
    }

    #[test]
    fn test_mock_failure() {
        let dir = TempDir::new().unwrap();
        let registry = ModuleRegistry::builtin().unwrap();
        let runner = MockRunner::new().failing(LEAD_BACKING);

        let result = runner.run(registry.get(LEAD_BACKING).unwrap(), &context(dir.path()));
        assert!(matches!(result, Err(StemflowError::ModuleExecution { .. })));
        assert_eq!(runner.invocations(LEAD_BACKING), 1);
        assert!(!dir.path().join("lead_vocals.wav").exists());
    }
}
