//! Mix engine
//!
//! Sums two or more stems of a project into a single new artifact.

use std::fs;
use std::path::Path;
use std::sync::{Arc, PoisonError};

use tracing::{debug, info, warn};

use crate::audio::{read_audio, write_wav, AudioBuffer};
use crate::error::{Result, StemflowError};
use crate::project::scan::is_safe_component;
use crate::project::ProjectStore;

/// Suffix of every mix output.
pub const UNIFIED_SUFFIX: &str = ".unified.wav";

/// Mixes stems of projects in one store.
pub struct MixEngine {
    store: Arc<ProjectStore>,
}

impl MixEngine {
    /// Create a mix engine writing into `store`'s project folders.
    pub fn new(store: Arc<ProjectStore>) -> Self {
        Self { store }
    }

    /// Name of the file a mix of `stems` is written to: the stem basenames
    /// without extension joined by `_`, plus [`UNIFIED_SUFFIX`].
    pub fn output_name<S: AsRef<str>>(stems: &[S]) -> String {
        let parts: Vec<&str> = stems
            .iter()
            .map(|s| {
                let name: &str = s.as_ref();
                Path::new(name)
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .unwrap_or(name)
            })
            .collect();
        format!("{}{}", parts.join("_"), UNIFIED_SUFFIX)
    }

    /// Mix `stems` of `project_id` and register the result.
    ///
    /// Returns the new artifact's filename. An existing file of that name is
    /// overwritten.
    ///
    /// # Errors
    /// * `NotEnoughTracks` - If fewer than two stems are given
    /// * `ProjectNotFound` - If the project is unknown
    /// * `SampleRateMismatch` - If a stem's rate differs from the first one
    /// * `ChannelMismatch` - If channel counts differ and the stem is not mono
    pub fn unify<S: AsRef<str>>(&self, project_id: &str, stems: &[S]) -> Result<String> {
        if stems.len() < 2 {
            return Err(StemflowError::NotEnoughTracks { count: stems.len() });
        }
        for stem in stems {
            let name: &str = stem.as_ref();
            if !is_safe_component(name) {
                return Err(StemflowError::InvalidFilename {
                    name: name.to_string(),
                });
            }
        }

        let project_dir = self.store.project_path(project_id)?;
        let lock = self.store.project_lock(project_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut inputs = Vec::with_capacity(stems.len());
        for stem in stems {
            let name: &str = stem.as_ref();
            let buffer = read_audio(&project_dir.join(name))?;
            debug!(
                "Loaded {}: {} frames, {} channels @ {} Hz",
                name,
                buffer.num_frames(),
                buffer.num_channels(),
                buffer.sample_rate
            );
            inputs.push((name, buffer));
        }

        let mixed = mix_buffers(&inputs)?;

        let output_name = Self::output_name(stems);
        let output_path = project_dir.join(&output_name);
        write_wav(&mixed, &output_path).map_err(|e| {
            remove_partial(&output_path);
            e
        })?;

        if let Err(e) = self.store.record_artifact(project_id, &output_name) {
            remove_partial(&output_path);
            return Err(e);
        }

        info!(
            "Unified {} stems of {} into {}",
            stems.len(),
            project_id,
            output_name
        );
        Ok(output_name)
    }
}

/// Sum named buffers into one, zero-padding short inputs and broadcasting
/// mono inputs across channels. The result is hard-clipped to [-1, 1].
pub fn mix_buffers(inputs: &[(&str, AudioBuffer)]) -> Result<AudioBuffer> {
    let expected_rate = match inputs.first() {
        Some((_, first)) => first.sample_rate,
        None => return Err(StemflowError::NotEnoughTracks { count: 0 }),
    };

    for (name, buffer) in inputs {
        if buffer.sample_rate != expected_rate {
            return Err(StemflowError::SampleRateMismatch {
                file: name.to_string(),
                found: buffer.sample_rate,
                expected: expected_rate,
            });
        }
    }

    let max_len = inputs.iter().map(|(_, b)| b.num_frames()).max().unwrap_or(0);
    let max_channels = inputs.iter().map(|(_, b)| b.num_channels()).max().unwrap_or(0);

    for (name, buffer) in inputs {
        let channels = buffer.num_channels();
        if channels != max_channels && channels != 1 {
            return Err(StemflowError::ChannelMismatch {
                file: name.to_string(),
                found: channels,
                expected: max_channels,
            });
        }
    }

    let mut mixed = AudioBuffer::new(max_len, max_channels, expected_rate);
    for (_, buffer) in inputs {
        let mono = buffer.num_channels() == 1;
        for (ch, out) in mixed.samples.iter_mut().enumerate() {
            let source = if mono { buffer.channel(0) } else { buffer.channel(ch) };
            for (acc, sample) in out.iter_mut().zip(source) {
                *acc += *sample;
            }
        }
    }

    mixed.hard_clip();
    Ok(mixed)
}

fn remove_partial(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to remove partial mix {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_output_name() {
        assert_eq!(
            MixEngine::output_name(&["vocals.wav", "drums.mp3"]),
            "vocals_drums.unified.wav"
        );
    }

    #[test]
    fn test_mix_pads_short_input() {
        let long = AudioBuffer::from_interleaved(&[0.1, 0.1, 0.2, 0.2, 0.3, 0.3], 2, 44100);
        let short = AudioBuffer::from_interleaved(&[0.5, 0.5], 2, 44100);

        let mixed = mix_buffers(&[("long.wav", long), ("short.wav", short)]).unwrap();
        assert_eq!(mixed.num_frames(), 3);
        assert_relative_eq!(mixed.channel(0)[0], 0.6);
        assert_relative_eq!(mixed.channel(1)[2], 0.3);
    }

    #[test]
    fn test_mix_clips() {
        let a = AudioBuffer::from_interleaved(&[0.8, -0.9], 1, 48000);
        let b = AudioBuffer::from_interleaved(&[0.7, -0.6], 1, 48000);

        let mixed = mix_buffers(&[("a.wav", a), ("b.wav", b)]).unwrap();
        assert_eq!(mixed.channel(0), &[1.0, -1.0]);
    }

    #[test]
    fn test_mix_rejects_incompatible_channels() {
        let stereo = AudioBuffer::new(4, 2, 44100);
        let surround = AudioBuffer::new(4, 6, 44100);

        match mix_buffers(&[("stereo.wav", stereo), ("surround.wav", surround)]) {
            Err(StemflowError::ChannelMismatch {
                file,
                found,
                expected,
            }) => {
                assert_eq!(file, "stereo.wav");
                assert_eq!(found, 2);
                assert_eq!(expected, 6);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_mix_rate_mismatch_names_file() {
        let a = AudioBuffer::new(4, 2, 44100);
        let b = AudioBuffer::new(4, 2, 48000);

        match mix_buffers(&[("a.wav", a), ("b.wav", b)]) {
            Err(StemflowError::SampleRateMismatch {
                file,
                found,
                expected,
            }) => {
                assert_eq!(file, "b.wav");
                assert_eq!(found, 48000);
                assert_eq!(expected, 44100);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
