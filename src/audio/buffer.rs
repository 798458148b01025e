//! Audio Buffer
//!
//! Planar sample storage used by the mixer. A buffer is a frames × channels
//! matrix held as one `Vec<f32>` per channel; mono audio keeps an explicit
//! single channel.

/// Audio file extensions recognised as project stems.
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "flac"];

/// Check whether a filename carries one of the stem extensions (case-insensitive).
pub fn is_audio_file(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => AUDIO_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext)),
        _ => false,
    }
}

/// Decoded audio with its sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample rate in Hz.
    pub sample_rate: u32,

    /// One vector per channel, all of equal length.
    pub samples: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Create a zero-filled buffer.
    pub fn new(num_frames: usize, num_channels: usize, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            samples: vec![vec![0.0; num_frames]; num_channels],
        }
    }

    /// Build a buffer from interleaved samples `[L, R, L, R, ...]`.
    pub fn from_interleaved(interleaved: &[f32], num_channels: usize, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            samples: deinterleave(interleaved, num_channels.max(1)),
        }
    }

    /// Get number of channels
    pub fn num_channels(&self) -> usize {
        self.samples.len()
    }

    /// Get number of frames (samples per channel)
    pub fn num_frames(&self) -> usize {
        self.samples.first().map_or(0, Vec::len)
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.num_frames() == 0
    }

    /// Get a reference to a channel's samples
    pub fn channel(&self, ch: usize) -> &[f32] {
        &self.samples[ch]
    }

    /// Interleave channels for writing.
    pub fn to_interleaved(&self) -> Vec<f32> {
        interleave(&self.samples)
    }

    /// Clamp every sample into [-1.0, 1.0].
    pub fn hard_clip(&mut self) {
        for channel in &mut self.samples {
            for sample in channel.iter_mut() {
                *sample = sample.clamp(-1.0, 1.0);
            }
        }
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples
            .iter()
            .flat_map(|ch| ch.iter())
            .fold(0.0_f32, |peak, s| peak.max(s.abs()))
    }
}

/// De-interleave samples from [L,R,L,R,...] to [[L,L,...], [R,R,...]]
fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut result = vec![Vec::with_capacity(frames); channels];

    for (i, sample) in samples.iter().take(frames * channels).enumerate() {
        result[i % channels].push(*sample);
    }

    result
}

/// Interleave channels from [[L,L,...], [R,R,...]] to [L,R,L,R,...]
fn interleave(channels: &[Vec<f32>]) -> Vec<f32> {
    if channels.is_empty() {
        return Vec::new();
    }

    let num_channels = channels.len();
    let frames = channels[0].len();
    let mut result = Vec::with_capacity(frames * num_channels);

    for frame in 0..frames {
        for channel in channels {
            result.push(channel[frame]);
        }
    }

    result
}
