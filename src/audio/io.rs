//! Audio file I/O
//!
//! Decodes project stems into [`AudioBuffer`]s and writes mixes back out.
//! WAV goes through hound; MP3 and FLAC are decoded with symphonia.
//! Sample rates are preserved as read, never converted.

use std::fs::File;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::audio::buffer::AudioBuffer;
use crate::error::{Result, StemflowError};

/// Read an audio file into a planar f32 buffer at its native sample rate.
///
/// # Errors
/// * `FileNotFound` - If the file does not exist
/// * `UnsupportedFormat` - If the extension is not wav, mp3 or flac
/// * `InvalidAudio` - If the file cannot be decoded
pub fn read_audio(path: &Path) -> Result<AudioBuffer> {
    if !path.exists() {
        return Err(StemflowError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let buffer = match ext.as_str() {
        "wav" => read_wav(path)?,
        "mp3" | "flac" => decode_compressed(path, &ext)?,
        other => {
            return Err(StemflowError::UnsupportedFormat {
                format: format!("'.{}' ({})", other, path.display()),
            })
        }
    };

    debug!(
        "Read {}: {} frames, {} channels @ {} Hz",
        path.display(),
        buffer.num_frames(),
        buffer.num_channels(),
        buffer.sample_rate
    );

    Ok(buffer)
}

/// Write a buffer as a 32-bit float WAV file.
pub fn write_wav(buffer: &AudioBuffer, path: &Path) -> Result<()> {
    let spec = WavSpec {
        channels: buffer.num_channels() as u16,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec).map_err(|e| wav_write_error(path, e))?;
    for sample in buffer.to_interleaved() {
        writer
            .write_sample(sample)
            .map_err(|e| wav_write_error(path, e))?;
    }
    writer.finalize().map_err(|e| wav_write_error(path, e))?;

    Ok(())
}

/// Write a buffer as a 16-bit PCM WAV file.
pub fn write_wav_pcm16(buffer: &AudioBuffer, path: &Path) -> Result<()> {
    let spec = WavSpec {
        channels: buffer.num_channels() as u16,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec).map_err(|e| wav_write_error(path, e))?;
    for sample in buffer.to_interleaved() {
        let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        writer
            .write_sample(scaled)
            .map_err(|e| wav_write_error(path, e))?;
    }
    writer.finalize().map_err(|e| wav_write_error(path, e))?;

    Ok(())
}

/// Generate a sine test tone with the same signal on every channel.
pub fn generate_test_tone(
    frequency: f32,
    amplitude: f32,
    num_frames: usize,
    num_channels: usize,
    sample_rate: u32,
) -> AudioBuffer {
    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;
    let channel: Vec<f32> = (0..num_frames)
        .map(|i| amplitude * (angular_freq * i as f32).sin())
        .collect();

    AudioBuffer {
        sample_rate,
        samples: vec![channel; num_channels],
    }
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn wav_write_error(path: &Path, e: hound::Error) -> StemflowError {
    match e {
        hound::Error::IoError(source) => StemflowError::FileWriteError {
            path: path.to_path_buf(),
            source,
        },
        other => StemflowError::InvalidAudio {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

fn read_wav(path: &Path) -> Result<AudioBuffer> {
    let reader = WavReader::open(path).map_err(|e| StemflowError::InvalidAudio {
        path: path.to_path_buf(),
        reason: format!("Failed to open WAV file: {}", e),
    })?;

    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(StemflowError::InvalidAudio {
            path: path.to_path_buf(),
            reason: "WAV header declares zero channels".to_string(),
        });
    }

    let samples = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)
        .map_err(|reason| StemflowError::InvalidAudio {
            path: path.to_path_buf(),
            reason,
        })?;

    Ok(AudioBuffer::from_interleaved(
        &samples,
        channels,
        spec.sample_rate,
    ))
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> std::result::Result<Vec<f32>, String> {
    let scale = match (sample_format, bits_per_sample) {
        (SampleFormat::Float, _) => {
            return reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| format!("Failed to read float samples: {}", e));
        }
        (SampleFormat::Int, 8) => 128.0,
        (SampleFormat::Int, 16) => 32768.0,
        // 24-bit stored as i32 in hound
        (SampleFormat::Int, 24) => 8388608.0,
        (SampleFormat::Int, 32) => 2147483648.0,
        (SampleFormat::Int, bits) => return Err(format!("{}-bit integer audio", bits)),
    };

    reader
        .samples::<i32>()
        .map(|s| s.map(|v| (v as f64 / scale) as f32))
        .collect::<std::result::Result<Vec<f32>, _>>()
        .map_err(|e| format!("Failed to read {}-bit samples: {}", bits_per_sample, e))
}

fn decode_compressed(path: &Path, ext: &str) -> Result<AudioBuffer> {
    let invalid = |reason: String| StemflowError::InvalidAudio {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|e| StemflowError::FileReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(ext);

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| invalid(format!("Failed to probe format: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| invalid("No audio track found".to_string()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count());

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| invalid(format!("Failed to create decoder: {}", e)))?;

    let mut interleaved: Vec<f32> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(invalid(format!("Failed to read packet: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate.get_or_insert(spec.rate);
                channels.get_or_insert(spec.channels.count());

                let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                samples.copy_interleaved_ref(decoded);
                interleaved.extend_from_slice(samples.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping corrupt packet in {}: {}", path.display(), e);
            }
            Err(e) => return Err(invalid(format!("Decode error: {}", e))),
        }
    }

    let sample_rate = sample_rate.ok_or_else(|| invalid("Sample rate not found".to_string()))?;
    let channels = channels.ok_or_else(|| invalid("Channel count not found".to_string()))?;

    Ok(AudioBuffer::from_interleaved(
        &interleaved,
        channels,
        sample_rate,
    ))
}
