//! Audio Module
//!
//! Sample buffers and file I/O shared by the mixer and the project scanner.

pub mod buffer;
pub mod io;

pub use buffer::{is_audio_file, AudioBuffer, AUDIO_EXTENSIONS};
pub use io::{generate_test_tone, read_audio, write_wav, write_wav_pcm16};
