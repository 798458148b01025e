//! Mixing of project stems into new artifacts.

pub mod engine;

pub use engine::{mix_buffers, MixEngine, UNIFIED_SUFFIX};
