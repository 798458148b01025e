//! Stemflow - Stem Separation Pipeline and Project Library
//!
//! Stemflow runs audio-separation modules on songs and keeps the results in
//! a library of project folders:
//! 1. Module registry - a validated dependency graph of separation steps
//! 2. Pipeline - resolves a request into an ordered plan and runs it
//! 3. Project store - one folder plus a metadata record per song
//! 4. Mix engine - sums chosen stems into a new track
//!
//! # Architecture
//!
//! Disk is the source of truth. The store indexes the library folder and
//! rewrites a project's record after every completed module, so an
//! interrupted pipeline resumes where it stopped.

pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod mix;
pub mod modules;
pub mod pipeline;
pub mod project;

pub use config::Config;
pub use error::{Result, StemflowError};
pub use mix::MixEngine;
pub use modules::{ModuleDescriptor, ModuleRegistry};
pub use pipeline::{ModuleRunner, PipelineExecutor};
pub use project::{Project, ProjectStore};
