//! Module Pipeline
//!
//! Resolves requested modules into an ordered plan and runs it against a
//! project through a [`ModuleRunner`].

pub mod executor;
pub mod mock;
pub mod runner;

pub use executor::PipelineExecutor;
pub use mock::MockRunner;
pub use runner::{CommandRunner, ModuleRunner, RunContext};
