//! CLI Module
//!
//! Command-line interface for the stemflow library manager.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stemflow - stem separation pipeline and project library
#[derive(Parser, Debug)]
#[command(name = "stemflow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON configuration file
    #[arg(long, global = true, env = "STEMFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Library root (overrides the configuration file)
    #[arg(long, global = true, env = "STEMFLOW_LIBRARY")]
    pub library: Option<PathBuf>,

    /// Use the mock runner instead of configured commands
    #[arg(long, global = true)]
    pub mock: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the available modules
    #[command(name = "modules")]
    Modules {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Import an audio file as a new project
    #[command(name = "import")]
    Import {
        /// Audio file to import
        file: PathBuf,

        /// Modules to run right away
        #[arg(short, long, value_delimiter = ',')]
        modules: Vec<String>,

        /// Project id (defaults to the current timestamp)
        #[arg(long)]
        id: Option<String>,
    },

    /// Run modules on a project
    #[command(name = "process")]
    Process {
        /// Project id
        id: String,

        /// Modules to run
        #[arg(short, long, value_delimiter = ',', required = true)]
        modules: Vec<String>,

        /// Original filename, for projects without a record yet
        #[arg(long)]
        original: Option<String>,
    },

    /// List all projects, newest first
    #[command(name = "history")]
    History,

    /// Print a project's record
    #[command(name = "show")]
    Show {
        /// Project id
        id: String,
    },

    /// Mix stems of a project into a new track
    #[command(name = "unify")]
    Unify {
        /// Project id
        id: String,

        /// Stem filenames, at least two
        #[arg(required = true, num_args = 2..)]
        tracks: Vec<String>,
    },

    /// Export a project (or selected stems) as a tar.gz archive
    #[command(name = "export")]
    Export {
        /// Project id
        id: String,

        /// Files to include (defaults to the whole project folder)
        tracks: Vec<String>,

        /// Output folder (defaults to the configured export folder)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Rebuild the project index from the library folder
    #[command(name = "rescan")]
    Rescan,
}
