//! Stemflow CLI
//!
//! Command-line interface for the stemflow pipeline and project library.

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stemflow::cli::commands::{self, App};
use stemflow::cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Stemflow v{}", env!("CARGO_PKG_VERSION"));

    let app = App::from_cli(&cli).context("failed to open the project library")?;
    handle_command(&app, cli.command)
}

fn handle_command(app: &App, cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Modules { json } => commands::list_modules(app, json)?,
        Commands::Import { file, modules, id } => {
            let response = commands::import(app, &file, &modules, id.as_deref())
                .with_context(|| format!("failed to import {}", file.display()))?;
            commands::print_json(&response)?;
        }
        Commands::Process {
            id,
            modules,
            original,
        } => {
            let response = commands::process(app, &id, &modules, original.as_deref())
                .with_context(|| format!("failed to process {}", id))?;
            commands::print_json(&response)?;
        }
        Commands::History => commands::show_history(app)?,
        Commands::Show { id } => commands::show_project(app, &id)?,
        Commands::Unify { id, tracks } => {
            let response = commands::unify(app, &id, &tracks)
                .with_context(|| format!("failed to mix tracks of {}", id))?;
            commands::print_json(&response)?;
        }
        Commands::Export { id, tracks, out } => {
            commands::export(app, &id, &tracks, out.as_deref())
                .with_context(|| format!("failed to export {}", id))?;
        }
        Commands::Rescan => commands::rescan(app)?,
    }
    Ok(())
}
