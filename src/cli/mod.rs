//! Command-line interface for `shortcut_migrate`.
//!
//! This module provides the CLI parsing and command routing using clap.

pub mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::logging;

/// `shortcut_migrate` (scm) - Pivotal Tracker to Shortcut migration.
#[derive(Parser, Debug)]
#[command(name = "scm")]
#[command(
    author,
    version,
    about = "Migrate a Pivotal Tracker CSV export into a Shortcut workspace",
    long_about = None,
    after_help = "Credentials come from the SHORTCUT_API_TOKEN environment variable."
)]
pub struct Cli {
    /// Path to the config file
    #[arg(long, global = true, default_value = "config.json")]
    pub config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import the export into Shortcut (dry run unless --apply)
    Import(ImportArgs),

    /// Post-migration reconciliation utilities
    Reconcile(ReconcileCommand),

    /// Delete everything listed in a previous run's manifest
    Delete(DeleteArgs),
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Perform writes; without this flag the import only reports what it
    /// would create
    #[arg(long)]
    pub apply: bool,
}

#[derive(Args, Debug)]
pub struct ReconcileCommand {
    /// Reconciliation subcommand
    #[command(subcommand)]
    pub command: ReconcileSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum ReconcileSubcommand {
    /// Assign stories with several candidate epics to the best-scoring one
    Epics(EpicsArgs),

    /// Recreate "blocks" story links recorded in the export
    Blockers,

    /// Rewrite #id / ##id references into Shortcut URLs
    Rewrite,
}

#[derive(Args, Debug)]
pub struct EpicsArgs {
    /// Epic name that always outranks other candidates (repeatable)
    #[arg(long = "always-win", value_name = "NAME")]
    pub always_win: Vec<String>,

    /// Epic name that never wins against other candidates (repeatable)
    #[arg(long = "never-win", value_name = "NAME")]
    pub never_win: Vec<String>,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Perform deletions; without this flag only a summary is printed
    #[arg(long)]
    pub apply: bool,
}

/// Run the CLI.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the command fails.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.quiet)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    let config = crate::config::load(&cli.config)?;

    match cli.command {
        Commands::Import(args) => commands::import::execute(&config, &args),
        Commands::Reconcile(command) => commands::reconcile::execute(&config, &command),
        Commands::Delete(args) => commands::delete::execute(&config, &args),
    }
}
