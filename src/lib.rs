//! `shortcut_migrate` - Pivotal Tracker to Shortcut migration CLI library.
//!
//! This crate provides the command-line layer for the `scm` tool. The
//! migration machinery itself lives in [`migrate_lib`].
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`config`] - `config.json` + environment loading and validation
//! - [`logging`] - tracing subscriber setup

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod logging;

/// Run the CLI application.
///
/// This is the main entry point called from `main()`.
///
/// # Errors
///
/// Returns an error if command execution fails.
pub fn run() -> anyhow::Result<()> {
    cli::run()
}
