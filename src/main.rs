//! `shortcut_migrate` (scm) - Pivotal Tracker to Shortcut migration.
//!
//! One-shot forward migration of a Pivotal Tracker CSV export into a
//! Shortcut workspace, plus post-migration reconciliation utilities.

use shortcut_migrate::run;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
