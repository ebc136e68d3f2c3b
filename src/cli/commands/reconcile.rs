use anyhow::{Context, Result};

use migrate_lib::api::ShortcutClient;
use migrate_lib::model::ParsedRow;
use migrate_lib::reconcile::epics::NameAffinity;
use migrate_lib::reconcile::{blockers, epics, rewrite};
use migrate_lib::rowparse::ExportReader;
use migrate_lib::workspace::WorkspaceSnapshot;

use crate::cli::{ReconcileCommand, ReconcileSubcommand};
use crate::config::Config;

/// Execute a reconciliation subcommand.
///
/// All three utilities are idempotent: they diff desired state against the
/// workspace and only write the difference.
///
/// # Errors
///
/// Returns an error on parse or API failure.
pub fn execute(config: &Config, command: &ReconcileCommand) -> Result<()> {
    let mut api = ShortcutClient::new(config.token.clone());
    let snapshot =
        WorkspaceSnapshot::fetch(&mut api).context("building workspace snapshot")?;

    match &command.command {
        ReconcileSubcommand::Epics(args) => {
            let rows = read_rows(config)?;
            let scorer = NameAffinity {
                always_win: lowercased(&args.always_win),
                never_win: lowercased(&args.never_win),
            };
            let updated = epics::reassign(&mut api, &snapshot, &rows, &scorer)?;
            println!("Assigned {updated} stories to their favorite epic.");
        }
        ReconcileSubcommand::Blockers => {
            let rows = read_rows(config)?;
            let written = blockers::inject(&mut api, &snapshot, &rows)?;
            println!("Created {written} blocking story links.");
        }
        ReconcileSubcommand::Rewrite => {
            let report = rewrite::apply(&mut api, &snapshot)?;
            println!(
                "Rewrote {} story descriptions, {} epic descriptions, and {} comments.",
                report.story_descriptions, report.epic_descriptions, report.comments
            );
        }
    }
    Ok(())
}

fn read_rows(config: &Config) -> Result<Vec<ParsedRow>> {
    let rows = ExportReader::open(&config.pt_csv_file)?
        .collect::<migrate_lib::Result<Vec<_>>>()?;
    Ok(rows)
}

fn lowercased(names: &[String]) -> Vec<String> {
    names.iter().map(|n| n.to_lowercase()).collect()
}
