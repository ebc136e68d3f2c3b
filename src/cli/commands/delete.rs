use anyhow::Result;

use migrate_lib::api::{ShortcutApi, ShortcutClient};
use migrate_lib::collector::Tally;
use migrate_lib::manifest;
use migrate_lib::model::EntityKind;
use migrate_lib::MigrateError;

use crate::cli::DeleteArgs;
use crate::config::Config;

/// Deletion proceeds stories first so nothing still references the epics
/// and iterations removed after them.
const DELETE_ORDER: [EntityKind; 4] = [
    EntityKind::Story,
    EntityKind::Epic,
    EntityKind::Iteration,
    EntityKind::File,
];

/// Execute the delete command: remove every entity in the manifest.
///
/// Without `--apply` only a summary of what would be deleted is printed.
///
/// # Errors
///
/// Returns an error if the manifest cannot be read or a deletion fails.
/// Entities already gone from the workspace are warned about and skipped.
pub fn execute(config: &Config, args: &DeleteArgs) -> Result<()> {
    let entities = manifest::load(&config.manifest_file)?;

    let mut stats = Tally::default();
    for entity in &entities {
        stats.add(entity.entity_type, 1);
    }

    if !args.apply {
        println!(
            "Dry run: would delete {stats} listed in {}.",
            config.manifest_file.display()
        );
        println!("Re-run with --apply to delete them.");
        return Ok(());
    }

    let mut api = ShortcutClient::new(config.token.clone());
    let mut deleted = Tally::default();
    for kind in DELETE_ORDER {
        for entity in entities.iter().filter(|e| e.entity_type == kind) {
            match api.delete_entity(kind, entity.id) {
                Ok(()) => deleted.add(kind, 1),
                Err(MigrateError::Api { status: 404, .. }) => {
                    tracing::warn!(kind = %kind, id = entity.id, "already deleted, skipping");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    println!("Deleted {deleted}.");
    Ok(())
}
