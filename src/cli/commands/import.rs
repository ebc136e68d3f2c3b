use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::Utc;

use migrate_lib::api::{ShortcutApi, ShortcutClient};
use migrate_lib::builder::build_entity;
use migrate_lib::collector::{EntityCollector, Tally};
use migrate_lib::manifest;
use migrate_lib::mapping::{PriorityMapping, RunContext, StateMapping, UserMapping};
use migrate_lib::rowparse::ExportReader;

use crate::cli::ImportArgs;
use crate::config::Config;

/// Execute the import command.
///
/// Without `--apply` this is a dry run: the export is fully parsed and
/// built, statistics are printed, and nothing touches the network.
///
/// # Errors
///
/// Returns an error on configuration, parse, or API failure.
pub fn execute(config: &Config, args: &ImportArgs) -> Result<()> {
    let states = StateMapping::load(&config.states_csv_file)?;
    let priorities = PriorityMapping::load(&config.priorities_csv_file)?;

    if args.apply {
        apply(config, states, priorities)
    } else {
        dry_run(config, states, priorities)
    }
}

fn build_ctx(
    config: &Config,
    states: StateMapping,
    priorities: PriorityMapping,
    users: UserMapping,
) -> RunContext {
    RunContext {
        group_id: config.group_id.clone(),
        states,
        users,
        priorities,
        priority_custom_field_id: config.priority_custom_field_id.clone(),
        epic_states: config.epic_states,
        run_label: RunContext::new_run_label(Utc::now()),
    }
}

fn dry_run(config: &Config, states: StateMapping, priorities: PriorityMapping) -> Result<()> {
    // no API access in a dry run; emails stand in for member IDs
    let users = UserMapping::load_unresolved(&config.users_csv_file)?;
    let ctx = build_ctx(config, states, priorities, users);

    let mut stats = Tally::default();
    let mut label_names = HashSet::new();
    let mut iteration_keys = HashSet::new();
    let mut rows = 0_usize;

    for row in ExportReader::open(&config.pt_csv_file)? {
        let entity = build_entity(&ctx, row?);
        stats.add(entity.kind(), 1);
        if let Some(key) = &entity.iteration {
            iteration_keys.insert(key.clone());
        }
        match &entity.payload {
            migrate_lib::model::EntityPayload::Story(p) => {
                label_names.extend(p.labels.iter().map(|l| l.name.clone()));
            }
            migrate_lib::model::EntityPayload::Epic(p) => {
                label_names.extend(p.labels.iter().map(|l| l.name.clone()));
            }
        }
        rows += 1;
    }

    println!("Dry run over {rows} rows. Would create:");
    println!("  {stats}");
    println!(
        "  plus {} labels and {} iterations",
        label_names.len(),
        iteration_keys.len()
    );
    println!("Re-run with --apply to perform the import.");
    Ok(())
}

fn apply(config: &Config, states: StateMapping, priorities: PriorityMapping) -> Result<()> {
    let mut api = ShortcutClient::new(config.token.clone());
    let members = api
        .list_members()
        .context("fetching workspace members")?;
    let users = UserMapping::load(&config.users_csv_file, &members)?;
    let ctx = build_ctx(config, states, priorities, users);
    tracing::debug!(workflow_id = config.workflow_id, run_label = %ctx.run_label, "starting import");

    let mut collector = EntityCollector::new(&mut api, &ctx, config.attachments_dir.clone());
    let mut stats = Tally::default();
    for row in ExportReader::open(&config.pt_csv_file)? {
        stats.merge(&collector.collect(build_entity(&ctx, row?)));
    }
    println!("Collected {stats}.");

    let created = collector.commit().context("committing entities")?;
    manifest::save(&config.manifest_file, &created)?;

    let mut created_stats = Tally::default();
    for entity in &created {
        created_stats.add(entity.entity_type, 1);
    }
    println!("Created {created_stats}.");
    println!("Manifest written to {}", config.manifest_file.display());
    Ok(())
}
