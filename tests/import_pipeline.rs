//! End-to-end import: CSV export text through parse, build, collect, and
//! commit against an in-memory workspace.

mod common;

use std::io::Write;

use common::MockWorkspace;
use migrate_lib::builder::build_entity;
use migrate_lib::collector::{EntityCollector, Tally, BATCH_SIZE};
use migrate_lib::mapping::{
    EpicStateIds, PriorityMapping, RunContext, StateMapping, UserMapping,
};
use migrate_lib::model::EntityKind;
use migrate_lib::rowparse::ExportReader;

fn test_ctx() -> RunContext {
    RunContext {
        group_id: Some("group-uuid".to_string()),
        states: StateMapping::from_entries(&[
            ("unstarted", 500_001),
            ("started", 500_002),
            ("accepted", 500_003),
        ]),
        users: UserMapping::from_entries(&[("Amy Williams", "amy_id")]),
        priorities: PriorityMapping::from_entries(&[("p2 - medium", "priority_value")]),
        priority_custom_field_id: "priority_field".to_string(),
        epic_states: EpicStateIds {
            todo: 10,
            in_progress: 11,
            done: 12,
        },
        run_label: "pivotal->shortcut 2024-05-01 12:00:00".to_string(),
    }
}

fn import(csv_text: &str, workspace: &mut MockWorkspace) -> (Tally, Vec<migrate_lib::CreatedEntity>) {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(csv_text.as_bytes()).unwrap();
    file.flush().unwrap();

    let ctx = test_ctx();
    let mut collector = EntityCollector::new(workspace, &ctx, None);
    let mut stats = Tally::default();
    for row in ExportReader::open(file.path()).unwrap() {
        stats.merge(&collector.collect(build_entity(&ctx, row.unwrap())));
    }
    let manifest = collector.commit().unwrap();
    (stats, manifest)
}

const EXPORT: &str = "\
Id,Title,Type,Estimate,Current State,Labels,Requested By,Iteration,Iteration Start,Iteration End
1001,Mobile work,epic,,,mobile,,,,
1002,Login screen,feature,2,started,mobile,Amy Williams,4,\"Jan 1, 2024\",\"Jan 14, 2024\"
1003,Logout button,feature,1,accepted,mobile,,4,\"Jan 1, 2024\",\"Jan 14, 2024\"
1004,Cut release,release,,unstarted,,,,,
";

#[test]
fn export_becomes_linked_workspace_entities() {
    let mut workspace = MockWorkspace::new();
    let (stats, manifest) = import(EXPORT, &mut workspace);

    assert_eq!(stats.count(EntityKind::Epic), 1);
    assert_eq!(stats.count(EntityKind::Story), 3);

    // one shared iteration for the two stories carrying key 4
    assert_eq!(workspace.iterations.len(), 1);
    assert_eq!(workspace.iterations[0].1.name, "Iteration 4");
    assert_eq!(workspace.iterations[0].1.start_date, "2024-01-01");

    // both mobile stories land in the epic, the release does not
    let epic_id = workspace.epic_id_by_name("Mobile work");
    let login = &workspace.stories[&workspace.story_id_by_name("Login screen")];
    let logout = &workspace.stories[&workspace.story_id_by_name("Logout button")];
    let release = &workspace.stories[&workspace.story_id_by_name("Cut release")];
    assert_eq!(login.epic_id, Some(epic_id));
    assert_eq!(logout.epic_id, Some(epic_id));
    assert_eq!(release.epic_id, None);

    // mixed story states put the epic in progress
    assert_eq!(workspace.epic_state_updates, vec![(epic_id, 11)]);

    // manifest: epic, iteration, then the three stories, all IDs unique
    let kinds: Vec<EntityKind> = manifest.iter().map(|e| e.entity_type).collect();
    assert_eq!(
        kinds,
        vec![
            EntityKind::Epic,
            EntityKind::Iteration,
            EntityKind::Story,
            EntityKind::Story,
            EntityKind::Story
        ]
    );
    let mut ids: Vec<i64> = manifest.iter().map(|e| e.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), manifest.len());
}

#[test]
fn stories_batch_at_the_fixed_size() {
    let mut csv_text = String::from("Id,Title,Type\n");
    for ix in 0..=BATCH_SIZE {
        csv_text.push_str(&format!("{},Story {},feature\n", 2000 + ix, ix));
    }

    let mut workspace = MockWorkspace::new();
    import(&csv_text, &mut workspace);
    assert_eq!(workspace.story_batches, vec![BATCH_SIZE, 1]);
}

#[test]
fn provenance_labels_are_created() {
    let mut workspace = MockWorkspace::new();
    import(EXPORT, &mut workspace);

    assert!(workspace.labels.contains(&"pivotal->shortcut".to_string()));
    assert!(workspace
        .labels
        .contains(&"pivotal->shortcut 2024-05-01 12:00:00".to_string()));
    assert!(workspace.labels.contains(&"pivotal-release".to_string()));
    // shared label created exactly once
    let mobile = workspace.labels.iter().filter(|l| *l == "mobile").count();
    assert_eq!(mobile, 1);
}

#[test]
fn release_rows_become_chores() {
    let mut workspace = MockWorkspace::new();
    import(EXPORT, &mut workspace);

    let release_id = workspace.story_id_by_name("Cut release");
    // the release still exists as a story with the marker label applied
    assert!(workspace.stories.contains_key(&release_id));
    assert!(workspace.labels.contains(&"pivotal-release".to_string()));
}
