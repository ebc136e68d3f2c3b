//! Reconciliation utilities must be safe to re-run: the second pass over
//! an already-reconciled workspace writes nothing.

mod common;

use common::MockWorkspace;
use migrate_lib::model::ParsedRow;
use migrate_lib::reconcile::epics::NameAffinity;
use migrate_lib::reconcile::{blockers, epics, rewrite};
use migrate_lib::workspace::WorkspaceSnapshot;
use migrate_lib::api::ShortcutApi;
use migrate_lib::model::{EpicPayload, StoryPayload};

fn seed_story(workspace: &mut MockWorkspace, external_id: &str, name: &str) -> i64 {
    let created = workspace
        .create_stories(&[StoryPayload {
            name: name.to_string(),
            external_id: Some(external_id.to_string()),
            ..Default::default()
        }])
        .unwrap();
    created[0].id
}

fn seed_epic(workspace: &mut MockWorkspace, external_id: &str, name: &str) -> i64 {
    workspace
        .create_epic(&EpicPayload {
            name: name.to_string(),
            external_id: Some(external_id.to_string()),
            ..Default::default()
        })
        .unwrap()
        .id
}

fn story_row(id: &str, name: &str, labels: &[&str], blockers: &[&str]) -> ParsedRow {
    ParsedRow {
        external_id: Some(id.to_string()),
        name: Some(name.to_string()),
        story_type: Some("feature".to_string()),
        labels: labels.iter().map(ToString::to_string).collect(),
        blockers: blockers.iter().map(ToString::to_string).collect(),
        ..Default::default()
    }
}

fn epic_row(id: &str, name: &str, labels: &[&str]) -> ParsedRow {
    ParsedRow {
        external_id: Some(id.to_string()),
        name: Some(name.to_string()),
        story_type: Some("epic".to_string()),
        labels: labels.iter().map(ToString::to_string).collect(),
        ..Default::default()
    }
}

#[test]
fn epic_reassignment_only_writes_once() {
    let mut workspace = MockWorkspace::new();
    seed_story(&mut workspace, "100", "Billing: new invoices");
    seed_epic(&mut workspace, "200", "Billing");
    seed_epic(&mut workspace, "201", "Mobile");

    let rows = vec![
        epic_row("200", "Billing", &["billing"]),
        epic_row("201", "Mobile", &["mobile"]),
        // story labels match both epics; import left it unassigned
        story_row("100", "Billing: new invoices", &["billing", "mobile"], &[]),
    ];
    let scorer = NameAffinity::default();

    let snapshot = WorkspaceSnapshot::fetch(&mut workspace).unwrap();
    let first = epics::reassign(&mut workspace, &snapshot, &rows, &scorer).unwrap();
    assert_eq!(first, 1);

    let billing = workspace.epic_id_by_name("Billing");
    let story = workspace.story_id_by_name("Billing: new invoices");
    assert_eq!(workspace.story_epic_updates, vec![(story, billing)]);

    // second pass sees the assignment in place and writes nothing
    let snapshot = WorkspaceSnapshot::fetch(&mut workspace).unwrap();
    let second = epics::reassign(&mut workspace, &snapshot, &rows, &scorer).unwrap();
    assert_eq!(second, 0);
    assert_eq!(workspace.story_epic_updates.len(), 1);
}

#[test]
fn blocker_injection_only_writes_missing_links() {
    let mut workspace = MockWorkspace::new();
    seed_story(&mut workspace, "100", "Blockee");
    seed_story(&mut workspace, "101", "Blocker one");
    seed_story(&mut workspace, "102", "Blocker two");

    let rows = vec![
        story_row("100", "Blockee", &[], &["#101", "#102", "#999"]),
        story_row("101", "Blocker one", &[], &[]),
        story_row("102", "Blocker two", &[], &[]),
    ];

    let snapshot = WorkspaceSnapshot::fetch(&mut workspace).unwrap();
    let first = blockers::inject(&mut workspace, &snapshot, &rows).unwrap();
    // #999 has no target and is skipped
    assert_eq!(first, 2);

    let second = blockers::inject(&mut workspace, &snapshot, &rows).unwrap();
    assert_eq!(second, 0);
    assert_eq!(workspace.links_created.len(), 2);
}

#[test]
fn reference_rewriting_converges() {
    let mut workspace = MockWorkspace::new();
    let target = seed_story(&mut workspace, "555000111", "Target");
    let mut referrer = StoryPayload {
        name: "Referrer".to_string(),
        external_id: Some("555000222".to_string()),
        ..Default::default()
    };
    referrer.description = Some("Depends on #555000111".to_string());
    workspace.create_stories(&[referrer]).unwrap();

    let snapshot = WorkspaceSnapshot::fetch(&mut workspace).unwrap();
    let first = rewrite::apply(&mut workspace, &snapshot).unwrap();
    assert_eq!(first.story_descriptions, 1);

    let referrer_id = workspace.story_id_by_name("Referrer");
    let description = workspace.stories[&referrer_id].description.clone().unwrap();
    assert_eq!(
        description,
        format!("Depends on https://app.shortcut.com/testspace/story/{target}")
    );

    // rewritten text has no remaining references
    let second = rewrite::apply(&mut workspace, &snapshot).unwrap();
    assert_eq!(second, rewrite::RewriteReport::default());
}
