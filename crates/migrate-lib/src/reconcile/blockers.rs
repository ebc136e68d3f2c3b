//! Blocker injection: recreate "blocks" story links from the export.
//!
//! Blocker cells reference other stories as `#<id>`; anything else in a
//! blocker cell is free text and ignored. Desired links are diffed against
//! each story's current links so re-running writes nothing new.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::api::ShortcutApi;
use crate::error::Result;
use crate::model::{LinkVerb, ParsedRow, StoryLink};
use crate::workspace::WorkspaceSnapshot;

static STORY_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#\d+$").expect("valid blocker pattern"));

/// One blocker relation in source terms: `blocker` blocks `blockee`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBlocker {
    pub blockee_external_id: String,
    pub blocker_external_id: String,
}

/// Extract blocker relations from export rows. Epic and release rows
/// cannot be blockees (neither becomes a plain story); blocker cells that
/// are not a bare story reference are skipped.
#[must_use]
pub fn source_blockers(rows: &[ParsedRow]) -> Vec<SourceBlocker> {
    let mut blockers = Vec::new();
    for row in rows {
        let story_type = row.story_type.as_deref().unwrap_or("feature");
        if matches!(story_type, "epic" | "release") {
            continue;
        }
        let Some(blockee) = &row.external_id else {
            continue;
        };
        for cell in &row.blockers {
            if STORY_REF.is_match(cell) {
                blockers.push(SourceBlocker {
                    blockee_external_id: blockee.clone(),
                    blocker_external_id: cell[1..].to_string(),
                });
            }
        }
    }
    blockers
}

/// Write missing "blocks" links into the workspace.
///
/// Returns the number of links created. Links whose blocker or blockee has
/// no target ID are warned and skipped; links that already exist are
/// skipped silently, making the operation idempotent.
///
/// # Errors
///
/// Propagates API failures.
pub fn inject<A: ShortcutApi>(
    api: &mut A,
    snapshot: &WorkspaceSnapshot,
    rows: &[ParsedRow],
) -> Result<usize> {
    // group desired links by blockee so each story is read exactly once;
    // a set per blockee absorbs duplicate blocker cells
    let mut desired_by_blockee: HashMap<i64, HashSet<StoryLink>> = HashMap::new();
    for blocker in source_blockers(rows) {
        let Some(blockee_id) = snapshot.story_id(&blocker.blockee_external_id) else {
            tracing::warn!(
                blockee = %blocker.blockee_external_id,
                "blockee has no target story, blocker skipped"
            );
            continue;
        };
        let Some(blocker_id) = snapshot.story_id(&blocker.blocker_external_id) else {
            tracing::warn!(
                blocker = %blocker.blocker_external_id,
                "blocker has no target story, link skipped"
            );
            continue;
        };
        desired_by_blockee.entry(blockee_id).or_default().insert(StoryLink {
            subject_id: blocker_id,
            verb: LinkVerb::Blocks,
            object_id: blockee_id,
        });
    }

    let mut written = 0;
    let mut blockees: Vec<i64> = desired_by_blockee.keys().copied().collect();
    blockees.sort_unstable();

    for blockee_id in blockees {
        let story = api.get_story(blockee_id)?;
        let current: HashSet<StoryLink> = story
            .story_links
            .iter()
            .filter_map(crate::api::StoryLinkRecord::as_link)
            .collect();

        let mut desired: Vec<&StoryLink> = desired_by_blockee[&blockee_id].iter().collect();
        desired.sort_unstable_by_key(|link| link.subject_id);
        for link in desired {
            if current.contains(link) {
                tracing::debug!(
                    subject = link.subject_id,
                    object = link.object_id,
                    "link already present"
                );
                continue;
            }
            api.create_story_link(link)?;
            written += 1;
        }
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, story_type: &str, blockers: &[&str]) -> ParsedRow {
        ParsedRow {
            external_id: Some(id.to_string()),
            story_type: Some(story_type.to_string()),
            blockers: blockers.iter().map(ToString::to_string).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn only_bare_story_references_count() {
        let rows = vec![row(
            "100",
            "feature",
            &["#200", "waiting on legal", "#300x", "##400"],
        )];
        let blockers = source_blockers(&rows);
        assert_eq!(blockers.len(), 1);
        assert_eq!(blockers[0].blocker_external_id, "200");
        assert_eq!(blockers[0].blockee_external_id, "100");
    }

    #[test]
    fn epics_and_releases_cannot_be_blockees() {
        let rows = vec![
            row("100", "epic", &["#200"]),
            row("101", "release", &["#200"]),
            row("102", "bug", &["#200"]),
        ];
        let blockers = source_blockers(&rows);
        assert_eq!(blockers.len(), 1);
        assert_eq!(blockers[0].blockee_external_id, "102");
    }
}
