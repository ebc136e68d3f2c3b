//! Epic reassignment for stories whose labels match several epics.
//!
//! The import deliberately leaves such stories without an epic: ambiguous
//! matches are never guessed at creation time. This utility picks the
//! best-scoring epic per story using a pluggable scorer, then writes only
//! the assignments that differ from the workspace's current state.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::api::ShortcutApi;
use crate::error::Result;
use crate::model::ParsedRow;
use crate::workspace::WorkspaceSnapshot;

static WORDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("valid word pattern"));

/// Scores how likely an epic is to be the primary epic for a story.
/// Organizations differ; the default is [`NameAffinity`].
pub trait AffinityScorer {
    /// Higher is better. Candidates are compared pairwise; the first
    /// maximum wins.
    fn score(&self, epic_name: &str, story_name: &str) -> i64;
}

/// Name-based scoring: an epic whose name prefixes the story name wins
/// proportionally to the length of the prefix; otherwise score by shared
/// words. Fixed winner/loser epic names can be configured per organization.
#[derive(Debug, Clone, Default)]
pub struct NameAffinity {
    /// Epic names (lower-cased) that always outrank every other candidate.
    pub always_win: Vec<String>,
    /// Epic names (lower-cased) that never win against any other candidate.
    pub never_win: Vec<String>,
}

impl AffinityScorer for NameAffinity {
    fn score(&self, epic_name: &str, story_name: &str) -> i64 {
        let epic = epic_name.to_lowercase();
        let story = story_name.to_lowercase();

        if self.always_win.contains(&epic) {
            return i64::MAX;
        }
        if self.never_win.contains(&epic) {
            return 0;
        }
        if story.starts_with(&epic) {
            return 100 * i64::try_from(epic.len()).unwrap_or(i64::MAX / 100);
        }

        let epic_words: std::collections::HashSet<&str> =
            WORDS.find_iter(&epic).map(|m| m.as_str()).collect();
        let story_words: std::collections::HashSet<&str> =
            WORDS.find_iter(&story).map(|m| m.as_str()).collect();
        1 + i64::try_from(epic_words.intersection(&story_words).count()).unwrap_or(0)
    }
}

/// Epic candidate carried through scoring.
#[derive(Debug, Clone)]
struct EpicCandidate {
    external_id: String,
    name: String,
}

/// Build label -> epic map from the export's epic rows, keeping only
/// labels that appear in exactly one epic.
fn epic_by_label(rows: &[ParsedRow]) -> HashMap<String, EpicCandidate> {
    let mut by_label: HashMap<String, Vec<EpicCandidate>> = HashMap::new();
    for row in rows {
        if row.story_type.as_deref() != Some("epic") {
            continue;
        }
        let (Some(external_id), Some(name)) = (&row.external_id, &row.name) else {
            continue;
        };
        for label in &row.labels {
            by_label.entry(label.clone()).or_default().push(EpicCandidate {
                external_id: external_id.clone(),
                name: name.clone(),
            });
        }
    }

    by_label
        .into_iter()
        .filter_map(|(label, candidates)| {
            if candidates.len() == 1 {
                candidates.into_iter().next().map(|c| (label, c))
            } else {
                tracing::warn!(%label, epics = candidates.len(), "label appears in multiple epics, skipped");
                None
            }
        })
        .collect()
}

/// First candidate with the maximum score.
fn choose_favorite<'a, S: AffinityScorer>(
    scorer: &S,
    story_name: &str,
    candidates: &'a [&'a EpicCandidate],
) -> Option<&'a EpicCandidate> {
    let mut best: Option<(&EpicCandidate, i64)> = None;
    for candidate in candidates {
        let score = scorer.score(&candidate.name, story_name);
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((candidate, score)),
        }
    }
    best.map(|(candidate, _)| candidate)
}

/// Assign each multi-candidate story to its best-scoring epic.
///
/// Returns the number of stories actually updated. No-op assignments are
/// skipped, so a second run over an already-reconciled workspace writes
/// nothing.
///
/// # Errors
///
/// Propagates API failures; individual lookup misses are warned and
/// skipped.
pub fn reassign<A: ShortcutApi, S: AffinityScorer>(
    api: &mut A,
    snapshot: &WorkspaceSnapshot,
    rows: &[ParsedRow],
    scorer: &S,
) -> Result<usize> {
    let epics = epic_by_label(rows);
    let mut updated = 0;

    for row in rows {
        if row.story_type.as_deref() == Some("epic") {
            continue;
        }
        let (Some(story_external), Some(story_name)) = (&row.external_id, &row.name) else {
            continue;
        };

        let candidates: Vec<&EpicCandidate> = row
            .labels
            .iter()
            .filter_map(|label| epics.get(label))
            .collect();
        // stories with zero or one candidate were handled at import time
        if candidates.len() < 2 {
            continue;
        }

        let Some(favorite) = choose_favorite(scorer, story_name, &candidates) else {
            continue;
        };

        let (Some(story_id), Some(epic_id)) = (
            snapshot.story_id(story_external),
            snapshot.epic_id(&favorite.external_id),
        ) else {
            tracing::warn!(
                story = %story_name,
                epic = %favorite.name,
                "target IDs not found for story/epic pair, skipped"
            );
            continue;
        };

        let current = api.get_story(story_id)?;
        if current.epic_id == Some(epic_id) {
            tracing::debug!(story = %story_name, epic = %favorite.name, "already assigned");
            continue;
        }

        tracing::info!(
            story = %story_name,
            epic = %favorite.name,
            url = %snapshot.epic_url(epic_id),
            "assigning story to favorite epic"
        );
        api.update_story_epic(story_id, epic_id)?;
        updated += 1;
    }

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_match_beats_word_overlap() {
        let scorer = NameAffinity::default();
        let prefix = scorer.score("Billing", "Billing: invoice rework");
        let overlap = scorer.score("Invoice rework project", "Billing: invoice rework");
        assert!(prefix > overlap);
        assert_eq!(prefix, 700);
    }

    #[test]
    fn word_overlap_scores_above_floor() {
        let scorer = NameAffinity::default();
        assert_eq!(scorer.score("totally unrelated", "A story"), 1);
        assert_eq!(scorer.score("mobile login", "Fix login flow"), 2);
    }

    #[test]
    fn configured_names_override_scores() {
        let scorer = NameAffinity {
            always_win: vec!["portal".to_string()],
            never_win: vec!["someday".to_string()],
        };
        assert_eq!(scorer.score("Portal", "anything"), i64::MAX);
        assert_eq!(scorer.score("Someday", "someday cleanup"), 0);
    }

    #[test]
    fn first_maximum_wins_ties() {
        let scorer = NameAffinity::default();
        let a = EpicCandidate {
            external_id: "1".to_string(),
            name: "alpha".to_string(),
        };
        let b = EpicCandidate {
            external_id: "2".to_string(),
            name: "omega".to_string(),
        };
        let candidates = vec![&a, &b];
        // both score 1 against an unrelated story; first listed wins
        let favorite = choose_favorite(&scorer, "unrelated story", &candidates).unwrap();
        assert_eq!(favorite.external_id, "1");
    }

    #[test]
    fn labels_in_multiple_epics_are_dropped() {
        let epic = |id: &str, name: &str, labels: &[&str]| ParsedRow {
            external_id: Some(id.to_string()),
            name: Some(name.to_string()),
            story_type: Some("epic".to_string()),
            labels: labels.iter().map(ToString::to_string).collect(),
            ..Default::default()
        };
        let rows = vec![
            epic("1", "One", &["shared", "only-one"]),
            epic("2", "Two", &["shared"]),
        ];
        let map = epic_by_label(&rows);
        assert!(!map.contains_key("shared"));
        assert_eq!(map.get("only-one").unwrap().external_id, "1");
    }
}
