//! Cross-reference rewriting: `#id` / `##id` mentions become target URLs.
//!
//! Source text refers to stories as `#123456` and epics as `##1234`.
//! After migration those IDs are meaningless, so descriptions and comments
//! are rewritten to full target URLs. References that look like other
//! conventions (`[#123]` changelog tags, `PR #123`) are left alone, as are
//! IDs with no known target; an unknown ID is warned about, never guessed.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::api::ShortcutApi;
use crate::error::Result;
use crate::workspace::WorkspaceSnapshot;

/// Candidate references; context checks below decide what really matches.
static REFERENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#+(\d+)").expect("valid ref pattern"));

/// Whether the text right before a `#` marks it as a pull-request number.
fn preceded_by_pr(prefix: &str) -> bool {
    let trimmed = prefix.trim_end_matches([' ', '\t']);
    trimmed.len() < prefix.len() && trimmed.ends_with("PR")
}

/// Rewrite all story/epic references in `text`, or `None` when nothing
/// changed.
#[must_use]
pub fn rewrite_text(text: &str, snapshot: &WorkspaceSnapshot) -> Option<String> {
    let mut output = String::with_capacity(text.len());
    let mut last_end = 0;
    let mut changed = false;

    for captures in REFERENCE.captures_iter(text) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        let id = &captures[1];
        let hashes = whole.as_str().len() - id.len();

        let keep = |output: &mut String| output.push_str(whole.as_str());
        output.push_str(&text[last_end..whole.start()]);
        last_end = whole.end();

        // `[#123]`-style tags are not references
        if text[whole.end()..].starts_with(']') {
            keep(&mut output);
            continue;
        }

        let replacement = match hashes {
            1 => {
                if preceded_by_pr(&text[..whole.start()]) {
                    None
                } else if let Some(story_id) = snapshot.story_id(id) {
                    Some(snapshot.story_url(story_id))
                } else {
                    tracing::warn!(source_id = %id, "story reference has no target, left as-is");
                    None
                }
            }
            2 => {
                if let Some(epic_id) = snapshot.epic_id(id) {
                    Some(snapshot.epic_url(epic_id))
                } else {
                    tracing::warn!(source_id = %id, "epic reference has no target, left as-is");
                    None
                }
            }
            _ => None,
        };

        match replacement {
            Some(url) => {
                output.push_str(&url);
                changed = true;
            }
            None => keep(&mut output),
        }
    }

    if !changed {
        return None;
    }
    output.push_str(&text[last_end..]);
    Some(output)
}

/// Counts of entities actually rewritten.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteReport {
    pub story_descriptions: usize,
    pub epic_descriptions: usize,
    pub comments: usize,
}

/// Rewrite references in every imported story and epic.
///
/// Returns counts of what was written. Text that rewrites to itself is
/// never re-sent, so the operation is idempotent: a second run reports
/// all zeros.
///
/// # Errors
///
/// Propagates API failures.
pub fn apply<A: ShortcutApi>(api: &mut A, snapshot: &WorkspaceSnapshot) -> Result<RewriteReport> {
    let mut report = RewriteReport::default();

    for epic_id in snapshot.epic_ids() {
        let epic = api.get_epic(epic_id)?;
        if let Some(new_description) = epic
            .description
            .as_deref()
            .and_then(|d| rewrite_text(d, snapshot))
        {
            api.update_epic_description(epic_id, &new_description)?;
            report.epic_descriptions += 1;
        }
        for comment in &epic.comments {
            if let Some(new_text) = comment
                .text
                .as_deref()
                .and_then(|t| rewrite_text(t, snapshot))
            {
                api.update_epic_comment(epic_id, comment.id, &new_text)?;
                report.comments += 1;
            }
        }
    }

    for story_id in snapshot.story_ids() {
        let story = api.get_story(story_id)?;
        if let Some(new_description) = story
            .description
            .as_deref()
            .and_then(|d| rewrite_text(d, snapshot))
        {
            api.update_story_description(story_id, &new_description)?;
            report.story_descriptions += 1;
        }
        for comment in &story.comments {
            if let Some(new_text) = comment
                .text
                .as_deref()
                .and_then(|t| rewrite_text(t, snapshot))
            {
                api.update_comment(story_id, comment.id, &new_text)?;
                report.comments += 1;
            }
        }
    }

    Ok(report)
}
