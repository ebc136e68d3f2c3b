//! Entity construction: [`ParsedRow`] -> [`Entity`].
//!
//! All mapping-table resolution happens here, so the collector only ever
//! sees payloads that are ready to send. Resolution failures are not
//! errors: an unmapped user, state, or priority is logged and the field is
//! omitted from the payload, letting the API apply its own default.

use crate::mapping::RunContext;
use crate::model::{
    CommentPayload, CustomFieldValue, Entity, EntityPayload, EpicPayload, LabelRef, ParsedRow,
    StoryPayload, TaskPayload, HAD_REVIEW_LABEL, IMPORT_LABEL, RELEASE_TYPE_LABEL,
};

/// Leading text of the synthesized review comment.
const REVIEW_COMMENT_PREFIX: &str =
    "Reviews are imported from Pivotal, but Shortcut has no equivalent construct:";

/// Build the creation payload for one export row.
///
/// Rows typed `epic` become epics; everything else becomes a story, with
/// `release` rows rewritten to chores carrying a marker label.
#[must_use]
pub fn build_entity(ctx: &RunContext, row: ParsedRow) -> Entity {
    let story_type = row.story_type.as_deref().unwrap_or("feature");
    if story_type.eq_ignore_ascii_case("epic") {
        build_epic(ctx, row)
    } else {
        build_story(ctx, row)
    }
}

fn provenance_labels(ctx: &RunContext) -> Vec<LabelRef> {
    vec![LabelRef::new(IMPORT_LABEL), LabelRef::new(&ctx.run_label)]
}

fn build_epic(ctx: &RunContext, row: ParsedRow) -> Entity {
    let mut labels = provenance_labels(ctx);
    labels.extend(row.labels.iter().map(LabelRef::new));

    let payload = EpicPayload {
        name: row.name.clone().unwrap_or_default(),
        description: row.description.clone(),
        external_id: row.external_id.clone(),
        created_at: row.created_at.clone(),
        labels,
        group_ids: ctx.group_id.clone().into_iter().collect(),
        epic_state_id: None,
    };

    Entity {
        payload: EntityPayload::Epic(payload),
        iteration: None,
        parsed_row: row,
    }
}

fn build_story(ctx: &RunContext, row: ParsedRow) -> Entity {
    let source_type = row.story_type.as_deref().unwrap_or("feature").to_lowercase();
    let is_release = source_type == "release";
    // Shortcut has no release type; releases land as marked chores.
    let story_type = if is_release {
        "chore".to_string()
    } else {
        source_type
    };

    let mut labels = provenance_labels(ctx);
    if is_release {
        labels.push(LabelRef::new(RELEASE_TYPE_LABEL));
    }
    if !row.reviewers.is_empty() {
        labels.push(LabelRef::new(HAD_REVIEW_LABEL));
    }
    labels.extend(row.labels.iter().map(LabelRef::new));

    let workflow_state_id = row.state.as_deref().and_then(|state| {
        let id = ctx.states.lookup(state);
        if id.is_none() {
            tracing::warn!(%state, "workflow state not mapped, field omitted");
        }
        id
    });

    let requested_by_id = row
        .requester
        .as_deref()
        .and_then(|name| resolve_user(ctx, name));

    let owner_ids: Vec<String> = row
        .owners
        .iter()
        .filter_map(|name| resolve_user(ctx, name))
        .collect();

    let mut comments: Vec<CommentPayload> = row
        .comments
        .iter()
        .map(|c| CommentPayload {
            text: c.text.clone(),
            author_id: c.author.as_deref().and_then(|name| resolve_user(ctx, name)),
            created_at: c.created_at.clone(),
        })
        .collect();
    if let Some(review_comment) = review_comment(&row, requested_by_id.as_deref()) {
        comments.push(review_comment);
    }

    let follower_ids: Vec<String> = {
        let mut seen = std::collections::HashSet::new();
        row.reviewers
            .iter()
            .filter_map(|name| resolve_user(ctx, name))
            .filter(|id| seen.insert(id.clone()))
            .collect()
    };

    let tasks: Vec<TaskPayload> = row
        .task_titles
        .iter()
        .zip(row.task_states.iter())
        .map(|(title, state)| TaskPayload {
            description: title.clone(),
            complete: state == "completed",
        })
        .collect();

    let custom_fields = row
        .priority
        .as_deref()
        .and_then(|token| {
            let value = ctx.priorities.lookup(token);
            if value.is_none() {
                tracing::warn!(priority = %token, "priority not mapped, field omitted");
            }
            value
        })
        .map(|value_id| {
            vec![CustomFieldValue {
                field_id: ctx.priority_custom_field_id.clone(),
                value_id: value_id.to_string(),
            }]
        })
        .unwrap_or_default();

    let iteration = row.iteration_key();

    let payload = StoryPayload {
        name: row.name.clone().unwrap_or_default(),
        description: row.description.clone(),
        story_type: Some(story_type),
        estimate: row.estimate,
        workflow_state_id,
        external_id: row.external_id.clone(),
        external_links: row.external_links.clone(),
        created_at: row.created_at.clone(),
        completed_at_override: row.accepted_at.clone(),
        deadline: row.deadline.clone(),
        requested_by_id,
        owner_ids,
        follower_ids,
        group_id: ctx.group_id.clone(),
        comments,
        tasks,
        labels,
        custom_fields,
        epic_id: None,
        iteration_id: None,
        file_ids: Vec::new(),
    };

    Entity {
        payload: EntityPayload::Story(payload),
        iteration,
        parsed_row: row,
    }
}

fn resolve_user(ctx: &RunContext, name: &str) -> Option<String> {
    let id = ctx.users.lookup(name);
    if id.is_none() {
        tracing::warn!(user = %name, "user not mapped, reference omitted");
    }
    id.map(ToString::to_string)
}

/// Synthesize a comment preserving Pivotal review history as a Markdown
/// table. The comment is attributed to the requester so it has a plausible
/// author.
fn review_comment(row: &ParsedRow, requester_id: Option<&str>) -> Option<CommentPayload> {
    if row.reviewers.is_empty() {
        return None;
    }

    let mut text = String::from(REVIEW_COMMENT_PREFIX);
    text.push_str("\n\n| Reviewer | Review Type | Review Status |\n| --- | --- | --- |\n");
    for (ix, reviewer) in row.reviewers.iter().enumerate() {
        let review_type = row.review_types.get(ix).map_or("", String::as_str);
        let review_state = row.review_states.get(ix).map_or("", String::as_str);
        text.push_str(&format!(
            "| {} | {} | {} |\n",
            escape_table_cell(reviewer),
            escape_table_cell(review_type),
            escape_table_cell(review_state),
        ));
    }

    Some(CommentPayload {
        text,
        author_id: requester_id.map(ToString::to_string),
        created_at: None,
    })
}

/// Escape pipes so cell content cannot break the table layout.
fn escape_table_cell(value: &str) -> String {
    value.replace('|', r"\|")
}
