//! Core data types for the migration pipeline.
//!
//! Payload structs serialize directly into Shortcut API request bodies.
//! Optional fields use `skip_serializing_if` so an unmapped reference is
//! omitted from the payload rather than sent as `null`; the struct
//! definitions are the per-kind allow-list of fields the API may see.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MigrateError;

/// Label attached to every entity created by this tool.
pub const IMPORT_LABEL: &str = "pivotal->shortcut";

/// Label attached to chore stories created from Pivotal release rows.
pub const RELEASE_TYPE_LABEL: &str = "pivotal-release";

/// Label attached to stories that carried Pivotal reviews.
pub const HAD_REVIEW_LABEL: &str = "pivotal-had-review";

/// One migratable unit (closed tag set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Story,
    Epic,
    Iteration,
    Label,
    File,
}

impl EntityKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Story => "story",
            Self::Epic => "epic",
            Self::Iteration => "iteration",
            Self::Label => "label",
            Self::File => "file",
        }
    }

    /// Plural form used in statistics output.
    #[must_use]
    pub const fn plural(self) -> &'static str {
        match self {
            Self::Story => "stories",
            Self::Epic => "epics",
            Self::Iteration => "iterations",
            Self::Label => "labels",
            Self::File => "files",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "story" => Ok(Self::Story),
            "epic" => Ok(Self::Epic),
            "iteration" => Ok(Self::Iteration),
            "label" => Ok(Self::Label),
            "file" => Ok(Self::File),
            other => Err(MigrateError::config(format!(
                "Invalid entity kind: {other}"
            ))),
        }
    }
}

/// A comment as parsed from the export, before user resolution.
///
/// Pivotal renders comments as `text (Author - Date)`; the author and
/// date are peeled off when the trailer is present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedComment {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Normalized intermediate record produced from one export row.
///
/// Single-valued columns overwrite; repeating columns append in
/// left-to-right column order. Parallel repeating lists (task/task status,
/// reviewer/review type/review status, blocker/blocker status) pair by
/// position, not by value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedRow {
    pub external_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub story_type: Option<String>,
    pub estimate: Option<i64>,
    pub priority: Option<String>,
    pub state: Option<String>,
    pub labels: Vec<String>,
    pub external_links: Vec<String>,
    pub created_at: Option<String>,
    pub accepted_at: Option<String>,
    pub deadline: Option<String>,
    pub requester: Option<String>,
    pub owners: Vec<String>,
    pub reviewers: Vec<String>,
    pub review_types: Vec<String>,
    pub review_states: Vec<String>,
    pub blockers: Vec<String>,
    pub blocker_states: Vec<String>,
    pub task_titles: Vec<String>,
    pub task_states: Vec<String>,
    pub comments: Vec<ParsedComment>,
    pub iteration_id: Option<String>,
    pub iteration_start: Option<String>,
    pub iteration_end: Option<String>,
}

impl ParsedRow {
    /// The iteration this row belongs to, if the export carried a complete
    /// (id, start, end) triple.
    #[must_use]
    pub fn iteration_key(&self) -> Option<IterationKey> {
        match (
            &self.iteration_id,
            &self.iteration_start,
            &self.iteration_end,
        ) {
            (Some(id), Some(start), Some(end)) => Some(IterationKey {
                id: id.clone(),
                start: start.clone(),
                end: end.clone(),
            }),
            _ => None,
        }
    }
}

/// Identity of one source iteration, shared across many stories.
///
/// A proper value type rather than an `id|start|end` string: derived
/// equality and hashing make it usable as a dedup key directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IterationKey {
    pub id: String,
    pub start: String,
    pub end: String,
}

/// `{"name": ...}` label reference in creation payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRef {
    pub name: String,
}

impl LabelRef {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// True for the labels injected purely to mark this tool's output.
    #[must_use]
    pub fn is_provenance(&self, run_label: &str) -> bool {
        self.name == IMPORT_LABEL
            || self.name == RELEASE_TYPE_LABEL
            || self.name == HAD_REVIEW_LABEL
            || self.name == run_label
    }
}

/// Task reconstructed from paired task-title / task-status columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskPayload {
    pub description: String,
    pub complete: bool,
}

/// Comment in a story creation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentPayload {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// One custom-field value reference (priority mapping target).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomFieldValue {
    pub field_id: String,
    pub value_id: String,
}

/// Story creation payload (`POST /stories`, `POST /stories/bulk`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoryPayload {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_state_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub external_links: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at_override: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_by_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub owner_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub follower_ids: Vec<String>,
    /// A null group is meaningful to the API (no team), so this field is
    /// always serialized.
    pub group_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<CommentPayload>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<TaskPayload>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<LabelRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_fields: Vec<CustomFieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epic_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration_id: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub file_ids: Vec<i64>,
}

/// Epic creation payload (`POST /epics`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EpicPayload {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<LabelRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub group_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epic_state_id: Option<i64>,
}

/// Iteration creation payload (`POST /iterations`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IterationPayload {
    pub name: String,
    pub start_date: String,
    pub end_date: String,
}

/// Label creation payload (`POST /labels`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelPayload {
    pub name: String,
}

/// Creation payload plus kind, as produced by the entity builder.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityPayload {
    Story(StoryPayload),
    Epic(EpicPayload),
}

impl EntityPayload {
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Story(_) => EntityKind::Story,
            Self::Epic(_) => EntityKind::Epic,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Story(s) => &s.name,
            Self::Epic(e) => &e.name,
        }
    }
}

/// The unit moved through the pipeline.
///
/// `parsed_row` survives as an audit trail of the source data the payload
/// was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub payload: EntityPayload,
    /// Iteration membership, resolved to an ID during commit.
    pub iteration: Option<IterationKey>,
    pub parsed_row: ParsedRow,
}

impl Entity {
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.payload.kind()
    }
}

/// Record of one entity actually created in the target workspace.
///
/// These rows form the output manifest, the permanent migration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedEntity {
    pub id: i64,
    pub entity_type: EntityKind,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epic_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration_id: Option<i64>,
    pub app_url: String,
}

/// A workspace member, flattened from the API's member/profile nesting.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Member {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub mention_name: Option<String>,
}

/// Coarse workflow classification shared by stories and epics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateCategory {
    Todo,
    InProgress,
    Done,
}

impl StateCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }

    /// Classify a Pivotal workflow state name.
    #[must_use]
    pub fn from_source_state(state: &str) -> Self {
        match state.to_lowercase().as_str() {
            "accepted" => Self::Done,
            "unscheduled" | "unstarted" | "planned" => Self::Todo,
            // started, finished, delivered, rejected
            _ => Self::InProgress,
        }
    }
}

impl fmt::Display for StateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Directed relation between two created stories.
///
/// Hashable so sets of links can be diffed for idempotent writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoryLink {
    pub subject_id: i64,
    pub verb: LinkVerb,
    pub object_id: i64,
}

/// Story-link verbs accepted by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkVerb {
    Blocks,
    Duplicates,
    RelatesTo,
}
