//! Mapping tables: precomputed source-key -> target-ID correspondences.
//!
//! The tables are produced by a separate interactive setup phase and
//! consumed here read-only. An absent entry means "no mapping exists";
//! callers omit the corresponding payload field rather than send null.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use serde::Deserialize;

use crate::error::{MigrateError, Result};
use crate::model::{Member, StateCategory};

/// Workflow-state table: source state name -> target workflow-state ID.
///
/// Each mapped ID also carries the coarse [`StateCategory`] of its source
/// state, which drives epic aggregate-state computation.
#[derive(Debug, Clone, Default)]
pub struct StateMapping {
    by_source: HashMap<String, i64>,
    category_by_id: HashMap<i64, StateCategory>,
}

#[derive(Debug, Deserialize)]
struct StateRow {
    pt_state: String,
    shortcut_state_id: String,
}

impl StateMapping {
    /// Load the state mapping CSV (`pt_state, shortcut_state_id, ...`).
    ///
    /// Rows with a blank target ID are unmapped and skipped.
    ///
    /// # Errors
    ///
    /// Returns `MalformedMapping` if the file cannot be parsed or a
    /// non-blank target ID is not numeric.
    pub fn load(path: &Path) -> Result<Self> {
        let malformed = |reason: String| MigrateError::MalformedMapping {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| malformed(e.to_string()))?;
        let mut reader = csv::Reader::from_reader(file);
        let mut mapping = Self::default();

        for record in reader.deserialize() {
            let row: StateRow = record.map_err(|e| malformed(e.to_string()))?;
            let id_field = row.shortcut_state_id.trim();
            if id_field.is_empty() {
                continue;
            }
            let id: i64 = id_field.parse().map_err(|_| {
                malformed(format!(
                    "state '{}' has non-numeric target ID '{id_field}'",
                    row.pt_state
                ))
            })?;
            let source = row.pt_state.trim().to_lowercase();
            mapping
                .category_by_id
                .insert(id, StateCategory::from_source_state(&source));
            mapping.by_source.insert(source, id);
        }

        Ok(mapping)
    }

    /// Build a mapping from literal entries (tests, fixtures).
    #[must_use]
    pub fn from_entries(entries: &[(&str, i64)]) -> Self {
        let mut mapping = Self::default();
        for (source, id) in entries {
            mapping
                .category_by_id
                .insert(*id, StateCategory::from_source_state(source));
            mapping.by_source.insert(source.to_lowercase(), *id);
        }
        mapping
    }

    /// Target workflow-state ID for a source state, if mapped.
    #[must_use]
    pub fn lookup(&self, source_state: &str) -> Option<i64> {
        self.by_source.get(&source_state.to_lowercase()).copied()
    }

    /// Coarse category of a target workflow-state ID, if known.
    #[must_use]
    pub fn category_of(&self, state_id: i64) -> Option<StateCategory> {
        self.category_by_id.get(&state_id).copied()
    }
}

/// User table: source user name -> target member UUID.
///
/// Loaded as name -> email from the setup CSV, then joined against the
/// workspace member list to produce member UUIDs.
#[derive(Debug, Clone, Default)]
pub struct UserMapping {
    by_name: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct UserRow {
    pt_user_name: String,
    shortcut_user_email: String,
}

impl UserMapping {
    /// Load the user mapping CSV (`pt_user_name, shortcut_user_email`) and
    /// resolve emails against the workspace member list. Names whose email
    /// matches no member are dropped (and later omitted from payloads).
    ///
    /// # Errors
    ///
    /// Returns `MalformedMapping` if the file cannot be parsed.
    pub fn load(path: &Path, members: &[Member]) -> Result<Self> {
        let malformed = |reason: String| MigrateError::MalformedMapping {
            path: path.to_path_buf(),
            reason,
        };

        let by_email: HashMap<&str, &str> = members
            .iter()
            .filter_map(|m| m.email.as_deref().map(|email| (email, m.id.as_str())))
            .collect();

        let file = File::open(path).map_err(|e| malformed(e.to_string()))?;
        let mut reader = csv::Reader::from_reader(file);
        let mut by_name = HashMap::new();

        for record in reader.deserialize() {
            let row: UserRow = record.map_err(|e| malformed(e.to_string()))?;
            let email = row.shortcut_user_email.trim();
            if email.is_empty() {
                continue;
            }
            match by_email.get(email) {
                Some(member_id) => {
                    by_name.insert(row.pt_user_name.trim().to_string(), (*member_id).to_string());
                }
                None => {
                    tracing::warn!(
                        user = %row.pt_user_name,
                        %email,
                        "mapped email matches no workspace member; user left unmapped"
                    );
                }
            }
        }

        Ok(Self { by_name })
    }

    /// Load the user mapping CSV without resolving against the member
    /// list: emails stand in for member UUIDs. Only suitable for dry runs,
    /// which never send a payload anywhere.
    ///
    /// # Errors
    ///
    /// Returns `MalformedMapping` if the file cannot be parsed.
    pub fn load_unresolved(path: &Path) -> Result<Self> {
        let malformed = |reason: String| MigrateError::MalformedMapping {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| malformed(e.to_string()))?;
        let mut reader = csv::Reader::from_reader(file);
        let mut by_name = HashMap::new();
        for record in reader.deserialize() {
            let row: UserRow = record.map_err(|e| malformed(e.to_string()))?;
            let email = row.shortcut_user_email.trim();
            if !email.is_empty() {
                by_name.insert(row.pt_user_name.trim().to_string(), email.to_string());
            }
        }
        Ok(Self { by_name })
    }

    /// Build a mapping from literal entries (tests, fixtures).
    #[must_use]
    pub fn from_entries(entries: &[(&str, &str)]) -> Self {
        Self {
            by_name: entries
                .iter()
                .map(|(name, id)| ((*name).to_string(), (*id).to_string()))
                .collect(),
        }
    }

    /// Target member UUID for a source user name, if mapped.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }
}

/// Priority table: source priority token -> custom-field value UUID.
#[derive(Debug, Clone, Default)]
pub struct PriorityMapping {
    by_token: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct PriorityRow {
    pt_priority: String,
    shortcut_custom_field_value_id: String,
}

impl PriorityMapping {
    /// Load the priority mapping CSV
    /// (`pt_priority, shortcut_custom_field_value_id`).
    ///
    /// # Errors
    ///
    /// Returns `MalformedMapping` if the file cannot be parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let malformed = |reason: String| MigrateError::MalformedMapping {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| malformed(e.to_string()))?;
        let mut reader = csv::Reader::from_reader(file);
        let mut by_token = HashMap::new();

        for record in reader.deserialize() {
            let row: PriorityRow = record.map_err(|e| malformed(e.to_string()))?;
            let value_id = row.shortcut_custom_field_value_id.trim();
            if value_id.is_empty() {
                continue;
            }
            by_token.insert(row.pt_priority.trim().to_lowercase(), value_id.to_string());
        }

        Ok(Self { by_token })
    }

    /// Build a mapping from literal entries (tests, fixtures).
    #[must_use]
    pub fn from_entries(entries: &[(&str, &str)]) -> Self {
        Self {
            by_token: entries
                .iter()
                .map(|(token, id)| ((*token).to_lowercase(), (*id).to_string()))
                .collect(),
        }
    }

    /// Custom-field value UUID for a source priority token, if mapped.
    #[must_use]
    pub fn lookup(&self, token: &str) -> Option<&str> {
        self.by_token.get(&token.to_lowercase()).map(String::as_str)
    }
}

/// Epic workflow-state IDs for the three aggregate categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EpicStateIds {
    pub todo: i64,
    pub in_progress: i64,
    pub done: i64,
}

impl EpicStateIds {
    /// The epic state ID for a coarse category.
    #[must_use]
    pub const fn id_for(self, category: StateCategory) -> i64 {
        match category {
            StateCategory::Todo => self.todo,
            StateCategory::InProgress => self.in_progress,
            StateCategory::Done => self.done,
        }
    }
}

/// Immutable per-run context handed to the entity builder and collector.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Team/Group to assign created entities to; null is a valid value.
    pub group_id: Option<String>,
    /// Workflow-state mapping table.
    pub states: StateMapping,
    /// User mapping table (source name -> member UUID).
    pub users: UserMapping,
    /// Priority mapping table.
    pub priorities: PriorityMapping,
    /// The built-in Priority custom field in the target workspace.
    pub priority_custom_field_id: String,
    /// Epic workflow-state IDs for aggregate state write-back.
    pub epic_states: EpicStateIds,
    /// Label unique to this invocation, applied to every created entity.
    pub run_label: String,
}

impl RunContext {
    /// Generate the per-run provenance label for an invocation starting now.
    #[must_use]
    pub fn new_run_label(now: chrono::DateTime<chrono::Utc>) -> String {
        format!(
            "{} {}",
            crate::model::IMPORT_LABEL,
            now.format("%Y-%m-%d %H:%M:%S")
        )
    }
}
