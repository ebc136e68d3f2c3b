//! Snapshot of the target workspace for reconciliation runs.
//!
//! Reconciliation happens after a migration, possibly much later, so it
//! cannot rely on in-memory state from the import. Instead it rebuilds the
//! source-ID -> target-ID correspondence from the workspace itself: every
//! imported entity carries its source identifier in `external_id`.

use std::collections::HashMap;

use crate::api::ShortcutApi;
use crate::error::Result;

/// External-ID indexes plus the workspace URL slug.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceSnapshot {
    pub url_slug: String,
    story_by_external: HashMap<String, i64>,
    epic_by_external: HashMap<String, i64>,
}

impl WorkspaceSnapshot {
    /// Fetch the member slug, all epics, and all stories, and index the
    /// ones that carry a source identifier.
    ///
    /// # Errors
    ///
    /// Propagates any API failure.
    pub fn fetch(api: &mut impl ShortcutApi) -> Result<Self> {
        let url_slug = api.member_slug()?;

        let mut epic_by_external = HashMap::new();
        for epic in api.list_epics()? {
            if let Some(external) = epic.external_id {
                epic_by_external.insert(external, epic.id);
            }
        }

        let mut story_by_external = HashMap::new();
        for story in api.search_stories()? {
            if let Some(external) = story.external_id {
                story_by_external.insert(external, story.id);
            }
        }

        tracing::debug!(
            stories = story_by_external.len(),
            epics = epic_by_external.len(),
            "workspace snapshot built"
        );

        Ok(Self {
            url_slug,
            story_by_external,
            epic_by_external,
        })
    }

    /// Target story ID for a source story identifier.
    #[must_use]
    pub fn story_id(&self, external_id: &str) -> Option<i64> {
        self.story_by_external.get(external_id).copied()
    }

    /// Target epic ID for a source epic identifier.
    #[must_use]
    pub fn epic_id(&self, external_id: &str) -> Option<i64> {
        self.epic_by_external.get(external_id).copied()
    }

    /// Browser URL of a story in this workspace.
    #[must_use]
    pub fn story_url(&self, story_id: i64) -> String {
        format!("https://app.shortcut.com/{}/story/{story_id}", self.url_slug)
    }

    /// Browser URL of an epic in this workspace.
    #[must_use]
    pub fn epic_url(&self, epic_id: i64) -> String {
        format!("https://app.shortcut.com/{}/epic/{epic_id}", self.url_slug)
    }

    /// All known target story IDs, in unspecified order.
    pub fn story_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.story_by_external.values().copied()
    }

    /// All known target epic IDs, in unspecified order.
    pub fn epic_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.epic_by_external.values().copied()
    }

    /// Snapshot from literal entries (tests).
    #[must_use]
    pub fn from_entries(
        url_slug: &str,
        stories: &[(&str, i64)],
        epics: &[(&str, i64)],
    ) -> Self {
        Self {
            url_slug: url_slug.to_string(),
            story_by_external: stories
                .iter()
                .map(|(ext, id)| ((*ext).to_string(), *id))
                .collect(),
            epic_by_external: epics
                .iter()
                .map(|(ext, id)| ((*ext).to_string(), *id))
                .collect(),
        }
    }
}
