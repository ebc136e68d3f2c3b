//! Entity collection and dependency-ordered commit.
//!
//! Entities accumulate in kind-specific buckets, then [`EntityCollector::commit`]
//! creates them against the API strictly in dependency order: labels, epics,
//! iterations, and file uploads all assign IDs that story payloads need
//! before the stories themselves can be sent. Any creation failure aborts
//! the commit; only file uploads degrade to a warning.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;

use crate::api::ShortcutApi;
use crate::error::Result;
use crate::mapping::RunContext;
use crate::model::{
    CreatedEntity, Entity, EntityKind, EntityPayload, IterationKey, IterationPayload,
    LabelPayload, StateCategory, StoryPayload,
};

/// Stories per bulk-create call.
pub const BATCH_SIZE: usize = 20;

/// Per-kind entity counts, used for collection and creation statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    counts: HashMap<EntityKind, usize>,
}

impl Tally {
    #[must_use]
    pub fn of(kind: EntityKind) -> Self {
        let mut tally = Self::default();
        tally.add(kind, 1);
        tally
    }

    pub fn add(&mut self, kind: EntityKind, n: usize) {
        *self.counts.entry(kind).or_default() += n;
    }

    pub fn merge(&mut self, other: &Self) {
        for (kind, n) in &other.counts {
            self.add(*kind, *n);
        }
    }

    #[must_use]
    pub fn count(&self, kind: EntityKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or_default()
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = [
            EntityKind::Epic,
            EntityKind::Story,
            EntityKind::Iteration,
            EntityKind::Label,
            EntityKind::File,
        ]
        .into_iter()
        .filter_map(|kind| {
            let n = self.count(kind);
            if n == 0 {
                return None;
            }
            let noun = if n == 1 { kind.as_str() } else { kind.plural() };
            Some(format!("{n} {noun}"))
        })
        .collect();

        if parts.is_empty() {
            write!(f, "nothing")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

/// Aggregate workflow category of an epic, from its stories' categories.
///
/// No stories or all-todo means the epic has not started; all done means
/// the epic is done; any mixture means in progress.
#[must_use]
pub fn calculate_epic_state(categories: &[StateCategory]) -> StateCategory {
    if categories.is_empty() || categories.iter().all(|c| *c == StateCategory::Todo) {
        StateCategory::Todo
    } else if categories.iter().all(|c| *c == StateCategory::Done) {
        StateCategory::Done
    } else {
        StateCategory::InProgress
    }
}

/// Buckets entities by kind and commits them in dependency order.
pub struct EntityCollector<'a, A: ShortcutApi> {
    api: &'a mut A,
    ctx: &'a RunContext,
    /// Directory holding per-story attachment folders named by source ID.
    attachments_dir: Option<PathBuf>,
    epics: Vec<Entity>,
    stories: Vec<Entity>,
}

impl<'a, A: ShortcutApi> EntityCollector<'a, A> {
    pub fn new(api: &'a mut A, ctx: &'a RunContext, attachments_dir: Option<PathBuf>) -> Self {
        Self {
            api,
            ctx,
            attachments_dir,
            epics: Vec::new(),
            stories: Vec::new(),
        }
    }

    /// Bucket one entity; the returned tally has a single entry for the
    /// entity's kind so callers can accumulate collection statistics.
    pub fn collect(&mut self, entity: Entity) -> Tally {
        let kind = entity.kind();
        match kind {
            EntityKind::Epic => self.epics.push(entity),
            _ => self.stories.push(entity),
        }
        Tally::of(kind)
    }

    /// Create everything collected so far, in dependency order, and return
    /// the manifest of created entities in creation order.
    ///
    /// # Errors
    ///
    /// Any creation failure aborts the commit. File uploads are the one
    /// exception: a failed upload is logged and the attachment omitted.
    pub fn commit(mut self) -> Result<Vec<CreatedEntity>> {
        let mut manifest = Vec::new();

        self.create_labels()?;
        let epic_by_label = self.create_epics(&mut manifest)?;
        self.assign_story_epics(&epic_by_label);
        self.create_iterations(&mut manifest)?;
        self.upload_attachments(&mut manifest);
        self.create_stories(&mut manifest)?;
        self.write_back_epic_states(&manifest)?;

        dedup_by_id(&mut manifest);
        Ok(manifest)
    }

    /// Phase 1: every label referenced anywhere, created up front so later
    /// payloads can reference them by name.
    fn create_labels(&mut self) -> Result<()> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        let labels = self
            .epics
            .iter()
            .chain(self.stories.iter())
            .flat_map(|entity| match &entity.payload {
                EntityPayload::Epic(e) => e.labels.iter(),
                EntityPayload::Story(s) => s.labels.iter(),
            });
        for label in labels {
            if seen.insert(label.name.clone()) {
                names.push(label.name.clone());
            }
        }

        for name in names {
            let created = self.api.create_label(&LabelPayload { name: name.clone() })?;
            if name == self.ctx.run_label {
                // The run label's page lists everything this run created.
                tracing::info!(url = %created.app_url, "imported entities are browsable at the run label");
            }
        }
        Ok(())
    }

    /// Phase 2: epics, plus the label-name -> epic-ID map used to link
    /// stories. Only non-provenance labels identify an epic.
    fn create_epics(&mut self, manifest: &mut Vec<CreatedEntity>) -> Result<HashMap<String, i64>> {
        let mut epic_by_label = HashMap::new();
        for entity in &self.epics {
            let EntityPayload::Epic(payload) = &entity.payload else {
                continue;
            };
            let created = self.api.create_epic(payload)?;
            tracing::debug!(epic = %payload.name, id = created.id, "created epic");
            for label in &payload.labels {
                if !label.is_provenance(&self.ctx.run_label) {
                    epic_by_label.insert(label.name.clone(), created.id);
                }
            }
            manifest.push(CreatedEntity {
                id: created.id,
                entity_type: EntityKind::Epic,
                name: payload.name.clone(),
                external_id: payload.external_id.clone(),
                epic_id: None,
                iteration_id: None,
                app_url: created.app_url,
            });
        }
        Ok(epic_by_label)
    }

    /// Phase 3: a story joins an epic only when exactly one of its labels
    /// names one. Zero matches means no epic; several matches are
    /// ambiguous and the story is left unassigned rather than guessed.
    fn assign_story_epics(&mut self, epic_by_label: &HashMap<String, i64>) {
        for entity in &mut self.stories {
            let EntityPayload::Story(payload) = &mut entity.payload else {
                continue;
            };
            let matches: Vec<i64> = payload
                .labels
                .iter()
                .filter_map(|label| epic_by_label.get(&label.name).copied())
                .collect();
            match matches.as_slice() {
                [only] => payload.epic_id = Some(*only),
                [] => {}
                many => {
                    tracing::warn!(
                        story = %payload.name,
                        candidates = many.len(),
                        "story labels match multiple epics, leaving unassigned"
                    );
                }
            }
        }
    }

    /// Phase 4: one iteration per unique key, shared by every story that
    /// carried that key.
    fn create_iterations(&mut self, manifest: &mut Vec<CreatedEntity>) -> Result<()> {
        let mut id_by_key: HashMap<IterationKey, i64> = HashMap::new();
        let mut ordered_keys = Vec::new();
        for entity in &self.stories {
            if let Some(key) = &entity.iteration {
                if !ordered_keys.contains(key) {
                    ordered_keys.push(key.clone());
                }
            }
        }

        for key in ordered_keys {
            let payload = IterationPayload {
                name: format!("Iteration {}", key.id),
                start_date: key.start.clone(),
                end_date: key.end.clone(),
            };
            let created = self.api.create_iteration(&payload)?;
            manifest.push(CreatedEntity {
                id: created.id,
                entity_type: EntityKind::Iteration,
                name: payload.name.clone(),
                external_id: None,
                epic_id: None,
                iteration_id: None,
                app_url: created.app_url,
            });
            id_by_key.insert(key, created.id);
        }

        for entity in &mut self.stories {
            let iteration_id = entity
                .iteration
                .as_ref()
                .and_then(|key| id_by_key.get(key).copied());
            if let EntityPayload::Story(payload) = &mut entity.payload {
                payload.iteration_id = iteration_id;
            }
        }
        Ok(())
    }

    /// Phase 5: best-effort attachment uploads. Files live in a directory
    /// named after the story's source ID; they must be attached at story
    /// creation, so uploads happen first.
    fn upload_attachments(&mut self, manifest: &mut Vec<CreatedEntity>) {
        let Some(root) = self.attachments_dir.clone() else {
            return;
        };
        for entity in &mut self.stories {
            let EntityPayload::Story(payload) = &mut entity.payload else {
                continue;
            };
            let Some(external_id) = &payload.external_id else {
                continue;
            };
            let dir = root.join(external_id);
            if !dir.is_dir() {
                continue;
            }
            let mut paths: Vec<PathBuf> = match std::fs::read_dir(&dir) {
                Ok(entries) => entries
                    .filter_map(std::result::Result::ok)
                    .map(|e| e.path())
                    .filter(|p| p.is_file())
                    .collect(),
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "cannot list attachment directory");
                    continue;
                }
            };
            paths.sort();

            for uploaded in self.api.upload_files(&paths) {
                payload.file_ids.push(uploaded.id);
                manifest.push(CreatedEntity {
                    id: uploaded.id,
                    entity_type: EntityKind::File,
                    name: uploaded.name,
                    external_id: Some(external_id.clone()),
                    epic_id: None,
                    iteration_id: None,
                    app_url: String::new(),
                });
            }
        }
    }

    /// Phase 6: stories, bulk-created in fixed-size batches with an
    /// explicit flush of the remainder.
    fn create_stories(&mut self, manifest: &mut Vec<CreatedEntity>) -> Result<()> {
        let payloads: Vec<StoryPayload> = self
            .stories
            .iter()
            .filter_map(|entity| match &entity.payload {
                EntityPayload::Story(payload) => Some(payload.clone()),
                EntityPayload::Epic(_) => None,
            })
            .collect();

        for batch in payloads.chunks(BATCH_SIZE) {
            let created = self.api.create_stories(batch)?;
            tracing::debug!(batch = batch.len(), created = created.len(), "created story batch");
            for (payload, created) in batch.iter().zip(created) {
                manifest.push(CreatedEntity {
                    id: created.id,
                    entity_type: EntityKind::Story,
                    name: payload.name.clone(),
                    external_id: payload.external_id.clone(),
                    epic_id: payload.epic_id,
                    iteration_id: payload.iteration_id,
                    app_url: created.app_url,
                });
            }
        }
        Ok(())
    }

    /// Phase 7: an epic created empty starts in the default (unstarted)
    /// state; once its stories exist the aggregate may differ, and only
    /// then is a state write needed.
    fn write_back_epic_states(&mut self, manifest: &[CreatedEntity]) -> Result<()> {
        let mut categories_by_epic: HashMap<i64, Vec<StateCategory>> = HashMap::new();
        for entity in &self.stories {
            let EntityPayload::Story(payload) = &entity.payload else {
                continue;
            };
            let Some(epic_id) = payload.epic_id else {
                continue;
            };
            let category = payload
                .workflow_state_id
                .and_then(|id| self.ctx.states.category_of(id))
                .unwrap_or(StateCategory::Todo);
            categories_by_epic.entry(epic_id).or_default().push(category);
        }

        for created in manifest
            .iter()
            .filter(|c| c.entity_type == EntityKind::Epic)
        {
            let categories = categories_by_epic
                .get(&created.id)
                .map_or(&[] as &[StateCategory], Vec::as_slice);
            let aggregate = calculate_epic_state(categories);
            if aggregate != StateCategory::Todo {
                let state_id = self.ctx.epic_states.id_for(aggregate);
                tracing::debug!(epic = created.id, state = %aggregate, "writing back epic state");
                self.api.update_epic_state(created.id, state_id)?;
            }
        }
        Ok(())
    }
}

/// Keep the first occurrence of each (kind, id) pair, preserving order.
fn dedup_by_id(manifest: &mut Vec<CreatedEntity>) {
    let mut seen = HashSet::new();
    manifest.retain(|entry| seen.insert((entry.entity_type, entry.id)));
}
