//! Shared in-memory Shortcut workspace for integration tests.

#![allow(dead_code, clippy::missing_panics_doc, clippy::missing_errors_doc, clippy::must_use_candidate)]

use std::collections::HashMap;
use std::path::PathBuf;

use migrate_lib::api::{
    CommentRecord, CreatedResource, EpicDetail, EpicSummary, ShortcutApi, StoryDetail,
    StoryLinkRecord, StorySummary, UploadedFile,
};
use migrate_lib::model::{
    EntityKind, EpicPayload, IterationPayload, LabelPayload, Member, StoryLink, StoryPayload,
};
use migrate_lib::Result;

#[derive(Debug, Clone)]
pub struct StoryState {
    pub name: String,
    pub external_id: Option<String>,
    pub epic_id: Option<i64>,
    pub description: Option<String>,
    pub links: Vec<StoryLink>,
    pub comments: Vec<(i64, String)>,
}

#[derive(Debug, Clone)]
pub struct EpicState {
    pub name: String,
    pub external_id: Option<String>,
    pub description: Option<String>,
    pub comments: Vec<(i64, String)>,
}

/// Stateful fake workspace: creations are visible to later reads, so the
/// same instance can serve an import and then a reconciliation pass.
#[derive(Debug, Default)]
pub struct MockWorkspace {
    next_id: i64,
    pub labels: Vec<String>,
    pub epics: HashMap<i64, EpicState>,
    pub iterations: Vec<(i64, IterationPayload)>,
    pub stories: HashMap<i64, StoryState>,
    pub story_batches: Vec<usize>,
    pub epic_state_updates: Vec<(i64, i64)>,
    pub story_epic_updates: Vec<(i64, i64)>,
    pub links_created: Vec<StoryLink>,
    pub description_updates: Vec<(i64, String)>,
    pub comment_updates: Vec<(i64, i64, String)>,
    pub members: Vec<Member>,
}

impl MockWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    fn assign(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn story_id_by_name(&self, name: &str) -> i64 {
        *self
            .stories
            .iter()
            .find(|(_, s)| s.name == name)
            .map(|(id, _)| id)
            .expect("story exists")
    }

    pub fn epic_id_by_name(&self, name: &str) -> i64 {
        *self
            .epics
            .iter()
            .find(|(_, e)| e.name == name)
            .map(|(id, _)| id)
            .expect("epic exists")
    }
}

impl ShortcutApi for MockWorkspace {
    fn member_slug(&mut self) -> Result<String> {
        Ok("testspace".to_string())
    }

    fn list_members(&mut self) -> Result<Vec<Member>> {
        Ok(self.members.clone())
    }

    fn create_label(&mut self, payload: &LabelPayload) -> Result<CreatedResource> {
        self.labels.push(payload.name.clone());
        let id = self.assign();
        Ok(CreatedResource {
            id,
            name: payload.name.clone(),
            app_url: format!("https://example.com/label/{id}"),
            external_id: None,
        })
    }

    fn create_epic(&mut self, payload: &EpicPayload) -> Result<CreatedResource> {
        let id = self.assign();
        self.epics.insert(
            id,
            EpicState {
                name: payload.name.clone(),
                external_id: payload.external_id.clone(),
                description: payload.description.clone(),
                comments: Vec::new(),
            },
        );
        Ok(CreatedResource {
            id,
            name: payload.name.clone(),
            app_url: format!("https://example.com/epic/{id}"),
            external_id: payload.external_id.clone(),
        })
    }

    fn create_iteration(&mut self, payload: &IterationPayload) -> Result<CreatedResource> {
        let id = self.assign();
        self.iterations.push((id, payload.clone()));
        Ok(CreatedResource {
            id,
            name: payload.name.clone(),
            app_url: String::new(),
            external_id: None,
        })
    }

    fn create_stories(&mut self, payloads: &[StoryPayload]) -> Result<Vec<CreatedResource>> {
        self.story_batches.push(payloads.len());
        let mut created = Vec::new();
        for payload in payloads {
            let id = self.assign();
            let comments = payload
                .comments
                .iter()
                .enumerate()
                .map(|(ix, c)| (i64::try_from(ix).unwrap() + 1, c.text.clone()))
                .collect();
            self.stories.insert(
                id,
                StoryState {
                    name: payload.name.clone(),
                    external_id: payload.external_id.clone(),
                    epic_id: payload.epic_id,
                    description: payload.description.clone(),
                    links: Vec::new(),
                    comments,
                },
            );
            created.push(CreatedResource {
                id,
                name: payload.name.clone(),
                app_url: format!("https://example.com/story/{id}"),
                external_id: payload.external_id.clone(),
            });
        }
        Ok(created)
    }

    fn upload_files(&mut self, paths: &[PathBuf]) -> Vec<UploadedFile> {
        paths
            .iter()
            .map(|p| UploadedFile {
                id: self.assign(),
                name: p
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            })
            .collect()
    }

    fn update_epic_state(&mut self, epic_id: i64, epic_state_id: i64) -> Result<()> {
        self.epic_state_updates.push((epic_id, epic_state_id));
        Ok(())
    }

    fn list_epics(&mut self) -> Result<Vec<EpicSummary>> {
        Ok(self
            .epics
            .iter()
            .map(|(id, e)| EpicSummary {
                id: *id,
                name: e.name.clone(),
                external_id: e.external_id.clone(),
            })
            .collect())
    }

    fn search_stories(&mut self) -> Result<Vec<StorySummary>> {
        Ok(self
            .stories
            .iter()
            .map(|(id, s)| StorySummary {
                id: *id,
                name: s.name.clone(),
                external_id: s.external_id.clone(),
                epic_id: s.epic_id,
            })
            .collect())
    }

    fn get_story(&mut self, story_id: i64) -> Result<StoryDetail> {
        let story = &self.stories[&story_id];
        Ok(StoryDetail {
            id: story_id,
            name: story.name.clone(),
            description: story.description.clone(),
            epic_id: story.epic_id,
            story_links: story
                .links
                .iter()
                .map(|l| StoryLinkRecord {
                    subject_id: Some(l.subject_id),
                    verb: "blocks".to_string(),
                    object_id: Some(l.object_id),
                })
                .collect(),
            comments: story
                .comments
                .iter()
                .map(|(id, text)| CommentRecord {
                    id: *id,
                    text: Some(text.clone()),
                })
                .collect(),
        })
    }

    fn get_epic(&mut self, epic_id: i64) -> Result<EpicDetail> {
        let epic = &self.epics[&epic_id];
        Ok(EpicDetail {
            id: epic_id,
            name: epic.name.clone(),
            description: epic.description.clone(),
            comments: epic
                .comments
                .iter()
                .map(|(id, text)| CommentRecord {
                    id: *id,
                    text: Some(text.clone()),
                })
                .collect(),
        })
    }

    fn update_story_epic(&mut self, story_id: i64, epic_id: i64) -> Result<()> {
        self.story_epic_updates.push((story_id, epic_id));
        if let Some(story) = self.stories.get_mut(&story_id) {
            story.epic_id = Some(epic_id);
        }
        Ok(())
    }

    fn update_story_description(&mut self, story_id: i64, description: &str) -> Result<()> {
        self.description_updates
            .push((story_id, description.to_string()));
        if let Some(story) = self.stories.get_mut(&story_id) {
            story.description = Some(description.to_string());
        }
        Ok(())
    }

    fn update_epic_description(&mut self, epic_id: i64, description: &str) -> Result<()> {
        self.description_updates
            .push((epic_id, description.to_string()));
        if let Some(epic) = self.epics.get_mut(&epic_id) {
            epic.description = Some(description.to_string());
        }
        Ok(())
    }

    fn update_comment(&mut self, story_id: i64, comment_id: i64, text: &str) -> Result<()> {
        self.comment_updates.push((story_id, comment_id, text.to_string()));
        if let Some(story) = self.stories.get_mut(&story_id) {
            if let Some(comment) = story.comments.iter_mut().find(|(id, _)| *id == comment_id) {
                comment.1 = text.to_string();
            }
        }
        Ok(())
    }

    fn update_epic_comment(&mut self, epic_id: i64, comment_id: i64, text: &str) -> Result<()> {
        self.comment_updates.push((epic_id, comment_id, text.to_string()));
        if let Some(epic) = self.epics.get_mut(&epic_id) {
            if let Some(comment) = epic.comments.iter_mut().find(|(id, _)| *id == comment_id) {
                comment.1 = text.to_string();
            }
        }
        Ok(())
    }

    fn create_story_link(&mut self, link: &StoryLink) -> Result<()> {
        self.links_created.push(*link);
        if let Some(story) = self.stories.get_mut(&link.object_id) {
            story.links.push(*link);
        }
        Ok(())
    }

    fn delete_entity(&mut self, kind: EntityKind, id: i64) -> Result<()> {
        match kind {
            EntityKind::Story => {
                self.stories.remove(&id);
            }
            EntityKind::Epic => {
                self.epics.remove(&id);
            }
            EntityKind::Iteration => self.iterations.retain(|(iid, _)| *iid != id),
            EntityKind::Label | EntityKind::File => {}
        }
        Ok(())
    }
}
