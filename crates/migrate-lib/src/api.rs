//! Shortcut REST API client.
//!
//! [`ShortcutApi`] is the seam between the pipeline and the network: the
//! collector, reconciliation utilities, and delete path all drive this
//! trait, and tests substitute an in-memory implementation. The real
//! [`ShortcutClient`] wraps every outbound call in the owned
//! [`RateLimiter`](crate::ratelimit::RateLimiter).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{MigrateError, Result};
use crate::model::{
    EntityKind, EpicPayload, IterationPayload, LabelPayload, LinkVerb, Member, StoryLink,
    StoryPayload,
};
use crate::ratelimit::RateLimiter;

/// Production API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.app.shortcut.com/api/v3";

/// Any entity creation response we care to keep.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedResource {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub app_url: String,
    #[serde(default)]
    pub external_id: Option<String>,
}

/// Uploaded file record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedFile {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

/// Slim epic as returned by `GET /epics`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EpicSummary {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub external_id: Option<String>,
}

/// Slim story as returned by `POST /stories/search`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorySummary {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub epic_id: Option<i64>,
}

/// Full story as returned by `GET /stories/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoryDetail {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub epic_id: Option<i64>,
    #[serde(default)]
    pub story_links: Vec<StoryLinkRecord>,
    #[serde(default)]
    pub comments: Vec<CommentRecord>,
}

/// Story link as it appears inside a story response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoryLinkRecord {
    #[serde(default)]
    pub subject_id: Option<i64>,
    pub verb: String,
    #[serde(default)]
    pub object_id: Option<i64>,
}

impl StoryLinkRecord {
    /// Convert to the hashable triple, if complete and the verb is known.
    #[must_use]
    pub fn as_link(&self) -> Option<StoryLink> {
        let verb = match self.verb.as_str() {
            "blocks" => LinkVerb::Blocks,
            "duplicates" => LinkVerb::Duplicates,
            "relates to" | "relates_to" => LinkVerb::RelatesTo,
            _ => return None,
        };
        Some(StoryLink {
            subject_id: self.subject_id?,
            verb,
            object_id: self.object_id?,
        })
    }
}

/// Comment as it appears inside a story or epic response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommentRecord {
    pub id: i64,
    #[serde(default)]
    pub text: Option<String>,
}

/// Full epic as returned by `GET /epics/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EpicDetail {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub comments: Vec<CommentRecord>,
}

/// Operations the pipeline performs against the target workspace.
pub trait ShortcutApi {
    /// URL slug of the workspace behind the token.
    fn member_slug(&mut self) -> Result<String>;

    /// All workspace members.
    fn list_members(&mut self) -> Result<Vec<Member>>;

    fn create_label(&mut self, payload: &LabelPayload) -> Result<CreatedResource>;

    fn create_epic(&mut self, payload: &EpicPayload) -> Result<CreatedResource>;

    fn create_iteration(&mut self, payload: &IterationPayload) -> Result<CreatedResource>;

    /// Bulk-create one batch of stories; the response preserves input order.
    fn create_stories(&mut self, payloads: &[StoryPayload]) -> Result<Vec<CreatedResource>>;

    /// Upload local files. Best-effort: failures are logged and omitted,
    /// never fatal.
    fn upload_files(&mut self, paths: &[PathBuf]) -> Vec<UploadedFile>;

    fn update_epic_state(&mut self, epic_id: i64, epic_state_id: i64) -> Result<()>;

    fn list_epics(&mut self) -> Result<Vec<EpicSummary>>;

    fn search_stories(&mut self) -> Result<Vec<StorySummary>>;

    fn get_story(&mut self, story_id: i64) -> Result<StoryDetail>;

    fn get_epic(&mut self, epic_id: i64) -> Result<EpicDetail>;

    fn update_story_epic(&mut self, story_id: i64, epic_id: i64) -> Result<()>;

    fn update_story_description(&mut self, story_id: i64, description: &str) -> Result<()>;

    fn update_epic_description(&mut self, epic_id: i64, description: &str) -> Result<()>;

    fn update_comment(&mut self, story_id: i64, comment_id: i64, text: &str) -> Result<()>;

    fn update_epic_comment(&mut self, epic_id: i64, comment_id: i64, text: &str) -> Result<()>;

    fn create_story_link(&mut self, link: &StoryLink) -> Result<()>;

    fn delete_entity(&mut self, kind: EntityKind, id: i64) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct MemberInfoResponse {
    workspace2: WorkspaceInfo,
}

#[derive(Debug, Deserialize)]
struct WorkspaceInfo {
    url_slug: String,
}

#[derive(Debug, Deserialize)]
struct MemberResponse {
    id: String,
    profile: MemberProfile,
}

#[derive(Debug, Deserialize)]
struct MemberProfile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    mention_name: Option<String>,
    #[serde(default)]
    email_address: Option<String>,
}

#[derive(Debug, Serialize)]
struct BulkStories<'a> {
    stories: &'a [StoryPayload],
}

#[derive(Debug, Serialize)]
struct StorySearch<'a> {
    /// The search endpoint requires at least one filter; an end date far in
    /// the future matches everything.
    created_at_end: &'a str,
}

#[derive(Debug, Serialize)]
struct EpicStateUpdate {
    epic_state_id: i64,
}

#[derive(Debug, Serialize)]
struct StoryEpicUpdate {
    epic_id: i64,
}

#[derive(Debug, Serialize)]
struct DescriptionUpdate<'a> {
    description: &'a str,
}

#[derive(Debug, Serialize)]
struct CommentUpdate<'a> {
    text: &'a str,
}

/// HTTP client with bearer-token auth and rate limiting.
pub struct ShortcutClient {
    agent: ureq::Agent,
    base_url: String,
    token: String,
    limiter: RateLimiter,
}

impl ShortcutClient {
    /// Client against the production API.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    /// Client against an alternate endpoint (tests, proxies).
    #[must_use]
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .user_agent("shortcut_migrate/0.1")
                .build(),
            base_url: base_url.into(),
            token: token.into(),
            limiter: RateLimiter::for_shortcut(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        self.agent
            .request(method, url)
            .set("Shortcut-Token", &self.token)
            .set("Accept", "application/json; charset=utf-8")
    }

    fn handle<T: DeserializeOwned>(
        url: &str,
        outcome: std::result::Result<ureq::Response, ureq::Error>,
    ) -> Result<T> {
        match outcome {
            Ok(response) => response.into_json::<T>().map_err(|e| MigrateError::ApiShape {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(ureq::Error::Status(status, response)) => Err(MigrateError::Api {
                status,
                url: url.to_string(),
                body: response.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(transport)) => Err(MigrateError::Transport {
                url: url.to_string(),
                reason: transport.to_string(),
            }),
        }
    }

    fn get<T: DeserializeOwned>(&mut self, path: &str) -> Result<T> {
        self.limiter.acquire()?;
        let url = self.url(path);
        tracing::debug!(%url, "GET");
        Self::handle(&url, self.request("GET", &url).call())
    }

    fn post<T: DeserializeOwned>(&mut self, path: &str, body: &impl Serialize) -> Result<T> {
        self.limiter.acquire()?;
        let url = self.url(path);
        tracing::debug!(%url, "POST");
        Self::handle(&url, self.request("POST", &url).send_json(body))
    }

    fn put<T: DeserializeOwned>(&mut self, path: &str, body: &impl Serialize) -> Result<T> {
        self.limiter.acquire()?;
        let url = self.url(path);
        tracing::debug!(%url, "PUT");
        Self::handle(&url, self.request("PUT", &url).send_json(body))
    }

    fn delete(&mut self, path: &str) -> Result<()> {
        self.limiter.acquire()?;
        let url = self.url(path);
        tracing::debug!(%url, "DELETE");
        match self.request("DELETE", &url).call() {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(status, response)) => Err(MigrateError::Api {
                status,
                url,
                body: response.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(transport)) => Err(MigrateError::Transport {
                url,
                reason: transport.to_string(),
            }),
        }
    }

    fn upload_one(&mut self, path: &Path) -> Result<UploadedFile> {
        self.limiter.acquire()?;
        let url = self.url("/files");
        let file_name = path
            .file_name()
            .map_or_else(|| "file".to_string(), |n| n.to_string_lossy().into_owned());
        let bytes = std::fs::read(path)?;

        let boundary = format!("----shortcut-migrate-{}", std::process::id());
        let mut body = Vec::with_capacity(bytes.len() + 256);
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"file0\"; filename=\"{file_name}\"\r\n")
                .as_bytes(),
        );
        body.extend_from_slice(
            format!("Content-Type: {}\r\n\r\n", guess_mime_type(&file_name)).as_bytes(),
        );
        body.extend_from_slice(&bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        tracing::debug!(%url, file = %file_name, "POST multipart");
        let outcome = self
            .agent
            .request("POST", &url)
            .set("Shortcut-Token", &self.token)
            .set("Accept", "application/json")
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={boundary}"),
            )
            .send_bytes(&body);

        let mut files: Vec<UploadedFile> = Self::handle(&url, outcome)?;
        files.pop().ok_or_else(|| MigrateError::ApiShape {
            url,
            reason: "file upload returned an empty array".to_string(),
        })
    }
}

impl ShortcutApi for ShortcutClient {
    fn member_slug(&mut self) -> Result<String> {
        let info: MemberInfoResponse = self.get("/member")?;
        Ok(info.workspace2.url_slug)
    }

    fn list_members(&mut self) -> Result<Vec<Member>> {
        let raw: Vec<MemberResponse> = self.get("/members")?;
        Ok(raw
            .into_iter()
            .map(|m| Member {
                id: m.id,
                name: m.profile.name,
                email: m.profile.email_address,
                mention_name: m.profile.mention_name,
            })
            .collect())
    }

    fn create_label(&mut self, payload: &LabelPayload) -> Result<CreatedResource> {
        self.post("/labels", payload)
    }

    fn create_epic(&mut self, payload: &EpicPayload) -> Result<CreatedResource> {
        self.post("/epics", payload)
    }

    fn create_iteration(&mut self, payload: &IterationPayload) -> Result<CreatedResource> {
        self.post("/iterations", payload)
    }

    fn create_stories(&mut self, payloads: &[StoryPayload]) -> Result<Vec<CreatedResource>> {
        self.post("/stories/bulk", &BulkStories { stories: payloads })
    }

    fn upload_files(&mut self, paths: &[PathBuf]) -> Vec<UploadedFile> {
        let mut uploaded = Vec::new();
        for path in paths {
            match self.upload_one(path) {
                Ok(file) => uploaded.push(file),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "file upload failed, attachment omitted");
                }
            }
        }
        uploaded
    }

    fn update_epic_state(&mut self, epic_id: i64, epic_state_id: i64) -> Result<()> {
        let _: serde_json::Value =
            self.put(&format!("/epics/{epic_id}"), &EpicStateUpdate { epic_state_id })?;
        Ok(())
    }

    fn list_epics(&mut self) -> Result<Vec<EpicSummary>> {
        self.get("/epics")
    }

    fn search_stories(&mut self) -> Result<Vec<StorySummary>> {
        self.post(
            "/stories/search",
            &StorySearch {
                created_at_end: "2999-12-31T00:00:00Z",
            },
        )
    }

    fn get_story(&mut self, story_id: i64) -> Result<StoryDetail> {
        self.get(&format!("/stories/{story_id}"))
    }

    fn get_epic(&mut self, epic_id: i64) -> Result<EpicDetail> {
        self.get(&format!("/epics/{epic_id}"))
    }

    fn update_story_epic(&mut self, story_id: i64, epic_id: i64) -> Result<()> {
        let _: serde_json::Value =
            self.put(&format!("/stories/{story_id}"), &StoryEpicUpdate { epic_id })?;
        Ok(())
    }

    fn update_story_description(&mut self, story_id: i64, description: &str) -> Result<()> {
        let _: serde_json::Value = self.put(
            &format!("/stories/{story_id}"),
            &DescriptionUpdate { description },
        )?;
        Ok(())
    }

    fn update_epic_description(&mut self, epic_id: i64, description: &str) -> Result<()> {
        let _: serde_json::Value = self.put(
            &format!("/epics/{epic_id}"),
            &DescriptionUpdate { description },
        )?;
        Ok(())
    }

    fn update_comment(&mut self, story_id: i64, comment_id: i64, text: &str) -> Result<()> {
        let _: serde_json::Value = self.put(
            &format!("/stories/{story_id}/comments/{comment_id}"),
            &CommentUpdate { text },
        )?;
        Ok(())
    }

    fn update_epic_comment(&mut self, epic_id: i64, comment_id: i64, text: &str) -> Result<()> {
        let _: serde_json::Value = self.put(
            &format!("/epics/{epic_id}/comments/{comment_id}"),
            &CommentUpdate { text },
        )?;
        Ok(())
    }

    fn create_story_link(&mut self, link: &StoryLink) -> Result<()> {
        let _: serde_json::Value = self.post("/story-links", link)?;
        Ok(())
    }

    fn delete_entity(&mut self, kind: EntityKind, id: i64) -> Result<()> {
        let path = match kind {
            EntityKind::Story => format!("/stories/{id}"),
            EntityKind::Epic => format!("/epics/{id}"),
            EntityKind::Iteration => format!("/iterations/{id}"),
            EntityKind::Label => format!("/labels/{id}"),
            EntityKind::File => format!("/files/{id}"),
        };
        self.delete(&path)
    }
}

/// Minimal MIME guess by extension; the API only needs a plausible type.
fn guess_mime_type(file_name: &str) -> &'static str {
    let extension = file_name.rsplit('.').next().unwrap_or_default();
    match extension.to_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}
