//! Configuration for `shortcut_migrate`.
//!
//! Configuration comes from two places:
//! - the `SHORTCUT_API_TOKEN` environment variable (the API credential),
//! - a `config.json` file naming the export, the mapping CSVs, and the
//!   target-workspace IDs the importer cannot discover on its own.
//!
//! Validation collects every problem before reporting, so a user fixes
//! their setup in one pass instead of replaying the importer error by
//! error. All of this runs before any API call.

use std::path::{Path, PathBuf};

use serde_json::Value;

use migrate_lib::mapping::EpicStateIds;

/// Environment variable holding the API token.
pub const TOKEN_ENV_VAR: &str = "SHORTCUT_API_TOKEN";

/// Fully validated run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API credential from the environment.
    pub token: String,
    /// Team/Group for created entities; `null` in the file is a valid
    /// choice and means "no team".
    pub group_id: Option<String>,
    /// The story workflow the state mapping refers to.
    pub workflow_id: i64,
    pub pt_csv_file: PathBuf,
    pub states_csv_file: PathBuf,
    pub users_csv_file: PathBuf,
    pub priorities_csv_file: PathBuf,
    /// The built-in "Priority" custom field in the target workspace.
    pub priority_custom_field_id: String,
    /// Epic workflow-state IDs for aggregate state write-back.
    pub epic_states: EpicStateIds,
    /// Directory of per-story attachment folders, if any.
    pub attachments_dir: Option<PathBuf>,
    /// Where the manifest of created entities is written.
    pub manifest_file: PathBuf,
}

const DEFAULT_MANIFEST_FILE: &str = "data/imported_entities.csv";

/// Load and validate `config.json` plus the environment.
///
/// # Errors
///
/// Returns a single error listing every problem found.
pub fn load(path: &Path) -> anyhow::Result<Config> {
    let token = std::env::var(TOKEN_ENV_VAR).ok();
    load_with_token(path, token)
}

/// Validate `config.json` against an already-resolved token.
///
/// # Errors
///
/// Returns a single error listing every problem found.
pub fn load_with_token(path: &Path, token: Option<String>) -> anyhow::Result<Config> {
    let mut problems = Vec::new();

    let token = token.filter(|t| !t.is_empty());
    if token.is_none() {
        problems.push(format!(
            "the {TOKEN_ENV_VAR} environment variable must hold your Shortcut API token"
        ));
    }

    let root: Option<Value> = match std::fs::read_to_string(path) {
        Ok(text) => match serde_json::from_str(&text) {
            Ok(Value::Object(map)) => Some(Value::Object(map)),
            Ok(_) => {
                problems.push(format!("{} must contain a JSON object", path.display()));
                None
            }
            Err(e) => {
                problems.push(format!("{} is not valid JSON: {e}", path.display()));
                None
            }
        },
        Err(e) => {
            problems.push(format!("cannot read {}: {e}", path.display()));
            None
        }
    };

    let config = root.as_ref().map(|root| {
        // group_id must be present; null is meaningful
        if root.get("group_id").is_none() {
            problems.push(
                "config needs a \"group_id\" entry, which may be null or a Team/Group UUID"
                    .to_string(),
            );
        }
        let group_id = root
            .get("group_id")
            .and_then(Value::as_str)
            .map(ToString::to_string);

        let path_field = |field: &str, problems: &mut Vec<String>| -> PathBuf {
            root.get(field)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map_or_else(
                    || {
                        problems.push(format!("config needs a non-empty \"{field}\" entry"));
                        PathBuf::new()
                    },
                    PathBuf::from,
                )
        };

        let pt_csv_file = path_field("pt_csv_file", &mut problems);
        let states_csv_file = path_field("states_csv_file", &mut problems);
        let users_csv_file = path_field("users_csv_file", &mut problems);
        let priorities_csv_file = path_field("priorities_csv_file", &mut problems);

        let priority_custom_field_id = root
            .get("priority_custom_field_id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map_or_else(
                || {
                    problems.push(
                        "config needs a \"priority_custom_field_id\" entry, the ID of the built-in \"Priority\" custom field"
                            .to_string(),
                    );
                    String::new()
                },
                ToString::to_string,
            );

        let workflow_id = match root.get("workflow_id").and_then(Value::as_i64) {
            Some(id) if id > 0 => id,
            _ => {
                problems.push(
                    "config needs a \"workflow_id\" entry naming the Shortcut Workflow to import into"
                        .to_string(),
                );
                0
            }
        };

        let epic_states = match root
            .get("epic_states")
            .map(|v| serde_json::from_value::<EpicStateIds>(v.clone()))
        {
            Some(Ok(states)) => states,
            Some(Err(e)) => {
                problems.push(format!(
                    "config \"epic_states\" must be an object with numeric \"todo\", \"in_progress\", and \"done\" entries: {e}"
                ));
                EpicStateIds { todo: 0, in_progress: 0, done: 0 }
            }
            None => {
                problems.push(
                    "config needs an \"epic_states\" object with \"todo\", \"in_progress\", and \"done\" epic workflow-state IDs"
                        .to_string(),
                );
                EpicStateIds { todo: 0, in_progress: 0, done: 0 }
            }
        };

        let attachments_dir = root
            .get("attachments_dir")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let manifest_file = root
            .get("manifest_file")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_MANIFEST_FILE), PathBuf::from);

        Config {
            token: token.clone().unwrap_or_default(),
            group_id,
            workflow_id,
            pt_csv_file,
            states_csv_file,
            users_csv_file,
            priorities_csv_file,
            priority_custom_field_id,
            epic_states,
            attachments_dir,
            manifest_file,
        }
    });

    match (config, problems.is_empty()) {
        (Some(config), true) => Ok(config),
        _ => {
            let listing: Vec<String> = problems.iter().map(|p| format!(" - {p}")).collect();
            anyhow::bail!("Problems:\n{}", listing.join("\n"))
        }
    }
}
