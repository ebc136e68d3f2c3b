//! The migration manifest: a CSV of every entity a run created.
//!
//! The manifest is the permanent record of a migration and the input to
//! both reconciliation and rollback, so it is written atomically: to a
//! temporary file in the target directory, then renamed into place.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result};
use crate::model::{CreatedEntity, EntityKind};

/// Flat CSV row shape. [`CreatedEntity`] itself skips empty optionals when
/// serialized as JSON, which would desync CSV columns, so rows go through
/// this mirror struct with every column always present.
#[derive(Debug, Serialize, Deserialize)]
struct ManifestRow {
    id: i64,
    entity_type: EntityKind,
    name: String,
    external_id: Option<String>,
    epic_id: Option<i64>,
    iteration_id: Option<i64>,
    app_url: String,
}

impl From<&CreatedEntity> for ManifestRow {
    fn from(entity: &CreatedEntity) -> Self {
        Self {
            id: entity.id,
            entity_type: entity.entity_type,
            name: entity.name.clone(),
            external_id: entity.external_id.clone(),
            epic_id: entity.epic_id,
            iteration_id: entity.iteration_id,
            app_url: entity.app_url.clone(),
        }
    }
}

impl From<ManifestRow> for CreatedEntity {
    fn from(row: ManifestRow) -> Self {
        Self {
            id: row.id,
            entity_type: row.entity_type,
            name: row.name,
            external_id: row.external_id,
            epic_id: row.epic_id,
            iteration_id: row.iteration_id,
            app_url: row.app_url,
        }
    }
}

/// Write the manifest, replacing any previous file at `path`.
///
/// # Errors
///
/// Returns `Io` or `Csv` on write failure.
pub fn save(path: &Path, entities: &[CreatedEntity]) -> Result<()> {
    let tmp_path = path.with_extension("csv.tmp");
    {
        let mut writer = csv::Writer::from_path(&tmp_path)?;
        for entity in entities {
            writer.serialize(ManifestRow::from(entity))?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp_path, path)?;
    tracing::info!(path = %path.display(), entities = entities.len(), "manifest written");
    Ok(())
}

/// Load a previously written manifest, preserving row order.
///
/// # Errors
///
/// Returns `FileNotFound` if the manifest does not exist, or
/// `ManifestParse` if a row does not deserialize.
pub fn load(path: &Path) -> Result<Vec<CreatedEntity>> {
    if !path.exists() {
        return Err(MigrateError::FileNotFound(path.to_path_buf()));
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut entities = Vec::new();
    for (ix, record) in reader.deserialize::<ManifestRow>().enumerate() {
        let row = record.map_err(|e| MigrateError::ManifestParse {
            path: path.to_path_buf(),
            row: ix + 2,
            reason: e.to_string(),
        })?;
        entities.push(row.into());
    }
    Ok(entities)
}
