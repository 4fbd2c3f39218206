//! Document DTOs
//!
//! Registry: `{ "<id>": { "name", "created", "updated", "versionCount" } }`
//! Payload:  `{ "versions": [Snapshot], "currentVersionIndex": i64 }`

use ghostwriter_core::document::{DocumentMetadata, Snapshot, VersionHistory};
use ghostwriter_core::{GhostError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One registry record; the id is the map key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntryDto {
    pub name: String,
    pub created: i64,
    pub updated: i64,
    #[serde(default)]
    pub version_count: usize,
}

impl RegistryEntryDto {
    pub fn from_metadata(metadata: &DocumentMetadata) -> Self {
        Self {
            name: metadata.name.clone(),
            created: metadata.created,
            updated: metadata.updated,
            version_count: metadata.version_count,
        }
    }

    pub fn into_metadata(self, id: String) -> DocumentMetadata {
        DocumentMetadata {
            id,
            name: self.name,
            created: self.created,
            updated: self.updated,
            version_count: self.version_count,
        }
    }
}

/// Registry keyed by document id.
pub type RegistryDto = BTreeMap<String, RegistryEntryDto>;

/// Version history payload as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionHistoryDto {
    pub versions: Vec<Snapshot>,
    /// Missing in payloads written before the cursor was persisted
    #[serde(default)]
    pub current_version_index: Option<i64>,
}

impl VersionHistoryDto {
    pub fn from_domain(history: &VersionHistory) -> Self {
        Self {
            versions: history.versions().to_vec(),
            current_version_index: Some(history.current_index_raw()),
        }
    }

    /// Converts to the domain model; a missing cursor means "latest".
    pub fn into_domain(self) -> Result<VersionHistory> {
        let current = self
            .current_version_index
            .unwrap_or(self.versions.len() as i64 - 1);
        VersionHistory::from_parts(self.versions, current)
    }
}

/// Parses a registry value; absent means empty.
pub fn parse_registry(raw: Option<&str>) -> Result<RegistryDto> {
    match raw {
        Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(raw)?),
        _ => Ok(RegistryDto::new()),
    }
}

pub fn serialize_registry(registry: &RegistryDto) -> Result<String> {
    Ok(serde_json::to_string(registry)?)
}

/// Parses a document payload, reporting any failure as `Corrupted`.
pub fn parse_payload(document_id: &str, raw: &str) -> Result<VersionHistory> {
    let dto: VersionHistoryDto = serde_json::from_str(raw)
        .map_err(|e| GhostError::corrupted("Document", document_id, e.to_string()))?;
    dto.into_domain()
        .map_err(|e| GhostError::corrupted("Document", document_id, e.to_string()))
}

pub fn serialize_payload(history: &VersionHistory) -> Result<String> {
    Ok(serde_json::to_string(&VersionHistoryDto::from_domain(history))?)
}
