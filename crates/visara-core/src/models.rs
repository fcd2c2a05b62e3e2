//! Core data models for the Visara SDK.
//!
//! These types mirror the wire shapes of the Visara API and are shared
//! across all SDK crates.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::defaults::EXPORTABLE_STATUSES;

// =============================================================================
// DATASET TYPES
// =============================================================================

/// A dataset row as returned by the listing and details endpoints.
///
/// Timestamps are kept as raw strings because the API does not guarantee a
/// timezone-qualified format across deployments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub id: Uuid,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub source_dataset_id: Option<Uuid>,
    #[serde(default)]
    pub owned_by: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub preview_uri: Option<String>,
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub source_uri: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub sample: Option<bool>,
    pub status: String,
    #[serde(default)]
    pub n_images: Option<i64>,
}

impl DatasetRecord {
    /// Whether the dataset has finished processing and can be exported.
    pub fn is_exportable(&self) -> bool {
        EXPORTABLE_STATUSES.contains(&self.status.as_str())
    }
}

// =============================================================================
// EXPORT TYPES
// =============================================================================

/// Terminal success status reported by the export status endpoint.
pub const EXPORT_STATUS_COMPLETED: &str = "COMPLETED";

/// Terminal failure status reported by the export status endpoint.
pub const EXPORT_STATUS_REJECTED: &str = "REJECTED";

/// State of a server-side export task.
///
/// Every field is optional: a submission the server refuses outright may
/// carry no status at all, and poll responses are not required to echo the
/// task id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportTask {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub download_uri: Option<String>,
    #[serde(default)]
    pub result_message: Option<String>,
}

impl ExportTask {
    pub fn is_completed(&self) -> bool {
        self.status.as_deref() == Some(EXPORT_STATUS_COMPLETED)
    }

    pub fn is_rejected(&self) -> bool {
        self.status.as_deref() == Some(EXPORT_STATUS_REJECTED)
    }
}

/// One flattened row of export results.
///
/// `captions`, `image_labels`, `object_labels`, and `issues` are rendered
/// from the item's metadata entries; every other scalar field of the item
/// passes through in `fields`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub media_id: String,
    pub captions: String,
    pub image_labels: String,
    pub object_labels: String,
    pub issues: String,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, JsonValue>,
}

/// Captured details of an export download that could not be decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadDiagnostic {
    pub content_type: String,
    pub size_bytes: usize,
    /// Leading excerpt of the payload, capped for log friendliness.
    pub raw_text: String,
    pub error: String,
}

// =============================================================================
// SEARCH TYPES
// =============================================================================

/// Granularity of search results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityType {
    #[default]
    Images,
    Objects,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Images => "IMAGES",
            Self::Objects => "OBJECTS",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Search feature flags resolved from the account configuration endpoint.
///
/// `None` means the deployment did not report the flag; treat that as
/// disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCapabilities {
    #[serde(default)]
    pub labels_search: Option<bool>,
    #[serde(default)]
    pub captions_search: Option<bool>,
    #[serde(default)]
    pub semantic_search: Option<bool>,
}

impl SearchCapabilities {
    pub fn labels_enabled(&self) -> bool {
        self.labels_search.unwrap_or(false)
    }

    pub fn captions_enabled(&self) -> bool {
        self.captions_search.unwrap_or(false)
    }

    pub fn semantic_enabled(&self) -> bool {
        self.semantic_search.unwrap_or(false)
    }
}

/// Server-side handle to an uploaded similarity anchor image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimilarityAnchor {
    #[serde(default)]
    pub anchor_media_id: Option<String>,
    #[serde(default)]
    pub anchor_type: Option<String>,
}
