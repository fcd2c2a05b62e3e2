//! Export download decoding and row flattening.
//!
//! Completed export tasks publish a download location holding either a zip
//! archive with a `metadata.json` manifest or the manifest JSON directly.
//! Decoding never fails: payloads that match neither layout collapse to a
//! [`DownloadDiagnostic`] so batch callers keep running.

use std::io::{Cursor, Read};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use zip::ZipArchive;

use visara_core::defaults::DOWNLOAD_EXCERPT_CHARS;
use visara_core::{DownloadDiagnostic, MediaRecord, Result};

use crate::client::VisaraClient;

/// Manifest entry name inside a zipped export archive.
const MANIFEST_ENTRY: &str = "metadata.json";

/// Decoded form of an export download.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadPayload {
    /// The payload parsed as JSON (from a zip manifest or bare body).
    Json(Value),
    /// The payload matched no known layout.
    Diagnostic(DownloadDiagnostic),
}

/// Download a completed export and flatten it into media rows.
///
/// Transport failures propagate; undecodable or manifest-less payloads are
/// logged and collapse to an empty row set.
pub(crate) async fn fetch_records(
    client: &VisaraClient,
    download_uri: &str,
) -> Result<Vec<MediaRecord>> {
    let (bytes, content_type) = download(client, download_uri).await?;
    match decode_payload(&bytes, &content_type) {
        DownloadPayload::Json(manifest) if manifest.get("media_items").is_some() => {
            let records = flatten_manifest(&manifest);
            info!(result_count = records.len(), "Export results materialized");
            Ok(records)
        }
        DownloadPayload::Json(_) => {
            warn!("No media_items found in downloaded export data");
            Ok(Vec::new())
        }
        DownloadPayload::Diagnostic(diagnostic) => {
            warn!(
                content_type = %diagnostic.content_type,
                size_bytes = diagnostic.size_bytes,
                error = %diagnostic.error,
                "Export download could not be decoded"
            );
            Ok(Vec::new())
        }
    }
}

/// Fetch the raw payload. Download locations are pre-signed, so no auth
/// headers are attached.
async fn download(client: &VisaraClient, download_uri: &str) -> Result<(Vec<u8>, String)> {
    info!(download_uri = %download_uri, "Downloading export results");
    let response = client.http().get(download_uri).send().await?;
    let response = VisaraClient::check(response).await?;
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let bytes = response.bytes().await?.to_vec();
    debug!(
        size_bytes = bytes.len(),
        content_type = %content_type,
        "Export download complete"
    );
    Ok((bytes, content_type))
}

/// Decode a download body: zip manifest first, then bare JSON, then give up
/// with a diagnostic.
pub fn decode_payload(bytes: &[u8], content_type: &str) -> DownloadPayload {
    match read_zip_manifest(bytes) {
        Ok(manifest) => {
            debug!("Export payload decoded from zip manifest");
            return DownloadPayload::Json(manifest);
        }
        Err(zip_error) => {
            debug!(error = %zip_error, "Payload is not a readable zip; trying bare JSON");
        }
    }

    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => DownloadPayload::Json(value),
        Err(json_error) => {
            let raw_text: String = String::from_utf8_lossy(bytes)
                .chars()
                .take(DOWNLOAD_EXCERPT_CHARS)
                .collect();
            DownloadPayload::Diagnostic(DownloadDiagnostic {
                content_type: content_type.to_string(),
                size_bytes: bytes.len(),
                raw_text,
                error: format!("Response is not valid JSON: {}", json_error),
            })
        }
    }
}

fn read_zip_manifest(bytes: &[u8]) -> std::result::Result<Value, String> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("not a zip archive: {e}"))?;
    let mut entry = archive
        .by_name(MANIFEST_ENTRY)
        .map_err(|e| format!("{MANIFEST_ENTRY} not found in archive: {e}"))?;
    let mut contents = String::new();
    entry
        .read_to_string(&mut contents)
        .map_err(|e| format!("failed to read {MANIFEST_ENTRY}: {e}"))?;
    serde_json::from_str(&contents).map_err(|e| format!("failed to parse {MANIFEST_ENTRY}: {e}"))
}

/// Flatten every item of a manifest, preserving row count and order.
pub fn flatten_manifest(manifest: &Value) -> Vec<MediaRecord> {
    manifest
        .get("media_items")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(flatten_item).collect())
        .unwrap_or_default()
}

/// Flatten one media item: metadata entries fold into the four derived
/// columns, every other field passes through untouched.
pub fn flatten_item(item: &Value) -> MediaRecord {
    let mut fields = item.as_object().cloned().unwrap_or_else(Map::new);
    let media_id = take_media_id(&mut fields);
    let metadata = fields.remove("metadata_items");

    let mut captions = Vec::new();
    let mut image_labels = Vec::new();
    let mut object_labels = Vec::new();
    let mut issues = Vec::new();

    if let Some(entries) = metadata.as_ref().and_then(Value::as_array) {
        for entry in entries {
            let properties = entry.get("properties");
            match entry.get("type").and_then(Value::as_str).unwrap_or("") {
                "caption" => {
                    if let Some(caption) = str_prop(properties, "caption") {
                        captions.push(caption.to_string());
                    }
                }
                "image_label" => {
                    if let Some(category) = str_prop(properties, "category_name") {
                        let source = str_prop_or_empty(properties, "source");
                        image_labels.push(format!("{category}({source})"));
                    }
                }
                "object_label" => {
                    if let Some(category) = str_prop(properties, "category_name") {
                        let bbox = properties
                            .and_then(|p| p.get("bbox"))
                            .and_then(Value::as_array)
                            .cloned()
                            .unwrap_or_default();
                        object_labels.push(format!("{category}{}", render_bbox(&bbox)));
                    }
                }
                "issue" => {
                    if let Some(issue_type) = str_prop(properties, "issue_type") {
                        let description = str_prop_or_empty(properties, "issues_description");
                        let confidence = properties
                            .and_then(|p| p.get("confidence"))
                            .and_then(Value::as_f64)
                            .unwrap_or(0.0);
                        issues.push(format!("{issue_type}:{description}({confidence:.3})"));
                    }
                }
                // Unknown metadata types are dropped.
                _ => {}
            }
        }
    }

    MediaRecord {
        media_id,
        captions: captions.join("; "),
        image_labels: image_labels.join("; "),
        object_labels: object_labels.join("; "),
        issues: issues.join("; "),
        fields,
    }
}

/// Reduce a plain export item to a row: metadata entries are dropped rather
/// than folded.
pub(crate) fn strip_item(item: &Value) -> MediaRecord {
    let mut fields = item.as_object().cloned().unwrap_or_else(Map::new);
    let media_id = take_media_id(&mut fields);
    fields.remove("metadata_items");
    MediaRecord {
        media_id,
        fields,
        ..MediaRecord::default()
    }
}

fn take_media_id(fields: &mut Map<String, Value>) -> String {
    let media_id = fields
        .get("media_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    fields.remove("media_id");
    media_id
}

/// Property lookup that treats an empty string the same as a missing key.
fn str_prop<'a>(properties: Option<&'a Value>, key: &str) -> Option<&'a str> {
    properties
        .and_then(|p| p.get(key))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn str_prop_or_empty<'a>(properties: Option<&'a Value>, key: &str) -> &'a str {
    properties
        .and_then(|p| p.get(key))
        .and_then(Value::as_str)
        .unwrap_or("")
}

/// Render a bounding box the way it appears in exported reports:
/// `[x, y, w, h]` with a comma-space separator.
fn render_bbox(bbox: &[Value]) -> String {
    let parts: Vec<String> = bbox.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(", "))
}
