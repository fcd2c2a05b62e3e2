//! Dataset handle and search entry points.
//!
//! A [`Dataset`] wraps one remote dataset id together with the client and
//! the polling configuration used for its export jobs. Construction
//! validates that the dataset exists, so a handle in hand means the id was
//! good at least once.
//!
//! Search methods come in two layers. The methods here resolve immediately
//! to rows and implement operator semantics client side where the server
//! has no native support (negation runs as full export minus positive
//! matches, `one_of` over captions/issues runs as a client-side union).
//! The [`Searchable`](crate::searchable::Searchable) builder obtained from
//! [`Dataset::searchable`] instead accumulates predicates into a single
//! query and lets the server combine them.

use std::collections::HashSet;
use std::path::Path;

use reqwest::{multipart, Method};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use visara_core::defaults::{ISSUE_CONFIDENCE_MAX, ISSUE_CONFIDENCE_MIN, SIMILARITY_THRESHOLD_WIDE};
use visara_core::{
    DatasetRecord, EntityType, Error, IssueMode, IssueType, MediaRecord, Predicate, Result,
    SearchCapabilities, SearchOperator, SemanticRelevance, SimilarityAnchor,
};

use crate::client::VisaraClient;
use crate::export::{self, ExportOutcome, PollConfig};
use crate::materialize;
use crate::searchable::Searchable;

/// Handle to one remote dataset.
///
/// Cheap to clone; clones share the client's connection pool but keep their
/// own capability cache and polling configuration.
#[derive(Debug, Clone)]
pub struct Dataset {
    client: VisaraClient,
    id: Uuid,
    /// Row captured when the handle was opened. Status may go stale; the
    /// fetching methods always ask the server again.
    record: DatasetRecord,
    poll: PollConfig,
    capabilities: OnceCell<SearchCapabilities>,
}

impl Dataset {
    /// Open a handle, validating that the dataset exists.
    pub(crate) async fn open(client: VisaraClient, dataset_id: Uuid) -> Result<Self> {
        let record = match client.dataset_details(dataset_id).await {
            Ok(record) => record,
            Err(Error::Http { status: 404, .. }) => return Err(Error::DatasetNotFound(dataset_id)),
            Err(e) => return Err(e),
        };
        Ok(Self {
            client,
            id: dataset_id,
            record,
            poll: PollConfig::default(),
            capabilities: OnceCell::new(),
        })
    }

    /// Replace the polling configuration used for this handle's exports.
    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn client(&self) -> &VisaraClient {
        &self.client
    }

    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    /// Start a fresh query builder for this dataset.
    pub fn searchable(&self) -> Searchable {
        Searchable::new(self.clone())
    }

    // =========================================================================
    // Details and lifecycle
    // =========================================================================

    /// Fetch the current dataset row.
    pub async fn details(&self) -> Result<DatasetRecord> {
        self.client.dataset_details(self.id).await
    }

    /// Fetch the current processing status.
    pub async fn status(&self) -> Result<String> {
        Ok(self.details().await?.status)
    }

    /// Fetch dataset statistics as raw JSON.
    pub async fn stats(&self) -> Result<Value> {
        let response = self
            .client
            .request(Method::GET, &format!("/dataset/{}/stats", self.id))?
            .send()
            .await?;
        let response = VisaraClient::check(response).await?;
        Ok(response.json().await?)
    }

    /// Preview rows of the first explore cluster, or empty when the
    /// deployment reports no clusters.
    pub async fn explore(&self) -> Result<Vec<Value>> {
        let response = self
            .client
            .request(Method::GET, &format!("/explore/{}", self.id))?
            .send()
            .await?;
        let response = VisaraClient::check(response).await?;
        let body: Value = response.json().await?;
        let previews = body
            .get("clusters")
            .and_then(Value::as_array)
            .and_then(|clusters| clusters.first())
            .and_then(|cluster| cluster.get("previews"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(previews)
    }

    /// Delete the remote dataset. The handle is useless afterwards.
    pub async fn delete(&self) -> Result<Value> {
        let response = self
            .client
            .request(Method::DELETE, &format!("/dataset/{}", self.id))?
            .send()
            .await?;
        let response = VisaraClient::check(response).await?;
        info!(dataset_id = %self.id, "Dataset deleted");
        Ok(response.json().await?)
    }

    /// Fetch stored details for one media item.
    pub async fn image_info(&self, media_id: &str) -> Result<Value> {
        let response = self
            .client
            .request(Method::GET, &format!("/image/{media_id}"))?
            .send()
            .await?;
        let response = VisaraClient::check(response).await?;
        Ok(response.json().await?)
    }

    // =========================================================================
    // Export
    // =========================================================================

    /// Export the full dataset manifest as raw JSON.
    ///
    /// Errors unless the dataset has finished processing.
    pub async fn export(&self) -> Result<Value> {
        let details = self.details().await?;
        if !details.is_exportable() {
            return Err(Error::Export(format!(
                "cannot export dataset {}: status is '{}'",
                self.id, details.status
            )));
        }
        let response = self
            .client
            .request(Method::GET, &format!("/dataset/{}/export", self.id))?
            .query(&[("export_format", "json")])
            .send()
            .await?;
        let response = VisaraClient::check(response).await?;
        Ok(response.json().await?)
    }

    /// Export the full dataset as rows, swallowing every failure.
    ///
    /// Metadata entries are dropped rather than folded into columns. A
    /// dataset that is not ready, a transport failure, or a manifest
    /// without `media_items` all log and yield an empty vec so batch
    /// scripts keep running.
    #[instrument(skip(self), fields(subsystem = "client", op = "export_to_records", dataset_id = %self.id))]
    pub async fn export_to_records(&self) -> Vec<MediaRecord> {
        let manifest = match self.export().await {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(error = %e, "Dataset export failed");
                return Vec::new();
            }
        };
        let Some(items) = manifest.get("media_items").and_then(Value::as_array) else {
            warn!("No media_items found in export data");
            return Vec::new();
        };
        let records: Vec<MediaRecord> = items.iter().map(materialize::strip_item).collect();
        info!(result_count = records.len(), "Dataset export complete");
        records
    }

    // =========================================================================
    // Capabilities
    // =========================================================================

    /// Search feature flags for this dataset, fetched once per handle.
    pub async fn search_capabilities(&self) -> Result<SearchCapabilities> {
        self.capabilities
            .get_or_try_init(|| self.fetch_capabilities())
            .await
            .copied()
    }

    async fn fetch_capabilities(&self) -> Result<SearchCapabilities> {
        let response = self
            .client
            .request(Method::GET, "/user_config")?
            .query(&[("dataset_id", &self.id.to_string())])
            .send()
            .await?;
        let response = VisaraClient::check(response).await?;
        let body: Value = response.json().await?;
        Ok(Self::capabilities_from_config(&body))
    }

    /// Pull the textual-search flags out of the account configuration.
    fn capabilities_from_config(config: &Value) -> SearchCapabilities {
        let options = config
            .get("features")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .find(|feature| {
                feature.get("feature_key").and_then(Value::as_str) == Some("TEXTUAL_SEARCH_IMAGE")
            })
            .and_then(|feature| feature.get("feature_options"));
        let flag = |key: &str| options.and_then(|o| o.get(key)).and_then(Value::as_bool);
        SearchCapabilities {
            labels_search: flag("labels_search"),
            captions_search: flag("captions_search"),
            semantic_search: flag("semantic_search"),
        }
    }

    // =========================================================================
    // VQL search
    // =========================================================================

    /// Run a query to rows: submit, poll to a terminal state, download,
    /// flatten.
    ///
    /// An empty query, a rejected task, and a deadline that passes all
    /// collapse to an empty row set; use [`Dataset::search_outcome`] when
    /// the distinction matters. Transport and decoding-transport failures
    /// propagate.
    #[instrument(skip(self, query), fields(subsystem = "client", op = "search_by_vql", dataset_id = %self.id))]
    pub async fn search_by_vql(
        &self,
        query: &[Predicate],
        entity_type: EntityType,
    ) -> Result<Vec<MediaRecord>> {
        if query.is_empty() {
            warn!("No predicates provided for search");
            return Ok(Vec::new());
        }
        match self.search_outcome(query, entity_type).await? {
            ExportOutcome::Completed { download_uri, .. } => {
                materialize::fetch_records(&self.client, &download_uri).await
            }
            ExportOutcome::Rejected { reason } => {
                info!(
                    reason = reason.as_deref().unwrap_or("no reason provided"),
                    "Search task rejected; returning no rows"
                );
                Ok(Vec::new())
            }
            ExportOutcome::TimedOut { last_status } => {
                warn!(
                    last_status = last_status.as_deref().unwrap_or("unknown"),
                    "Search task did not complete; returning no rows"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Run a query to its typed terminal state without downloading results.
    pub async fn search_outcome(
        &self,
        query: &[Predicate],
        entity_type: EntityType,
    ) -> Result<ExportOutcome> {
        export::run(&self.client, self.id, query, entity_type, &self.poll).await
    }

    // =========================================================================
    // Label search
    // =========================================================================

    /// Search by labels.
    ///
    /// `IS` and `IS_ONE_OF` run server side as a single label predicate.
    /// The negating operators run as a full export minus the positive
    /// matches, subtracted by `media_id`; they cost one full export plus
    /// one search. A disabled label-search capability logs and returns no
    /// rows.
    pub async fn search_by_labels(
        &self,
        labels: &[String],
        entity_type: EntityType,
        operator: SearchOperator,
    ) -> Result<Vec<MediaRecord>> {
        if !self.search_capabilities().await?.labels_enabled() {
            warn!(dataset_id = %self.id, "Label search is not enabled for this dataset");
            return Ok(Vec::new());
        }
        if labels.is_empty() {
            return Err(Error::InvalidInput("labels must be provided".to_string()));
        }
        match operator {
            SearchOperator::Is | SearchOperator::IsOneOf => {
                self.labels_positive(labels, entity_type, operator).await
            }
            SearchOperator::IsNot => {
                let matching = self
                    .labels_positive(labels, entity_type, SearchOperator::Is)
                    .await?;
                self.subtract_from_export(&matching).await
            }
            SearchOperator::IsNotOneOf => {
                let matching = self
                    .labels_positive(labels, entity_type, SearchOperator::IsOneOf)
                    .await?;
                self.subtract_from_export(&matching).await
            }
        }
    }

    async fn labels_positive(
        &self,
        labels: &[String],
        entity_type: EntityType,
        operator: SearchOperator,
    ) -> Result<Vec<MediaRecord>> {
        let query = [Predicate::labels(operator, labels.to_vec())];
        self.search_by_vql(&query, entity_type).await
    }

    // =========================================================================
    // Caption search
    // =========================================================================

    /// Search by caption text.
    ///
    /// `IS` runs one full-text predicate over the space-joined terms.
    /// `IS_ONE_OF` runs one search per term and unions the rows client
    /// side, deduplicated by `media_id` keeping the first occurrence; this
    /// is a logical OR, unlike the builder path which appends per-term
    /// predicates into one query. The negating operators subtract the
    /// corresponding positive matches from a full export.
    pub async fn search_by_captions(
        &self,
        captions: &[String],
        entity_type: EntityType,
        operator: SearchOperator,
    ) -> Result<Vec<MediaRecord>> {
        if !self.search_capabilities().await?.captions_enabled() {
            warn!(dataset_id = %self.id, "Caption search is not enabled for this dataset");
            return Ok(Vec::new());
        }
        if captions.is_empty() {
            return Err(Error::InvalidInput("captions must be provided".to_string()));
        }
        match operator {
            SearchOperator::Is => self.captions_joined(captions, entity_type).await,
            SearchOperator::IsOneOf => self.captions_union(captions, entity_type).await,
            SearchOperator::IsNot => {
                let matching = self.captions_joined(captions, entity_type).await?;
                self.subtract_from_export(&matching).await
            }
            SearchOperator::IsNotOneOf => {
                let matching = self.captions_union(captions, entity_type).await?;
                self.subtract_from_export(&matching).await
            }
        }
    }

    /// One `fts` predicate over all terms joined with spaces.
    async fn captions_joined(
        &self,
        captions: &[String],
        entity_type: EntityType,
    ) -> Result<Vec<MediaRecord>> {
        let query = [Predicate::caption(captions.join(" "))];
        self.search_by_vql(&query, entity_type).await
    }

    /// One search per term, rows unioned client side.
    async fn captions_union(
        &self,
        captions: &[String],
        entity_type: EntityType,
    ) -> Result<Vec<MediaRecord>> {
        let mut batches = Vec::new();
        for caption in captions {
            let query = [Predicate::caption(caption.clone())];
            batches.push(self.search_by_vql(&query, entity_type).await?);
        }
        Ok(union_by_media_id(batches))
    }

    // =========================================================================
    // Issue search
    // =========================================================================

    /// Search by quality issues.
    ///
    /// `IS` filters to media carrying any of the issue types (`mode=in`,
    /// one predicate per type); `IS_NOT_ONE_OF` uses the server's native
    /// exclusion (`mode=out`). `IS_ONE_OF` runs one search per type and
    /// unions client side. `IS_NOT` subtracts the `IS` matches from a full
    /// export.
    pub async fn search_by_issues(
        &self,
        issue_types: &[IssueType],
        entity_type: EntityType,
        operator: SearchOperator,
        confidence_min: f64,
        confidence_max: f64,
    ) -> Result<Vec<MediaRecord>> {
        if issue_types.is_empty() {
            return Err(Error::InvalidInput(
                "issue_types must be provided".to_string(),
            ));
        }
        match operator {
            SearchOperator::Is => {
                self.issues_positive(
                    issue_types,
                    entity_type,
                    confidence_min,
                    confidence_max,
                    IssueMode::In,
                )
                .await
            }
            SearchOperator::IsNotOneOf => {
                self.issues_positive(
                    issue_types,
                    entity_type,
                    confidence_min,
                    confidence_max,
                    IssueMode::Out,
                )
                .await
            }
            SearchOperator::IsOneOf => {
                let mut batches = Vec::new();
                for issue_type in issue_types {
                    let query = [Predicate::issue(
                        *issue_type,
                        confidence_min,
                        confidence_max,
                        IssueMode::In,
                    )];
                    batches.push(self.search_by_vql(&query, entity_type).await?);
                }
                Ok(union_by_media_id(batches))
            }
            SearchOperator::IsNot => {
                let matching = self
                    .issues_positive(
                        issue_types,
                        entity_type,
                        confidence_min,
                        confidence_max,
                        IssueMode::In,
                    )
                    .await?;
                self.subtract_from_export(&matching).await
            }
        }
    }

    /// Search by issues with the default confidence band.
    pub async fn search_by_issues_default(
        &self,
        issue_types: &[IssueType],
        entity_type: EntityType,
        operator: SearchOperator,
    ) -> Result<Vec<MediaRecord>> {
        self.search_by_issues(
            issue_types,
            entity_type,
            operator,
            ISSUE_CONFIDENCE_MIN,
            ISSUE_CONFIDENCE_MAX,
        )
        .await
    }

    async fn issues_positive(
        &self,
        issue_types: &[IssueType],
        entity_type: EntityType,
        confidence_min: f64,
        confidence_max: f64,
        mode: IssueMode,
    ) -> Result<Vec<MediaRecord>> {
        let query: Vec<Predicate> = issue_types
            .iter()
            .map(|issue_type| Predicate::issue(*issue_type, confidence_min, confidence_max, mode))
            .collect();
        self.search_by_vql(&query, entity_type).await
    }

    // =========================================================================
    // Semantic search
    // =========================================================================

    /// Search by semantic text similarity.
    pub async fn search_by_semantic(
        &self,
        text: &str,
        entity_type: EntityType,
        relevance: SemanticRelevance,
    ) -> Result<Vec<MediaRecord>> {
        if !self.search_capabilities().await?.semantic_enabled() {
            warn!(dataset_id = %self.id, "Semantic search is not enabled for this dataset");
            return Ok(Vec::new());
        }
        if text.is_empty() {
            return Err(Error::InvalidInput(
                "text must be a non-empty string".to_string(),
            ));
        }
        let query = [Predicate::semantic(text, relevance.threshold())];
        self.search_by_vql(&query, entity_type).await
    }

    // =========================================================================
    // Visual similarity search
    // =========================================================================

    /// Search by visual similarity to one reference image.
    ///
    /// The image uploads immediately; the returned anchor id pivots the
    /// search. `threshold` narrows results; the default wide threshold of
    /// 0.0 keeps everything the server considers similar.
    pub async fn search_by_visual_similarity(
        &self,
        image_path: impl AsRef<Path>,
        entity_type: EntityType,
    ) -> Result<Vec<MediaRecord>> {
        let anchor_media_id = self
            .upload_similarity_anchor(image_path.as_ref(), false)
            .await?;
        let query = [Predicate::similarity(
            anchor_media_id,
            SIMILARITY_THRESHOLD_WIDE,
        )];
        self.search_by_vql(&query, entity_type).await
    }

    /// Search by visual similarity to several reference images.
    ///
    /// Runs one single-image search per path and unions the rows,
    /// deduplicated by `media_id`.
    pub async fn search_by_visual_similarity_batch(
        &self,
        image_paths: &[impl AsRef<Path>],
        entity_type: EntityType,
    ) -> Result<Vec<MediaRecord>> {
        let mut batches = Vec::new();
        for path in image_paths {
            batches.push(self.search_by_visual_similarity(path, entity_type).await?);
        }
        Ok(union_by_media_id(batches))
    }

    /// Upload a reference image and return its anchor media id.
    pub(crate) async fn upload_similarity_anchor(
        &self,
        image_path: &Path,
        allow_deleted: bool,
    ) -> Result<String> {
        if !image_path.is_file() {
            return Err(Error::InvalidInput(format!(
                "image file not found: {}",
                image_path.display()
            )));
        }
        let file_name = image_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "image path has no usable file name: {}",
                    image_path.display()
                ))
            })?
            .to_string();
        let content_type = match image_path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .as_deref()
        {
            Some("png") => "image/png",
            _ => "image/jpeg",
        };

        info!(dataset_id = %self.id, file_name, "Uploading similarity anchor image");
        let bytes = tokio::fs::read(image_path).await?;
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(content_type)
            .map_err(|e| Error::Request(format!("Failed to create multipart: {}", e)))?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .request(
                Method::POST,
                &format!("/dataset/{}/search-image-similarity", self.id),
            )?
            .query(&[("allow_deleted", allow_deleted.to_string())])
            .multipart(form)
            .send()
            .await?;
        let response = VisaraClient::check(response).await?;
        let anchor: SimilarityAnchor = response.json().await?;
        anchor.anchor_media_id.filter(|id| !id.is_empty()).ok_or_else(|| {
            Error::Export("no anchor_media_id in similarity upload response".to_string())
        })
    }

    // =========================================================================
    // Set arithmetic
    // =========================================================================

    /// Full export minus the given rows, subtracted by `media_id`.
    async fn subtract_from_export(&self, matching: &[MediaRecord]) -> Result<Vec<MediaRecord>> {
        let all = self.export_to_records().await;
        if all.is_empty() {
            return Ok(Vec::new());
        }
        let matched: HashSet<&str> = matching.iter().map(|r| r.media_id.as_str()).collect();
        Ok(all
            .into_iter()
            .filter(|record| !matched.contains(record.media_id.as_str()))
            .collect())
    }
}

impl std::fmt::Display for Dataset {
    /// Renders the row captured when the handle was opened.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Dataset(id='{}', name='{}', status='{}', filename='{}', created_at='{}')",
            self.id,
            self.record.display_name.as_deref().unwrap_or("No name"),
            self.record.status,
            self.record.filename.as_deref().unwrap_or(""),
            self.record.created_at.as_deref().unwrap_or("Unknown"),
        )
    }
}

/// Union row batches, deduplicated by `media_id` keeping the first
/// occurrence.
fn union_by_media_id(batches: Vec<Vec<MediaRecord>>) -> Vec<MediaRecord> {
    let mut seen = HashSet::new();
    let mut combined = Vec::new();
    for batch in batches {
        for record in batch {
            if seen.insert(record.media_id.clone()) {
                combined.push(record);
            }
        }
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(media_id: &str) -> MediaRecord {
        MediaRecord {
            media_id: media_id.to_string(),
            ..MediaRecord::default()
        }
    }

    #[test]
    fn test_union_deduplicates_keeping_first() {
        let mut first = record("a");
        first
            .fields
            .insert("marker".to_string(), json!("from-first"));
        let mut duplicate = record("a");
        duplicate
            .fields
            .insert("marker".to_string(), json!("from-second"));

        let combined = union_by_media_id(vec![vec![first, record("b")], vec![duplicate, record("c")]]);
        assert_eq!(combined.len(), 3);
        assert_eq!(combined[0].media_id, "a");
        assert_eq!(combined[0].fields["marker"], json!("from-first"));
        assert_eq!(combined[1].media_id, "b");
        assert_eq!(combined[2].media_id, "c");
    }

    #[test]
    fn test_union_of_empty_batches_is_empty() {
        assert!(union_by_media_id(vec![Vec::new(), Vec::new()]).is_empty());
    }

    #[test]
    fn test_capabilities_from_config_reads_textual_search_feature() {
        let config = json!({
            "features": [
                {"feature_key": "OTHER_FEATURE", "feature_options": {"labels_search": true}},
                {
                    "feature_key": "TEXTUAL_SEARCH_IMAGE",
                    "feature_options": {
                        "labels_search": true,
                        "captions_search": false,
                        "semantic_search": true
                    }
                }
            ]
        });
        let caps = Dataset::capabilities_from_config(&config);
        assert!(caps.labels_enabled());
        assert!(!caps.captions_enabled());
        assert!(caps.semantic_enabled());
    }

    #[test]
    fn test_capabilities_from_config_missing_feature_disables_all() {
        let caps = Dataset::capabilities_from_config(&json!({"features": []}));
        assert!(!caps.labels_enabled());
        assert!(!caps.captions_enabled());
        assert!(!caps.semantic_enabled());

        let caps = Dataset::capabilities_from_config(&json!({}));
        assert!(!caps.labels_enabled());
    }
}
