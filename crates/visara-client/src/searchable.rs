//! Fluent query accumulator over a dataset.
//!
//! A [`Searchable`] collects predicates into one query and evaluates it
//! lazily. Builder methods never mutate: each returns a new `Searchable`
//! with the extended query and empty caches, so intermediate stages stay
//! reusable. The identity token rides along unchanged through chaining
//! and [`Searchable::reset`], which lets callers correlate every stage of
//! one logical search.
//!
//! Unlike the [`Dataset`]-level wrappers, the builder translates operators
//! directly into predicate wire values and leaves their combination to the
//! server; it performs no client-side negation or union. The one eager
//! side effect is [`Searchable::search_by_visual_similarity`], which
//! uploads its reference image at build time to obtain the anchor id the
//! predicate needs.

use std::path::Path;

use tokio::sync::OnceCell;
use tracing::debug;
use uuid::Uuid;

use visara_core::defaults::SIMILARITY_THRESHOLD;
use visara_core::{
    query_to_string, EntityType, Error, IssueMode, IssueType, MediaRecord, Predicate, Result,
    SearchOperator, SemanticRelevance,
};

use crate::dataset::Dataset;

/// Immutable builder for a composite VQL query with memoized evaluation.
#[derive(Debug, Clone)]
pub struct Searchable {
    dataset: Dataset,
    query: Vec<Predicate>,
    entity_type: EntityType,
    /// Assigned once per logical search; copied forward by every builder
    /// method.
    searchable_id: Uuid,
    results: OnceCell<Vec<MediaRecord>>,
    count: OnceCell<usize>,
}

impl Searchable {
    /// Start an empty query over a dataset.
    pub fn new(dataset: Dataset) -> Self {
        Self::with_query(dataset, Vec::new())
    }

    /// Start from an existing predicate list.
    pub fn with_query(dataset: Dataset, query: Vec<Predicate>) -> Self {
        Self {
            dataset,
            query,
            entity_type: EntityType::default(),
            searchable_id: Uuid::new_v4(),
            results: OnceCell::new(),
            count: OnceCell::new(),
        }
    }

    /// New builder carrying this one's identity, with fresh caches.
    fn derive(&self, query: Vec<Predicate>) -> Self {
        Self {
            dataset: self.dataset.clone(),
            query,
            entity_type: self.entity_type,
            searchable_id: self.searchable_id,
            results: OnceCell::new(),
            count: OnceCell::new(),
        }
    }

    fn extended(&self, added: impl IntoIterator<Item = Predicate>) -> Self {
        let mut query = self.query.clone();
        query.extend(added);
        self.derive(query)
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn searchable_id(&self) -> Uuid {
        self.searchable_id
    }

    pub fn query(&self) -> &[Predicate] {
        &self.query
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// Evaluate at a different granularity. Caches do not carry over, so a
    /// cached result can never be served for a mismatched entity type.
    pub fn with_entity_type(&self, entity_type: EntityType) -> Self {
        let mut next = self.derive(self.query.clone());
        next.entity_type = entity_type;
        next
    }

    /// Drop all predicates, keeping the identity token.
    pub fn reset(&self) -> Self {
        self.derive(Vec::new())
    }

    // =========================================================================
    // Builder methods
    // =========================================================================

    /// Append a label predicate.
    ///
    /// The operator's wire value passes straight through; the server
    /// evaluates negating operators natively on this path.
    pub async fn search_by_labels(
        &self,
        labels: &[String],
        operator: SearchOperator,
    ) -> Result<Self> {
        if !self.dataset.search_capabilities().await?.labels_enabled() {
            return Err(Error::FeatureDisabled("label search".to_string()));
        }
        if labels.is_empty() {
            return Err(Error::InvalidInput("labels must be provided".to_string()));
        }
        Ok(self.extended([Predicate::labels(operator, labels.to_vec())]))
    }

    /// Append caption predicates.
    ///
    /// `IS` joins all terms into one full-text predicate. `IS_ONE_OF`
    /// appends one predicate per term and leaves the combination semantics
    /// to the server, which treats co-resident predicates conjunctively;
    /// for a client-side OR use
    /// [`Dataset::search_by_captions`](crate::dataset::Dataset::search_by_captions).
    /// Other operators are not supported on the builder path.
    pub async fn search_by_captions(
        &self,
        captions: &[String],
        operator: SearchOperator,
    ) -> Result<Self> {
        if !self.dataset.search_capabilities().await?.captions_enabled() {
            return Err(Error::FeatureDisabled("caption search".to_string()));
        }
        if captions.is_empty() {
            return Err(Error::InvalidInput("captions must be provided".to_string()));
        }
        match operator {
            SearchOperator::Is => Ok(self.extended([Predicate::caption(captions.join(" "))])),
            SearchOperator::IsOneOf => Ok(self.extended(
                captions
                    .iter()
                    .map(|caption| Predicate::caption(caption.clone())),
            )),
            other => Err(Error::InvalidInput(format!(
                "operator {other} is not supported for captions in the query builder"
            ))),
        }
    }

    /// Append one issue predicate per issue type.
    ///
    /// `IS` keeps matching media (`mode=in`); any other operator excludes
    /// them (`mode=out`). The confidence band is carried on every
    /// predicate.
    pub fn search_by_issues(
        &self,
        issue_types: &[IssueType],
        operator: SearchOperator,
        confidence_min: f64,
        confidence_max: f64,
    ) -> Self {
        let mode = if operator == SearchOperator::Is {
            IssueMode::In
        } else {
            IssueMode::Out
        };
        self.extended(issue_types.iter().map(|issue_type| {
            Predicate::issue(*issue_type, confidence_min, confidence_max, mode)
        }))
    }

    /// Append a semantic text predicate.
    pub async fn search_by_semantic(
        &self,
        text: &str,
        relevance: SemanticRelevance,
    ) -> Result<Self> {
        if !self.dataset.search_capabilities().await?.semantic_enabled() {
            return Err(Error::FeatureDisabled("semantic search".to_string()));
        }
        if text.is_empty() {
            return Err(Error::InvalidInput(
                "text must be a non-empty string".to_string(),
            ));
        }
        Ok(self.extended([Predicate::semantic(text, relevance.threshold())]))
    }

    /// Append a similarity predicate, uploading the reference image now.
    ///
    /// This is the one builder method with an eager side effect: the
    /// anchor id only exists server side, so the upload cannot be deferred
    /// to evaluation. A failed upload surfaces immediately and leaves the
    /// builder untouched.
    pub async fn search_by_visual_similarity(
        &self,
        image_path: impl AsRef<Path>,
        threshold: f64,
    ) -> Result<Self> {
        let anchor_media_id = self
            .dataset
            .upload_similarity_anchor(image_path.as_ref(), false)
            .await?;
        Ok(self.extended([Predicate::similarity(anchor_media_id, threshold)]))
    }

    /// Append a similarity predicate with the default threshold.
    pub async fn search_by_visual_similarity_default(
        &self,
        image_path: impl AsRef<Path>,
    ) -> Result<Self> {
        self.search_by_visual_similarity(image_path, SIMILARITY_THRESHOLD)
            .await
    }

    // =========================================================================
    // Evaluation
    // =========================================================================

    /// Materialize the query, caching rows on this instance.
    ///
    /// The first call runs one submit-poll-download cycle (or a full
    /// export when the query is empty); later calls on the same instance
    /// return the cached rows without network work. The cache is never
    /// invalidated: a remote dataset change after the first evaluation is
    /// not reflected.
    pub async fn get_results(&self) -> Result<Vec<MediaRecord>> {
        let rows = self
            .results
            .get_or_try_init(|| self.evaluate())
            .await?;
        Ok(rows.clone())
    }

    /// Count matching rows, caching the count on this instance.
    ///
    /// Memoized independently of [`Searchable::get_results`]: the first
    /// call always runs its own evaluation, even when results are already
    /// cached.
    pub async fn count(&self) -> Result<usize> {
        self.count
            .get_or_try_init(|| async { Ok(self.evaluate().await?.len()) })
            .await
            .copied()
    }

    async fn evaluate(&self) -> Result<Vec<MediaRecord>> {
        if self.query.is_empty() {
            debug!(searchable_id = %self.searchable_id, "Empty query; exporting full dataset");
            return Ok(self.dataset.export_to_records().await);
        }
        self.dataset
            .search_by_vql(&self.query, self.entity_type)
            .await
    }
}

impl std::fmt::Display for Searchable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let query = if self.query.is_empty() {
            "no filters".to_string()
        } else {
            query_to_string(&self.query)
        };
        write!(
            f,
            "Searchable(id='{}', dataset_id='{}', query={})",
            self.searchable_id,
            self.dataset.id(),
            query
        )
    }
}
