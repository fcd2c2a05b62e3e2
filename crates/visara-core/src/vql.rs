//! VQL predicate model and wire serialization.
//!
//! VQL (Visara Query Language) is the JSON filter array accepted by the
//! export endpoints. A query is a list of predicates that must all hold.
//! Fan-out across several values of one field is expressed inside a single
//! predicate (`one_of`) or by merging per-value queries client side.

use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use uuid::Uuid;

// =============================================================================
// OPERATORS AND ENUMS
// =============================================================================

/// Match operator applied to a search field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchOperator {
    Is,
    IsNot,
    IsOneOf,
    IsNotOneOf,
}

impl SearchOperator {
    /// Wire spelling used inside VQL predicates.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Is => "is",
            Self::IsNot => "is_not",
            Self::IsOneOf => "one_of",
            Self::IsNotOneOf => "not_one_of",
        }
    }
}

impl std::fmt::Display for SearchOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Quality issue categories detected by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueType {
    Mislabels,
    Outliers,
    Duplicates,
    Blur,
    Dark,
    Bright,
    Normal,
    LabelOutlier,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mislabels => "mislabels",
            Self::Outliers => "outliers",
            Self::Duplicates => "duplicates",
            Self::Blur => "blur",
            Self::Dark => "dark",
            Self::Bright => "bright",
            Self::Normal => "normal",
            Self::LabelOutlier => "label_outlier",
        }
    }
}

impl std::fmt::Display for IssueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Relevance bands for semantic search.
///
/// Stricter relevance maps to a lower wire threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SemanticRelevance {
    Low,
    #[default]
    Medium,
    High,
}

impl SemanticRelevance {
    /// Wire threshold carried by the semantic predicate.
    pub fn threshold(&self) -> f64 {
        match self {
            Self::Low => 0.9,
            Self::Medium => 0.8,
            Self::High => 0.7,
        }
    }
}

/// Whether an issue predicate keeps or removes matching media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueMode {
    In,
    Out,
}

impl IssueMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

// =============================================================================
// PREDICATES
// =============================================================================

/// A single VQL filter.
///
/// Serializes to the exact JSON object the export endpoints expect; see
/// [`Predicate::to_value`] for the shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Label filter with a caller-chosen operator.
    Labels {
        op: SearchOperator,
        values: Vec<String>,
    },
    /// Full-text caption match for one term.
    Caption { text: String },
    /// Semantic text match. `id` is minted once at construction so a
    /// predicate keeps its identity when a query is cloned or re-sent.
    Semantic { id: Uuid, text: String, threshold: f64 },
    /// Quality issue filter for one issue type.
    Issue {
        issue_type: IssueType,
        confidence_min: f64,
        confidence_max: f64,
        mode: IssueMode,
    },
    /// Visual similarity against a previously uploaded anchor image.
    Similarity {
        anchor_media_id: String,
        threshold: f64,
    },
}

impl Predicate {
    pub fn labels(op: SearchOperator, values: Vec<String>) -> Self {
        Self::Labels { op, values }
    }

    pub fn caption(text: impl Into<String>) -> Self {
        Self::Caption { text: text.into() }
    }

    pub fn semantic(text: impl Into<String>, threshold: f64) -> Self {
        Self::Semantic {
            id: Uuid::new_v4(),
            text: text.into(),
            threshold,
        }
    }

    pub fn issue(
        issue_type: IssueType,
        confidence_min: f64,
        confidence_max: f64,
        mode: IssueMode,
    ) -> Self {
        Self::Issue {
            issue_type,
            confidence_min,
            confidence_max,
            mode,
        }
    }

    pub fn similarity(anchor_media_id: impl Into<String>, threshold: f64) -> Self {
        Self::Similarity {
            anchor_media_id: anchor_media_id.into(),
            threshold,
        }
    }

    /// Render the predicate as its wire JSON object.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Labels { op, values } => json!({
                "id": "label_filter",
                "labels": {
                    "op": op.as_str(),
                    "value": values,
                },
            }),
            Self::Caption { text } => json!({
                "text": {
                    "op": "fts",
                    "value": text,
                },
            }),
            Self::Semantic {
                id,
                text,
                threshold,
            } => json!({
                "id": id.to_string(),
                "text": {
                    "op": "semantic",
                    "value": text,
                    "threshold": threshold,
                },
            }),
            Self::Issue {
                issue_type,
                confidence_min,
                confidence_max,
                mode,
            } => json!({
                "issues": {
                    "op": "issue",
                    "value": issue_type.as_str(),
                    "confidence_min": confidence_min,
                    "confidence_max": confidence_max,
                    "mode": mode.as_str(),
                },
            }),
            Self::Similarity {
                anchor_media_id,
                threshold,
            } => json!({
                "id": "similarity_search",
                "similarity": {
                    "op": "upload",
                    "value": anchor_media_id,
                    "threshold": threshold,
                },
            }),
        }
    }
}

impl Serialize for Predicate {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_value().serialize(serializer)
    }
}

/// Render a whole query as a JSON array value.
pub fn query_to_value(query: &[Predicate]) -> Value {
    Value::Array(query.iter().map(Predicate::to_value).collect())
}

/// Render a whole query as the string carried in the `vql` query parameter.
pub fn query_to_string(query: &[Predicate]) -> String {
    query_to_value(query).to_string()
}
