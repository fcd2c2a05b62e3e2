//! # visara-core
//!
//! Core types, errors, and the VQL predicate model for the Visara SDK.
//!
//! This crate provides the wire models and query building blocks that the
//! client crate depends on.

pub mod defaults;
pub mod error;
pub mod models;
pub mod vql;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use vql::{
    query_to_string, query_to_value, IssueMode, IssueType, Predicate, SearchOperator,
    SemanticRelevance,
};
