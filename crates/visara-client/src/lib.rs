//! # visara-client
//!
//! Typed HTTP client for the Visara visual-dataset platform.
//!
//! This crate provides:
//! - JWT-authenticated request signing
//! - Dataset CRUD: listing, details, creation from S3 or a local archive
//! - Full-dataset export and async VQL search with status polling
//! - A fluent, cached query builder ([`Searchable`])
//!
//! # Example
//!
//! ```rust,no_run
//! use visara_client::VisaraClient;
//! use visara_core::SearchOperator;
//!
//! #[tokio::main]
//! async fn main() -> visara_core::Result<()> {
//!     let client = VisaraClient::from_env()?;
//!     let dataset = client.dataset("bc41491e-78ae-11ef-ba4b-8a774758b536".parse().unwrap()).await?;
//!     let results = dataset
//!         .searchable()
//!         .search_by_labels(&["cat".to_string()], SearchOperator::IsOneOf)
//!         .await?
//!         .get_results()
//!         .await?;
//!     println!("{} matching images", results.len());
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod dataset;
pub mod export;
pub mod materialize;
pub mod searchable;

pub use client::{Environment, VisaraClient};
pub use dataset::Dataset;
pub use export::{ExportOutcome, PollConfig};
pub use materialize::DownloadPayload;
pub use searchable::Searchable;
