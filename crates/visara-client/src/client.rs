//! Authenticated HTTP client for the Visara API.
//!
//! Owns the connection pool, the token signer, and the dataset-level
//! entry points: listing, details, and dataset creation from an S3 bucket
//! or a local zip archive.

use std::path::Path;
use std::time::Duration;

use reqwest::{multipart, Client, Method, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use visara_core::defaults::{
    ENV_API_KEY, ENV_API_SECRET, ENV_BASE_URL, ENV_ENVIRONMENT, HTTP_TIMEOUT_SECS,
    PRODUCTION_BASE_URL, STAGING_BASE_URL,
};
use visara_core::{DatasetRecord, Error, Result};

use crate::auth::TokenSigner;
use crate::dataset::Dataset;

/// Deployment the client talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Production,
    Staging,
}

impl Environment {
    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Production => PRODUCTION_BASE_URL,
            Self::Staging => STAGING_BASE_URL,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Production => write!(f, "production"),
            Self::Staging => write!(f, "staging"),
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "staging" | "stage" => Ok(Self::Staging),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

/// Authenticated client for one Visara deployment.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct VisaraClient {
    http: Client,
    base_url: String,
    signer: TokenSigner,
}

impl VisaraClient {
    /// Create a client for a well-known environment.
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        environment: Environment,
    ) -> Self {
        Self::with_base_url(api_key, api_secret, environment.base_url())
    }

    /// Create a client against an explicit base URL (self-hosted or test
    /// deployments).
    pub fn with_base_url(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");
        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!(base_url = %base_url, "Initializing Visara client");
        Self {
            http,
            base_url,
            signer: TokenSigner::new(api_key, api_secret),
        }
    }

    /// Create a client from `VISARA_*` environment variables.
    ///
    /// `VISARA_API_KEY` and `VISARA_API_SECRET` are required. `VISARA_BASE_URL`
    /// overrides the environment selection; otherwise `VISARA_ENV` picks
    /// production (default) or staging.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(ENV_API_KEY)
            .map_err(|_| Error::Config(format!("{ENV_API_KEY} is not set")))?;
        let api_secret = std::env::var(ENV_API_SECRET)
            .map_err(|_| Error::Config(format!("{ENV_API_SECRET} is not set")))?;

        if let Ok(base_url) = std::env::var(ENV_BASE_URL) {
            return Ok(Self::with_base_url(api_key, api_secret, base_url));
        }

        let environment = match std::env::var(ENV_ENVIRONMENT) {
            Ok(value) => value.parse::<Environment>().map_err(Error::Config)?,
            Err(_) => Environment::default(),
        };
        Ok(Self::new(api_key, api_secret, environment))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// Start a request against an API path, with a freshly minted token.
    pub(crate) fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let token = self.signer.sign()?;
        Ok(self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .header("accept", "application/json"))
    }

    /// Pass a successful response through, or capture status and body.
    pub(crate) async fn check(response: Response) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Http { status, body })
    }

    /// Probe whether the deployment is reachable and healthy.
    pub async fn healthcheck(&self) -> Result<Value> {
        let response = self.request(Method::GET, "/healthcheck")?.send().await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    /// List every dataset visible to the caller.
    #[instrument(skip(self), fields(subsystem = "client", op = "list_datasets"))]
    pub async fn list_datasets(&self) -> Result<Vec<DatasetRecord>> {
        let start = std::time::Instant::now();
        let response = self
            .request(Method::GET, "/datasets")?
            .send()
            .await
            .map_err(|e| Error::Request(format!("Dataset listing failed: {}", e)))?;
        let response = Self::check(response).await?;
        let datasets: Vec<DatasetRecord> = response
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("Failed to parse dataset listing: {}", e)))?;
        debug!(
            result_count = datasets.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Dataset listing complete"
        );
        Ok(datasets)
    }

    /// Fetch one dataset row.
    pub async fn dataset_details(&self, dataset_id: Uuid) -> Result<DatasetRecord> {
        let response = self
            .request(Method::GET, &format!("/dataset/{dataset_id}"))?
            .send()
            .await
            .map_err(|e| Error::Request(format!("Dataset details request failed: {}", e)))?;
        let response = Self::check(response).await?;
        response
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("Failed to parse dataset details: {}", e)))
    }

    /// Open a handle to an existing dataset, validating that it exists.
    pub async fn dataset(&self, dataset_id: Uuid) -> Result<Dataset> {
        Dataset::open(self.clone(), dataset_id).await
    }

    /// Create a dataset that ingests directly from an S3 bucket.
    #[instrument(skip(self), fields(subsystem = "client", op = "create_dataset", source = "s3"))]
    pub async fn create_dataset_from_s3(
        &self,
        s3_bucket_path: &str,
        dataset_name: &str,
        pipeline_type: Option<&str>,
    ) -> Result<Dataset> {
        if s3_bucket_path.is_empty() || dataset_name.is_empty() {
            return Err(Error::InvalidInput(
                "both s3_bucket_path and dataset_name are required".to_string(),
            ));
        }

        info!(dataset_name, s3_bucket_path, "Creating dataset from S3 bucket");
        let dataset_id = self
            .create_dataset(dataset_name, s3_bucket_path, "", pipeline_type)
            .await?;
        info!(dataset_id = %dataset_id, dataset_name, "Dataset created");
        Dataset::open(self.clone(), dataset_id).await
    }

    /// Create a dataset from a local zip archive of media files.
    ///
    /// Registers the dataset, then streams the archive to the upload
    /// endpoint. Processing continues server side after this returns.
    #[instrument(
        skip(self, archive_path),
        fields(subsystem = "client", op = "create_dataset", source = "zip")
    )]
    pub async fn create_dataset_from_zip(
        &self,
        archive_path: impl AsRef<Path>,
        dataset_name: &str,
        pipeline_type: Option<&str>,
    ) -> Result<Dataset> {
        let archive_path = archive_path.as_ref();
        if dataset_name.is_empty() {
            return Err(Error::InvalidInput("dataset_name is required".to_string()));
        }
        if !archive_path.is_file() {
            return Err(Error::InvalidInput(format!(
                "archive not found: {}",
                archive_path.display()
            )));
        }
        let filename = archive_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "archive path has no usable file name: {}",
                    archive_path.display()
                ))
            })?
            .to_string();

        info!(dataset_name, filename, "Creating dataset from local archive");
        let dataset_id = self
            .create_dataset(dataset_name, "", &filename, pipeline_type)
            .await?;

        let bytes = tokio::fs::read(archive_path).await?;
        let part = multipart::Part::bytes(bytes)
            .file_name(filename)
            .mime_str("application/zip")
            .map_err(|e| Error::Request(format!("Failed to create multipart: {}", e)))?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("operations", "READ");

        let response = self
            .request(Method::POST, &format!("/dataset/{dataset_id}/upload"))?
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Request(format!("Archive upload failed: {}", e)))?;
        Self::check(response).await?;
        info!(dataset_id = %dataset_id, dataset_name, "Dataset archive uploaded");

        Dataset::open(self.clone(), dataset_id).await
    }

    /// POST the dataset registration form and pull the new id out of the
    /// response.
    async fn create_dataset(
        &self,
        dataset_name: &str,
        bucket_path: &str,
        uploaded_filename: &str,
        pipeline_type: Option<&str>,
    ) -> Result<Uuid> {
        let form = [
            ("dataset_name", dataset_name),
            ("vl_dataset_id", ""),
            ("bucket_path", bucket_path),
            ("uploaded_filename", uploaded_filename),
            ("config_url", ""),
            ("pipeline_type", pipeline_type.unwrap_or("")),
        ];
        let response = self
            .request(Method::POST, "/dataset")?
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::Request(format!("Dataset creation failed: {}", e)))?;
        let response = Self::check(response).await?;
        let body: Value = response.json().await?;
        Self::created_dataset_id(&body)
    }

    fn created_dataset_id(body: &Value) -> Result<Uuid> {
        if body.get("status").and_then(Value::as_str) == Some("error") {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(Error::Request(format!(
                "Dataset creation failed: {}",
                message
            )));
        }
        let id = body
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Request("No dataset id in creation response".to_string()))?;
        Uuid::parse_str(id)
            .map_err(|e| Error::Request(format!("Invalid dataset id in creation response: {}", e)))
    }
}
