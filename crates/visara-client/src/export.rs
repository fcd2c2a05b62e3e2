//! Export task submission and status polling.
//!
//! VQL searches run as asynchronous export jobs on the server: submit once,
//! then poll the status endpoint until the task completes, is rejected, or
//! the deadline passes. The poller never turns a terminal task state into
//! an error; callers get a typed [`ExportOutcome`] and decide what an
//! unfinished export means for them.

use std::time::{Duration, Instant};

use reqwest::Method;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use visara_core::defaults::{
    ENV_EXPORT_TIMEOUT_SECS, ENV_POLL_INTERVAL_SECS, EXPORT_TIMEOUT_SECS, POLL_INTERVAL_SECS,
};
use visara_core::{query_to_string, EntityType, ExportTask, Predicate, Result};

use crate::client::VisaraClient;

/// Polling cadence and deadline for export tasks.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between status polls.
    pub poll_interval: Duration,
    /// Overall deadline for the task to complete.
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(POLL_INTERVAL_SECS),
            timeout: Duration::from_secs(EXPORT_TIMEOUT_SECS),
        }
    }
}

impl PollConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `VISARA_POLL_INTERVAL_SECS` | `10` | Delay between status polls |
    /// | `VISARA_EXPORT_TIMEOUT_SECS` | `300` | Export completion deadline |
    pub fn from_env() -> Self {
        let poll_interval = std::env::var(ENV_POLL_INTERVAL_SECS)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(POLL_INTERVAL_SECS);
        let timeout = std::env::var(ENV_EXPORT_TIMEOUT_SECS)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(EXPORT_TIMEOUT_SECS);
        Self {
            poll_interval: Duration::from_secs(poll_interval),
            timeout: Duration::from_secs(timeout),
        }
    }

    /// Set the delay between status polls.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the overall completion deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Terminal state of one export run.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    /// The task finished and published a download location.
    Completed {
        task_id: Option<String>,
        download_uri: String,
    },
    /// The server refused the task, usually because nothing matched.
    Rejected { reason: Option<String> },
    /// The deadline passed before the task completed.
    TimedOut { last_status: Option<String> },
}

/// Submit a VQL export and poll it to a terminal state.
#[instrument(
    skip(client, query, config),
    fields(
        subsystem = "export",
        dataset_id = %dataset_id,
        entity_type = %entity_type,
        predicate_count = query.len(),
    )
)]
pub(crate) async fn run(
    client: &VisaraClient,
    dataset_id: Uuid,
    query: &[Predicate],
    entity_type: EntityType,
    config: &PollConfig,
) -> Result<ExportOutcome> {
    let submitted = submit(client, dataset_id, query, entity_type).await?;
    info!(
        task_id = submitted.id.as_deref().unwrap_or(""),
        status = submitted.status.as_deref().unwrap_or(""),
        "Export task created"
    );

    // A refusal shows up as REJECTED or as a response with no status at
    // all. Either way there is nothing to poll.
    if submitted.status.is_none() || submitted.is_rejected() {
        return Ok(ExportOutcome::Rejected {
            reason: submitted.result_message,
        });
    }

    // Polls reuse the id from the submission; status responses are not
    // required to echo it back.
    let task_id = submitted.id.clone();
    let started = Instant::now();
    let mut current = submitted;

    loop {
        if current.is_completed() {
            if let Some(download_uri) = current.download_uri.clone() {
                info!(
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Export task completed"
                );
                return Ok(ExportOutcome::Completed {
                    task_id,
                    download_uri,
                });
            }
        }
        if started.elapsed() >= config.timeout {
            warn!(
                timeout_secs = config.timeout.as_secs(),
                last_status = current.status.as_deref().unwrap_or("unknown"),
                "Export task did not complete before the deadline"
            );
            return Ok(ExportOutcome::TimedOut {
                last_status: current.status,
            });
        }

        debug!(
            status = current.status.as_deref().unwrap_or("unknown"),
            "Export not ready; waiting before next poll"
        );
        sleep(config.poll_interval).await;
        current = poll_status(client, dataset_id, task_id.as_deref().unwrap_or("")).await?;

        if current.is_rejected() {
            return Ok(ExportOutcome::Rejected {
                reason: current.result_message,
            });
        }
    }
}

async fn submit(
    client: &VisaraClient,
    dataset_id: Uuid,
    query: &[Predicate],
    entity_type: EntityType,
) -> Result<ExportTask> {
    let vql = query_to_string(query);
    debug!(vql = %vql, "Submitting export task");
    let response = client
        .request(Method::GET, &format!("/dataset/{dataset_id}/export_context_async"))?
        .query(&[
            ("export_format", "json"),
            ("include_images", "false"),
            ("entity_type", entity_type.as_str()),
            ("vql", vql.as_str()),
        ])
        .send()
        .await?;
    let response = VisaraClient::check(response).await?;
    Ok(response.json().await?)
}

async fn poll_status(
    client: &VisaraClient,
    dataset_id: Uuid,
    task_id: &str,
) -> Result<ExportTask> {
    let response = client
        .request(Method::GET, &format!("/dataset/{dataset_id}/export_status"))?
        .query(&[
            ("export_task_id", task_id),
            ("dataset_id", &dataset_id.to_string()),
        ])
        .send()
        .await?;
    let response = VisaraClient::check(response).await?;
    Ok(response.json().await?)
}
