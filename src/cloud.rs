//! RWX cloud API client.
//!
//! Thin JSON-over-HTTP client for run status and run listings. Every request
//! carries a bearer token read from the session-owned [`AccessToken`] slot;
//! a missing token is surfaced as an API error so the tool layer can elicit
//! one from the user.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::config::AccessToken;
use crate::{AppError, Result};

/// Coarse run outcome as reported by the cloud API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Execution has not finished.
    Running,
    /// Finished and succeeded.
    Success,
    /// Finished and failed.
    Failure,
    /// Finished with an unrecognized result.
    Unknown,
}

impl RunOutcome {
    /// Stable string form used in tool responses.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Unknown => "unknown",
        }
    }
}

/// Completion summary for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStatusSummary {
    /// Coarse outcome.
    pub outcome: RunOutcome,
    /// Whether execution has finished.
    pub is_complete: bool,
}

/// One entry from the runs listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RunListItem {
    /// Run identifier.
    pub id: String,
    /// Branch the run was triggered for, when known.
    #[serde(default)]
    pub branch: Option<String>,
    /// Commit SHA, when known.
    #[serde(default)]
    pub commit_sha: Option<String>,
    /// Result status string (e.g. `succeeded`, `failed`).
    #[serde(default)]
    pub result_status: Option<String>,
    /// Execution status string (e.g. `finished`, `in_progress`).
    #[serde(default)]
    pub execution_status: String,
    /// Run title.
    #[serde(default)]
    pub title: String,
    /// Workflow definition path the run was launched from.
    #[serde(default)]
    pub definition_path: String,
}

#[derive(Debug, Deserialize)]
struct RunsListResponse {
    #[serde(default)]
    runs: Vec<RunListItem>,
}

#[derive(Debug, Deserialize)]
struct RunStatusBlock {
    #[serde(default)]
    execution: String,
    #[serde(default)]
    result: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
    run_status: RunStatusBlock,
}

/// RWX cloud API client.
#[derive(Debug, Clone)]
pub struct CloudClient {
    http: reqwest::Client,
    base_url: String,
    token: AccessToken,
}

impl CloudClient {
    /// Create a client for `base_url` using `token` for bearer auth.
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: AccessToken) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token,
        }
    }

    /// Fetch the completion status of one run.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Api` when no token is configured, the request
    /// fails, or the API answers non-2xx (the status code is included in
    /// the message so 401s can be recognized upstream).
    pub async fn fetch_run_status(&self, run_id: &str) -> Result<RunStatusSummary> {
        let body: RunResponse = self.get_json(&format!("runs/{run_id}")).await?;

        let is_complete = body.completed_at.is_some() || body.run_status.execution == "finished";

        let outcome = match body
            .run_status
            .result
            .as_deref()
            .map(str::to_lowercase)
            .as_deref()
        {
            Some("succeeded") => RunOutcome::Success,
            Some("failed") => RunOutcome::Failure,
            _ if !is_complete => RunOutcome::Running,
            other => {
                warn!(result = ?other, run_id, "unrecognized run result status");
                RunOutcome::Unknown
            }
        };

        Ok(RunStatusSummary {
            outcome,
            is_complete,
        })
    }

    /// List recent runs, newest first, up to `limit` entries.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Api` on missing token, transport failure, or a
    /// non-2xx response.
    pub async fn list_runs(&self, limit: u32) -> Result<Vec<RunListItem>> {
        let body: RunsListResponse = self.get_json(&format!("runs?limit={limit}")).await?;
        Ok(body.runs)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let token = self
            .token
            .get()
            .await
            .ok_or_else(|| AppError::Api("RWX access token not configured".into()))?;

        let url = format!("{}/{path}", self.base_url);
        let response = self.http.get(&url).bearer_auth(token).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Api(format!(
                "API request failed: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            )));
        }

        Ok(response.json().await?)
    }
}
