// ABOUTME: Commit build statuses reported under the cluster's context name.
// ABOUTME: Reporting is best effort; failures are logged and never raised.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use super::client::GithubClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Pending,
    Success,
    Failure,
    Error,
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildStatus::Pending => "pending",
            BuildStatus::Success => "success",
            BuildStatus::Failure => "failure",
            BuildStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[async_trait]
pub trait StatusReporter: Send + Sync {
    async fn set_status(&self, sha: &str, status: BuildStatus, description: &str, target_url: &str);
}

/// Posts statuses to `/statuses/<sha>` with a fixed context.
#[derive(Debug, Clone)]
pub struct CommitStatuses {
    client: Arc<GithubClient>,
    context: String,
}

impl CommitStatuses {
    pub fn new(client: Arc<GithubClient>, context: impl Into<String>) -> Self {
        Self {
            client,
            context: context.into(),
        }
    }
}

#[derive(Serialize)]
struct StatusBody<'a> {
    state: BuildStatus,
    description: &'a str,
    context: &'a str,
    target_url: &'a str,
}

#[async_trait]
impl StatusReporter for CommitStatuses {
    async fn set_status(&self, sha: &str, status: BuildStatus, description: &str, target_url: &str) {
        let url = format!("{}/statuses/{}", self.client.api_url(), sha);
        let body = StatusBody {
            state: status,
            description,
            context: &self.context,
            target_url,
        };
        match self.client.post_json::<serde_json::Value>(&url, &body).await {
            Ok(_) => tracing::info!(sha, %status, description, "commit status set"),
            Err(e) => tracing::warn!(sha, %status, "failed to set commit status: {}", e),
        }
    }
}
