// ABOUTME: Human-readable running log kept in a single GitHub comment.
// ABOUTME: Each update rewrites the whole comment; the last entry can be replaced in place.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;

use super::client::GithubClient;
use super::error::Result;

/// Where a created comment lives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommentRef {
    #[serde(rename = "url")]
    pub api_url: String,
    pub html_url: String,
}

#[async_trait]
pub trait CommentSink: Send + Sync {
    async fn create(&self, body: &str) -> Result<CommentRef>;
    async fn update(&self, comment: &CommentRef, body: &str) -> Result<()>;
}

/// Comments on a commit (`/commits/<sha>/comments`).
#[derive(Debug, Clone)]
pub struct GithubComments {
    client: Arc<GithubClient>,
    create_url: String,
}

impl GithubComments {
    pub fn for_commit(client: Arc<GithubClient>, sha: &str) -> Self {
        let create_url = format!("{}/commits/{}/comments", client.api_url(), sha);
        Self { client, create_url }
    }
}

#[derive(serde::Serialize)]
struct CommentBody<'a> {
    body: &'a str,
}

#[async_trait]
impl CommentSink for GithubComments {
    async fn create(&self, body: &str) -> Result<CommentRef> {
        self.client
            .post_json(&self.create_url, &CommentBody { body })
            .await
    }

    async fn update(&self, comment: &CommentRef, body: &str) -> Result<()> {
        self.client
            .patch_json::<serde_json::Value>(&comment.api_url, &CommentBody { body })
            .await
            .map(|_| ())
    }
}

/// Render a collapsible section. Command titles are shown as code.
pub fn wrap_section(title: &str, body: &str, is_command: bool) -> String {
    let title = if is_command {
        format!("<code>{title}</code>")
    } else {
        title.to_string()
    };
    format!("<details><summary>{title}</summary>\n\n```\n{body}\n```\n</details>")
}

/// Append-only log rendered into one comment.
///
/// Sink failures are logged and swallowed: losing a log line must not fail a deploy.
pub struct RunningLog {
    sink: Arc<dyn CommentSink>,
    comment: CommentRef,
    entries: Mutex<Vec<String>>,
}

impl std::fmt::Debug for RunningLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningLog")
            .field("comment", &self.comment)
            .field("entries", &self.entries.lock().len())
            .finish()
    }
}

impl RunningLog {
    /// Create the comment with a `## <header>` heading.
    pub async fn start(sink: Arc<dyn CommentSink>, header: &str) -> Result<Self> {
        let first = format!("## {header}\n");
        let comment = sink.create(&first).await?;
        Ok(Self {
            sink,
            comment,
            entries: Mutex::new(vec![first]),
        })
    }

    pub fn html_url(&self) -> &str {
        &self.comment.html_url
    }

    /// One-line entry.
    pub async fn note(&self, title: &str) {
        tracing::info!("{}", title);
        self.push(format!("{title}<br/>"), false).await;
    }

    /// One-line entry replacing the previous one (progress ticks).
    pub async fn progress(&self, title: &str) {
        tracing::debug!("{}", title);
        self.push(format!("{title}<br/>"), true).await;
    }

    /// Collapsible entry with a body.
    pub async fn section(&self, title: &str, body: &str) {
        tracing::info!("{}", title);
        self.push(wrap_section(title, body, false), false).await;
    }

    /// Collapsible entry for a command and its output.
    pub async fn command(&self, command: &str, output: &str, replace_last: bool) {
        self.push(wrap_section(command, output, true), replace_last).await;
    }

    /// Current rendered body.
    pub fn body(&self) -> String {
        self.entries.lock().join("\n")
    }

    async fn push(&self, entry: String, replace_last: bool) {
        let body = {
            let mut entries = self.entries.lock();
            // The header is never replaced.
            if replace_last
                && entries.len() > 1
                && let Some(last) = entries.last_mut()
            {
                *last = entry;
            } else {
                entries.push(entry);
            }
            entries.join("\n")
        };

        if let Err(e) = self.sink.update(&self.comment, &body).await {
            tracing::warn!(comment = %self.comment.api_url, "failed to update running log: {}", e);
        }
    }
}
