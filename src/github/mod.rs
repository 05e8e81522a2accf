// ABOUTME: GitHub integration: event feed, build statuses and running-log comments.
// ABOUTME: Thin wrappers over the REST API; no pipeline logic lives here.

mod client;
mod error;
mod log;
mod status;

pub use client::{Author, GithubClient};
pub use error::{GithubError, Result};
pub use log::{CommentRef, CommentSink, GithubComments, RunningLog, wrap_section};
pub use status::{BuildStatus, CommitStatuses, StatusReporter};
