// ABOUTME: Error types for the GitHub REST client.
// ABOUTME: Non-2xx responses keep their status and body for the running log.

#[derive(Debug, thiserror::Error)]
pub enum GithubError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid token: {0}")]
    InvalidToken(String),
}

pub type Result<T> = std::result::Result<T, GithubError>;
