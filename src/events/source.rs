// ABOUTME: Paginated, conditionally-fetched event feed abstraction.
// ABOUTME: Pages come newest first; a 304 short-circuits the whole cycle.

use async_trait::async_trait;

use crate::types::Event;

/// One page of the feed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub events: Vec<Event>,
    /// Entity tag to send as `If-None-Match` next cycle.
    pub etag: Option<String>,
    /// URL of the next (older) page, from the `Link` header.
    pub next: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchedPage {
    NotModified,
    Page(Page),
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed event page: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait EventSource: Send + Sync {
    /// URL of the newest page.
    fn events_url(&self) -> String;

    /// Fetch one page, conditionally on `etag` when given.
    async fn fetch_page(&self, url: &str, etag: Option<&str>) -> Result<FetchedPage, SourceError>;
}

/// Extract the `rel="next"` target from a `Link` header.
pub fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|param| {
            let param = param.trim();
            param == r#"rel="next""# || param == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}
