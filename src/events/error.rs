// ABOUTME: Error types for the fetch and dispatch engines.
// ABOUTME: Fetch errors abort a cycle; dispatch only surfaces store trouble and fatal handlers.

use crate::store::StoreError;
use crate::types::EventId;

use super::source::SourceError;

#[derive(Debug, thiserror::Error)]
pub enum CursorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("malformed cursor {name}: {reason}")]
    Malformed { name: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Cursor(#[from] CursorError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("event source: {0}")]
    Source(#[from] SourceError),

    #[error("pagination ran past {pages} pages; the feed serves far fewer")]
    PageCeiling { pages: usize },

    #[error("failed to serialize event: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Cursor(#[from] CursorError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to reset workspace: {0}")]
    Workspace(#[from] std::io::Error),

    #[error("handler {handler} hit a fatal error on event {event_id}: {message}")]
    Fatal {
        handler: String,
        event_id: EventId,
        message: String,
    },
}

impl DispatchError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, DispatchError::Fatal { .. })
    }
}
