// ABOUTME: Event cursor, fetch and dispatch engines.
// ABOUTME: Feed events become durable records, then drain through registered handlers.

mod backoff;
mod cursor;
mod dispatch;
mod error;
mod fetch;
mod record;
mod registry;
mod source;
mod workspace;

pub use backoff::{Backoff, Clock, SystemClock};
pub use cursor::{Cursor, load_cursor};
pub use dispatch::Dispatcher;
pub use error::{CursorError, DispatchError, FetchError};
pub use fetch::{Fetcher, MAX_PAGES, PAGE_CEILING};
pub use record::{COMPLETE, HANDLED, KIND, PENDING, PendingEvent, STATUS, event_record, pending_selector};
pub use registry::{FnHandler, Handler, HandlerContext, HandlerError, Registration, Registry};
pub use source::{EventSource, FetchedPage, Page, SourceError, parse_next_link};
pub use workspace::Workspace;
