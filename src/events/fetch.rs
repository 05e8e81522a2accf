// ABOUTME: Reconciles the durable cursor with the event feed and persists events of interest.
// ABOUTME: The first run only records a high-water mark; history is never replayed.

use std::collections::BTreeMap;

use crate::store::StateStore;
use crate::types::{Event, EventId, ResourceNamer};

use super::cursor::{Cursor, load_cursor};
use super::error::FetchError;
use super::record::event_record;
use super::registry::Registry;
use super::source::{EventSource, FetchedPage};

/// Most pages walked in one cycle.
pub const MAX_PAGES: usize = 15;

/// The feed serves at most this many pages; walking past it means pagination is broken.
pub const PAGE_CEILING: usize = 10;

pub struct Fetcher<'a> {
    store: &'a dyn StateStore,
    source: &'a dyn EventSource,
    registry: &'a Registry,
    namer: &'a ResourceNamer,
}

impl<'a> Fetcher<'a> {
    pub fn new(
        store: &'a dyn StateStore,
        source: &'a dyn EventSource,
        registry: &'a Registry,
        namer: &'a ResourceNamer,
    ) -> Self {
        Self {
            store,
            source,
            registry,
            namer,
        }
    }

    /// Run one fetch cycle. Returns whether any durable state changed.
    ///
    /// On error the cursor is left untouched, so the next cycle starts from the
    /// same place. Event records are keyed by id, so repeating is harmless.
    pub async fn fetch_and_persist(&self) -> Result<bool, FetchError> {
        let stored = load_cursor(self.store, self.namer).await?;
        let first_run = stored.is_none();
        let previous = stored.unwrap_or_default();
        if first_run {
            tracing::info!("no event cursor found, assuming first run");
        }

        let mut url = self.source.events_url();
        let mut etag = previous.etag.clone();
        let mut fresh: Vec<Event> = Vec::new();

        for page_index in 0..MAX_PAGES {
            if page_index > PAGE_CEILING {
                return Err(FetchError::PageCeiling { pages: page_index });
            }

            let if_none_match = if page_index == 0 && !first_run {
                previous.etag.as_deref()
            } else {
                None
            };

            let page = match self.source.fetch_page(&url, if_none_match).await? {
                FetchedPage::NotModified => {
                    tracing::debug!("event feed not modified");
                    return Ok(false);
                }
                FetchedPage::Page(page) => page,
            };
            tracing::debug!(page = page_index + 1, events = page.events.len(), "processing page");

            if page_index == 0 && page.etag.is_some() {
                etag = page.etag.clone();
            }

            let raw = page.events.len();
            let unseen: Vec<Event> = page
                .events
                .into_iter()
                .filter(|e| e.id > previous.event_id)
                .collect();
            let reached_seen = unseen.len() != raw;
            fresh.extend(unseen);

            if reached_seen || first_run {
                break;
            }
            match page.next {
                Some(next) => url = next,
                None => break,
            }
        }

        let high_water = fresh
            .iter()
            .map(|e| e.id)
            .max()
            .map_or(previous.event_id, |id| id.max(previous.event_id));
        let next = Cursor {
            event_id: high_water,
            etag,
        };

        if first_run {
            // Strict create: never clobber a cursor that exists but failed to load.
            self.store.create(next.to_record(self.namer)).await?;
            tracing::info!(event_id = %next.event_id, "event cursor initialised");
            return Ok(true);
        }

        if fresh.is_empty() {
            tracing::debug!("no unseen events");
        }

        let interesting: BTreeMap<EventId, Event> = fresh
            .into_iter()
            .filter(|e| self.registry.is_interesting(e))
            .map(|e| (e.id, e))
            .collect();

        let mut created = 0;
        for event in interesting.values() {
            let record = event_record(self.namer, event)?;
            if self.store.create_if_absent(record).await? {
                tracing::info!(event_id = %event.id, event_type = %event.event_type, "saved event");
                created += 1;
            }
        }

        let cursor_moved = next != previous;
        if cursor_moved {
            self.store.apply(next.to_record(self.namer)).await?;
            tracing::debug!(
                from = %previous.event_id,
                to = %next.event_id,
                "event cursor advanced"
            );
        }

        Ok(created > 0 || cursor_moved)
    }
}
