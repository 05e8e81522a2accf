// ABOUTME: Integration tests for the fetch cycle against an in-memory feed and store.
// ABOUTME: Covers first run, idempotence, pagination and cursor monotonicity.

mod support;

use proptest::prelude::*;
use quickcd::events::{
    Cursor, FetchError, Fetcher, FnHandler, KIND, Registry, event_record, load_cursor,
};
use quickcd::store::{MemoryStore, Record, StateStore};
use quickcd::types::{EventId, ResourceNamer};
use support::fakes::{FakeFeed, event, push_event};

fn namer() -> ResourceNamer {
    ResourceNamer::new("platform", "charts")
}

fn registry() -> Registry {
    let mut registry = Registry::new();
    registry.register_blocking("PushEvent", FnHandler::new("deploy", |_, _| async { Ok(()) }));
    registry
}

fn event_records(store: &MemoryStore) -> Vec<Record> {
    store
        .snapshot()
        .into_iter()
        .filter(|r| r.get_label("kind") == Some(KIND))
        .collect()
}

async fn cursor(store: &MemoryStore) -> Cursor {
    load_cursor(store, &namer()).await.unwrap().unwrap()
}

async fn fetch(store: &MemoryStore, feed: &FakeFeed, registry: &Registry) -> Result<bool, FetchError> {
    let namer = namer();
    Fetcher::new(store, feed, registry, &namer).fetch_and_persist().await
}

#[tokio::test]
async fn first_run_records_high_water_mark_only() {
    support::init_tracing();
    let store = MemoryStore::new();
    let feed = FakeFeed::new(30);
    feed.publish([push_event(50, "production"), push_event(49, "production"), push_event(48, "production")]);

    assert!(fetch(&store, &feed, &registry()).await.unwrap());

    assert_eq!(cursor(&store).await.event_id, EventId::new(50));
    assert!(event_records(&store).is_empty());
    assert_eq!(feed.requests(), vec![("mem://events?page=1".to_string(), None)]);
}

#[tokio::test]
async fn first_run_only_reads_one_page() {
    let store = MemoryStore::new();
    let feed = FakeFeed::new(2);
    feed.publish((1..=6).map(|id| push_event(id, "production")));

    fetch(&store, &feed, &registry()).await.unwrap();

    assert_eq!(feed.requests().len(), 1);
    assert_eq!(cursor(&store).await.event_id, EventId::new(6));
}

#[tokio::test]
async fn persists_only_new_interesting_events() {
    let store = MemoryStore::new();
    let feed = FakeFeed::new(30);
    feed.publish([push_event(50, "production")]);
    fetch(&store, &feed, &registry()).await.unwrap();

    feed.publish([push_event(51, "production"), event(52, "WatchEvent")]);
    assert!(fetch(&store, &feed, &registry()).await.unwrap());

    let records = event_records(&store);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "quickcd-platform-charts-51");
    assert_eq!(records[0].get_label("status"), Some("pending"));
    assert_eq!(cursor(&store).await.event_id, EventId::new(52));
}

#[tokio::test]
async fn repeated_cycle_without_new_events_changes_nothing() {
    let store = MemoryStore::new();
    let feed = FakeFeed::new(30);
    feed.publish([push_event(50, "production")]);
    fetch(&store, &feed, &registry()).await.unwrap();
    feed.publish([push_event(51, "production")]);
    fetch(&store, &feed, &registry()).await.unwrap();

    let before = store.snapshot();
    assert!(!fetch(&store, &feed, &registry()).await.unwrap());
    assert_eq!(store.snapshot(), before);

    // Only the first request of a later cycle is conditional.
    let (_, etag) = feed.requests().last().cloned().unwrap();
    assert_eq!(etag.as_deref(), Some("\"51\""));
}

#[tokio::test]
async fn existing_record_is_not_reset() {
    let store = MemoryStore::new();
    let feed = FakeFeed::new(30);
    let namer = namer();
    feed.publish([push_event(50, "production")]);
    fetch(&store, &feed, &registry()).await.unwrap();

    // A previous cycle saved event 51 and its handler already ran once,
    // but the cursor update was lost.
    let late = push_event(51, "production");
    store.create(event_record(&namer, &late).unwrap()).await.unwrap();
    let name = namer.name(51);
    store
        .label(name.as_str(), &[("handler-0000_attempts".to_string(), "1".to_string())])
        .await
        .unwrap();

    feed.publish([late]);
    fetch(&store, &feed, &registry()).await.unwrap();

    let records = event_records(&store);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get_label("handler-0000_attempts"), Some("1"));
    assert_eq!(cursor(&store).await.event_id, EventId::new(51));
}

#[tokio::test]
async fn walks_pages_until_a_seen_event() {
    let store = MemoryStore::new();
    let feed = FakeFeed::new(2);
    feed.publish([push_event(50, "production")]);
    fetch(&store, &feed, &registry()).await.unwrap();

    feed.publish((51..=56).map(|id| push_event(id, "production")));
    fetch(&store, &feed, &registry()).await.unwrap();

    assert_eq!(event_records(&store).len(), 6);
    assert_eq!(cursor(&store).await.event_id, EventId::new(56));

    let requests: Vec<_> = feed.requests().into_iter().skip(1).collect();
    assert_eq!(requests.len(), 4);
    assert!(requests[0].1.is_some());
    assert!(requests[1..].iter().all(|(_, etag)| etag.is_none()));
}

#[tokio::test]
async fn runaway_pagination_is_an_error_and_keeps_cursor() {
    let store = MemoryStore::new();
    let feed = FakeFeed::new(1);
    feed.publish([push_event(1, "production")]);
    fetch(&store, &feed, &registry()).await.unwrap();

    feed.publish((2..=40).map(|id| push_event(id, "production")));
    let err = fetch(&store, &feed, &registry()).await.unwrap_err();

    assert!(matches!(err, FetchError::PageCeiling { .. }));
    assert_eq!(cursor(&store).await.event_id, EventId::new(1));
    assert!(event_records(&store).is_empty());
}

#[tokio::test]
async fn etag_comes_from_first_page() {
    let store = MemoryStore::new();
    let feed = FakeFeed::new(30);
    feed.publish([push_event(7, "production")]);
    fetch(&store, &feed, &registry()).await.unwrap();
    assert_eq!(cursor(&store).await.etag.as_deref(), Some("\"7\""));
}

proptest! {
    #[test]
    fn cursor_never_moves_backwards(batches in prop::collection::vec(prop::collection::vec(1u64..200, 0..6), 1..6)) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let store = MemoryStore::new();
            let feed = FakeFeed::new(3);
            let registry = registry();
            let mut last = EventId::ZERO;
            for batch in batches {
                feed.publish(batch.into_iter().map(|id| push_event(id, "production")));
                if fetch(&store, &feed, &registry).await.is_ok()
                    && let Some(c) = load_cursor(&store, &namer()).await.unwrap()
                {
                    assert!(c.event_id >= last);
                    last = c.event_id;
                }
            }
        });
    }
}
