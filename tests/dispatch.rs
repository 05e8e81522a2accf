// ABOUTME: Integration tests for the two-phase dispatcher.
// ABOUTME: Covers ordering, backoff, filters, failure absorption and fatal errors.

mod support;

use parking_lot::Mutex;
use quickcd::events::{
    Cursor, DispatchError, Dispatcher, FnHandler, HandlerError, Registry, Workspace, event_record,
};
use quickcd::store::{MemoryStore, Record, StateStore};
use quickcd::types::{EventId, HandlerId, ResourceNamer};
use std::sync::Arc;
use support::fakes::{ManualClock, push_event};

type Calls = Arc<Mutex<Vec<String>>>;

struct Harness {
    store: MemoryStore,
    namer: ResourceNamer,
    workspace: Workspace,
    clock: ManualClock,
    _tmp: tempfile::TempDir,
}

impl Harness {
    async fn new(cursor: u64) -> Self {
        support::init_tracing();
        let tmp = tempfile::tempdir().unwrap();
        let harness = Self {
            store: MemoryStore::new(),
            namer: ResourceNamer::new("platform", "charts"),
            workspace: Workspace::new(tmp.path().join("work")),
            clock: ManualClock::new(),
            _tmp: tmp,
        };
        let cursor = Cursor {
            event_id: EventId::new(cursor),
            etag: None,
        };
        harness.store.create(cursor.to_record(&harness.namer)).await.unwrap();
        harness
    }

    async fn save(&self, id: u64) {
        let record = event_record(&self.namer, &push_event(id, "production")).unwrap();
        self.store.create(record).await.unwrap();
    }

    async fn step(&self, registry: &Registry) -> Result<bool, DispatchError> {
        Dispatcher::new(&self.store, registry, &self.namer, &self.workspace, &self.clock)
            .process_next_pending()
            .await
    }

    async fn record(&self, id: u64) -> Record {
        self.store.get(self.namer.name(id).as_str()).await.unwrap().unwrap()
    }
}

fn recording(name: &'static str, calls: &Calls, fail: bool) -> FnHandler {
    let calls = calls.clone();
    FnHandler::new(name, move |ctx, _| {
        let calls = calls.clone();
        async move {
            calls.lock().push(format!("{}@{}", ctx.handler, ctx.event_id));
            if fail {
                Err(HandlerError::failed("exit status 1"))
            } else {
                Ok(())
            }
        }
    })
}

fn calls(calls: &Calls) -> Vec<String> {
    calls.lock().clone()
}

#[tokio::test]
async fn non_blocking_handlers_run_before_blocking_ones() {
    let h = Harness::new(10).await;
    h.save(10).await;
    let log = Calls::default();
    let mut registry = Registry::new();
    registry.register_blocking("PushEvent", recording("deploy", &log, false));
    registry.register("PushEvent", recording("announce", &log, false));

    assert!(h.step(&registry).await.unwrap());
    assert_eq!(calls(&log), vec!["announce@10"]);

    assert!(h.step(&registry).await.unwrap());
    assert_eq!(calls(&log), vec!["announce@10", "deploy@10"]);
    assert_eq!(h.record(10).await.get_label("status"), Some("handled"));

    assert!(!h.step(&registry).await.unwrap());
}

#[tokio::test]
async fn blocking_handlers_follow_event_order() {
    let h = Harness::new(12).await;
    h.save(12).await;
    h.save(11).await;
    let log = Calls::default();
    let mut registry = Registry::new();
    registry.register_blocking("PushEvent", recording("deploy", &log, false));

    while h.step(&registry).await.unwrap() {}
    assert_eq!(calls(&log), vec!["deploy@11", "deploy@12"]);
}

#[tokio::test]
async fn failing_blocking_handler_holds_back_later_events() {
    let h = Harness::new(11).await;
    h.save(10).await;
    h.save(11).await;
    let log = Calls::default();
    let mut registry = Registry::new();
    registry.register_blocking("PushEvent", recording("deploy", &log, true));
    registry.register_blocking("PushEvent", recording("verify", &log, false));

    assert!(h.step(&registry).await.unwrap());
    assert_eq!(calls(&log), vec!["deploy@10"]);

    // Gate closed for one minute; nothing else may run meanwhile.
    assert!(!h.step(&registry).await.unwrap());
    assert_eq!(calls(&log), vec!["deploy@10"]);
    assert_eq!(h.record(11).await.get_label("status"), Some("pending"));
}

#[tokio::test]
async fn failing_non_blocking_handler_does_not_stop_its_siblings() {
    let h = Harness::new(10).await;
    h.save(10).await;
    let log = Calls::default();
    let mut registry = Registry::new();
    registry.register("PushEvent", recording("announce", &log, true));
    registry.register("PushEvent", recording("audit", &log, false));

    assert!(h.step(&registry).await.unwrap());
    assert_eq!(calls(&log), vec!["announce@10", "audit@10"]);

    let record = h.record(10).await;
    let announce = HandlerId::from_name("announce");
    assert_eq!(record.get_label(announce.as_str()), None);
    assert_eq!(record.get_label(&announce.attempts_label()), Some("1"));
    assert_eq!(
        record.get_label(HandlerId::from_name("audit").as_str()),
        Some("complete")
    );
    assert_eq!(record.get_label("status"), Some("pending"));
}

#[tokio::test]
async fn backoff_is_cubic_in_minutes() {
    let h = Harness::new(10).await;
    h.save(10).await;
    let log = Calls::default();
    let mut registry = Registry::new();
    registry.register_blocking("PushEvent", recording("deploy", &log, true));
    let attempts = HandlerId::from_name("deploy").attempts_label();

    assert!(h.step(&registry).await.unwrap());
    assert_eq!(h.record(10).await.get_label(&attempts), Some("1"));

    h.clock.advance_minutes(1);
    assert!(h.step(&registry).await.unwrap());
    assert_eq!(h.record(10).await.get_label(&attempts), Some("2"));

    // attempts=2 means 8 minutes.
    h.clock.advance_minutes(7);
    assert!(!h.step(&registry).await.unwrap());
    h.clock.advance_minutes(2);
    assert!(h.step(&registry).await.unwrap());
    assert_eq!(h.record(10).await.get_label(&attempts), Some("3"));
    assert_eq!(calls(&log).len(), 3);
}

#[tokio::test]
async fn handler_whose_filter_never_matches_does_not_block_handled() {
    let h = Harness::new(42).await;
    h.save(42).await;
    let log = Calls::default();
    let mut registry = Registry::new();
    registry.register("PushEvent", recording("never", &log, false).filter(|_| Some(false)));
    registry.register("PushEvent", recording("broken-filter", &log, false).filter(|_| None));
    registry.register_blocking("PushEvent", recording("deploy", &log, false));

    while h.step(&registry).await.unwrap() {}

    assert_eq!(calls(&log), vec!["deploy@42"]);
    let record = h.record(42).await;
    assert_eq!(record.get_label("status"), Some("handled"));
    assert_eq!(
        record.get_label(HandlerId::from_name("never").as_str()),
        None
    );
}

#[tokio::test]
async fn panicking_handler_counts_as_failure() {
    let h = Harness::new(10).await;
    h.save(10).await;
    let mut registry = Registry::new();
    registry.register_blocking(
        "PushEvent",
        FnHandler::new("explode", |_, _| async {
            let nothing: Option<()> = None;
            nothing.expect("kaboom");
            Ok(())
        }),
    );

    assert!(h.step(&registry).await.unwrap());
    let record = h.record(10).await;
    let id = HandlerId::from_name("explode");
    assert_eq!(record.get_label(&id.attempts_label()), Some("1"));
    assert_eq!(record.get_label(id.as_str()), None);
    assert_eq!(record.get_label("status"), Some("pending"));
}

#[tokio::test]
async fn fatal_handler_error_stops_dispatch() {
    let h = Harness::new(10).await;
    h.save(10).await;
    let mut registry = Registry::new();
    registry.register_blocking(
        "PushEvent",
        FnHandler::new("deploy", |_, _| async {
            Err(HandlerError::fatal("tried to roll back api which had status READY"))
        }),
    );

    let err = h.step(&registry).await.unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, DispatchError::Fatal { event_id, .. } if event_id == EventId::new(10)));
}

#[tokio::test]
async fn events_past_the_cursor_wait() {
    let h = Harness::new(10).await;
    h.save(11).await;
    let log = Calls::default();
    let mut registry = Registry::new();
    registry.register_blocking("PushEvent", recording("deploy", &log, false));

    assert!(!h.step(&registry).await.unwrap());
    assert!(calls(&log).is_empty());
}

#[tokio::test]
async fn nothing_to_do_without_cursor() {
    let store = MemoryStore::new();
    let namer = ResourceNamer::new("platform", "charts");
    let tmp = tempfile::tempdir().unwrap();
    let workspace = Workspace::new(tmp.path());
    let clock = ManualClock::new();
    let registry = Registry::new();

    let dispatcher = Dispatcher::new(&store, &registry, &namer, &workspace, &clock);
    assert!(!dispatcher.process_next_pending().await.unwrap());
}

#[tokio::test]
async fn each_handler_gets_an_empty_workdir() {
    let h = Harness::new(10).await;
    h.save(10).await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut registry = Registry::new();
    for name in ["first", "second"] {
        let seen = seen.clone();
        registry.register(
            "PushEvent",
            FnHandler::new(name, move |ctx, _| {
                let seen = seen.clone();
                async move {
                    let entries = std::fs::read_dir(&ctx.workdir).unwrap().count();
                    seen.lock().push(entries);
                    std::fs::write(ctx.workdir.join("checkout"), "x").unwrap();
                    Ok(())
                }
            }),
        );
    }

    while h.step(&registry).await.unwrap() {}
    assert_eq!(*seen.lock(), vec![0, 0]);
}
