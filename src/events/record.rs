// ABOUTME: Persisted event records: one store object per retained event.
// ABOUTME: Labels track pending/handled status and per-handler completion.

use crate::store::{Record, Selector};
use crate::types::{Event, OWNER, ResourceNamer};

pub const KIND: &str = "GitHubEvent";
pub const STATUS: &str = "status";
pub const PENDING: &str = "pending";
pub const HANDLED: &str = "handled";
pub const COMPLETE: &str = "complete";

const EVENT_KEY: &str = "event";

/// Build the record for a newly observed event of interest.
pub fn event_record(namer: &ResourceNamer, event: &Event) -> serde_json::Result<Record> {
    Ok(Record::new(&namer.name(event.id))
        .label("owner", OWNER)
        .label("kind", KIND)
        .label("org", namer.org())
        .label("repo", namer.repo())
        .label(STATUS, PENDING)
        .data(EVENT_KEY, serde_json::to_string(event)?))
}

/// Selects this repo's records that still have handlers to run.
pub fn pending_selector(namer: &ResourceNamer) -> Selector {
    Selector::new()
        .eq("owner", OWNER)
        .eq("kind", KIND)
        .eq("org", namer.org())
        .eq("repo", namer.repo())
        .eq(STATUS, PENDING)
}

/// A pending record together with its decoded event.
#[derive(Debug, Clone)]
pub struct PendingEvent {
    pub record: Record,
    pub event: Event,
}

impl PendingEvent {
    pub fn decode(record: Record) -> Result<Self, (Record, String)> {
        let Some(raw) = record.get_data(EVENT_KEY) else {
            return Err((record, format!("missing {EVENT_KEY} data")));
        };
        match serde_json::from_str(raw) {
            Ok(event) => Ok(Self { record, event }),
            Err(e) => Err((record, e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_carries_labels_and_event() {
        let namer = ResourceNamer::new("acme", "charts");
        let event = Event::new(42, "PushEvent", json!({"ref": "refs/heads/staging"}));
        let record = event_record(&namer, &event).unwrap();

        assert_eq!(record.name, "quickcd-acme-charts-42");
        assert!(pending_selector(&namer).matches(&record.labels));

        let decoded = PendingEvent::decode(record).unwrap();
        assert_eq!(decoded.event, event);
    }

    #[test]
    fn undecodable_record_is_returned() {
        let namer = ResourceNamer::new("o", "r");
        let record = Record::new(&namer.name(1)).data("event", "{not json");
        let (returned, reason) = PendingEvent::decode(record).unwrap_err();
        assert_eq!(returned.name, "quickcd-o-r-1");
        assert!(!reason.is_empty());
    }
}
