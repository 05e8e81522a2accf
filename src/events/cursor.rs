// ABOUTME: The durable high-water mark of the event feed.
// ABOUTME: Stored as a singleton object holding the last event id and the feed ETag.

use crate::store::{Record, StateStore};
use crate::types::{EventId, OWNER, ResourceNamer};

use super::error::CursorError;

const EVENT_ID_KEY: &str = "eventID";
const ETAG_KEY: &str = "ETag";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cursor {
    pub event_id: EventId,
    pub etag: Option<String>,
}

impl Cursor {
    pub fn to_record(&self, namer: &ResourceNamer) -> Record {
        Record::new(&namer.cursor())
            .label("owner", OWNER)
            .data(EVENT_ID_KEY, self.event_id.to_string())
            .data(ETAG_KEY, self.etag.clone().unwrap_or_default())
    }

    pub fn from_record(record: &Record) -> Result<Self, CursorError> {
        let malformed = |reason: String| CursorError::Malformed {
            name: record.name.clone(),
            reason,
        };

        let event_id = record
            .get_data(EVENT_ID_KEY)
            .ok_or_else(|| malformed(format!("missing {EVENT_ID_KEY}")))?
            .parse()
            .map_err(|e| malformed(format!("bad {EVENT_ID_KEY}: {e}")))?;
        let etag = record
            .get_data(ETAG_KEY)
            .filter(|etag| !etag.is_empty())
            .map(str::to_string);

        Ok(Self { event_id, etag })
    }
}

/// Load the cursor; `None` means the loop has never run against this store.
pub async fn load_cursor(
    store: &dyn StateStore,
    namer: &ResourceNamer,
) -> Result<Option<Cursor>, CursorError> {
    match store.get(namer.cursor().as_str()).await? {
        Some(record) => Cursor::from_record(&record).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_round_trip() {
        let namer = ResourceNamer::new("o", "r");
        let cursor = Cursor {
            event_id: EventId::new(50),
            etag: Some("\"abc\"".to_string()),
        };
        let record = cursor.to_record(&namer);
        assert_eq!(record.name, "quickcd-o-r-event-cursor");
        assert_eq!(record.get_data("eventID"), Some("50"));
        assert_eq!(Cursor::from_record(&record).unwrap(), cursor);
    }

    #[test]
    fn empty_etag_reads_as_none() {
        let namer = ResourceNamer::new("o", "r");
        let record = Cursor::default().to_record(&namer);
        assert_eq!(Cursor::from_record(&record).unwrap().etag, None);
    }

    #[test]
    fn missing_event_id_is_malformed() {
        let namer = ResourceNamer::new("o", "r");
        let record = Record::new(&namer.cursor()).data("ETag", "x");
        assert!(matches!(
            Cursor::from_record(&record),
            Err(CursorError::Malformed { .. })
        ));
    }
}
