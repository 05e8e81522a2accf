// ABOUTME: Per-handler cubic backoff gate stored as labels on the event record.
// ABOUTME: attempts=n keeps the handler from running again for n^3 minutes.

use chrono::{DateTime, TimeZone, Utc};

use crate::store::Labels;
use crate::types::HandlerId;

/// Source of the current time, swappable in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Retry bookkeeping for one handler on one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Backoff {
    pub attempts: u32,
    pub last_run: Option<DateTime<Utc>>,
}

impl Backoff {
    /// Read `<id>_attempts` and `<id>_last_run`; missing or unparsable values count as zero.
    pub fn from_labels(labels: &Labels, id: &HandlerId) -> Self {
        let attempts = labels
            .get(&id.attempts_label())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let last_run = labels
            .get(&id.last_run_label())
            .and_then(|v| v.parse::<i64>().ok())
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
        Self { attempts, last_run }
    }

    /// Minimum wait after the last attempt, in seconds. No cap.
    pub fn required_wait_secs(&self) -> u64 {
        u64::from(self.attempts)
            .checked_pow(3)
            .and_then(|minutes| minutes.checked_mul(60))
            .unwrap_or(u64::MAX)
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let required = self.required_wait_secs();
        if required == 0 {
            return true;
        }
        match self.last_run {
            None => true,
            Some(last) => {
                let elapsed = (now - last).num_seconds();
                elapsed >= 0 && elapsed as u64 >= required
            }
        }
    }

    /// State after charging one more attempt at `now`.
    pub fn charged(&self, now: DateTime<Utc>) -> Self {
        Self {
            attempts: self.attempts.saturating_add(1),
            last_run: Some(now),
        }
    }

    pub fn to_labels(&self, id: &HandlerId) -> Vec<(String, String)> {
        let mut labels = vec![(id.attempts_label(), self.attempts.to_string())];
        if let Some(last) = self.last_run {
            labels.push((id.last_run_label(), last.timestamp().to_string()));
        }
        labels
    }
}
