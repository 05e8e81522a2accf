// ABOUTME: In-memory stand-ins for the event feed, clock, GitHub sinks and chart tooling.
// ABOUTME: Each fake records what it was asked to do.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use nonempty::NonEmpty;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use quickcd::charts::{CdSettings, ChartError, Deployer, JobRunner, JobStatus};
use quickcd::events::{Clock, EventSource, FetchedPage, Page, SourceError};
use quickcd::exec::ExecError;
use quickcd::github::{BuildStatus, CommentRef, CommentSink, RunningLog, StatusReporter};
use quickcd::notify::{Address, Notifier, NotifyError};
use quickcd::types::Event;

/// A feed of events served newest first in fixed-size pages.
///
/// The entity tag changes whenever the newest event changes.
#[derive(Default)]
pub struct FakeFeed {
    events: Mutex<Vec<Event>>,
    page_size: usize,
    requests: Mutex<Vec<(String, Option<String>)>>,
}

impl FakeFeed {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            ..Default::default()
        }
    }

    /// Publish events; ids may be given in any order.
    pub fn publish(&self, events: impl IntoIterator<Item = Event>) {
        let mut all = self.events.lock();
        all.extend(events);
        all.sort_by(|a, b| b.id.cmp(&a.id));
    }

    pub fn requests(&self) -> Vec<(String, Option<String>)> {
        self.requests.lock().clone()
    }

    fn etag(&self) -> Option<String> {
        self.events.lock().first().map(|e| format!("\"{}\"", e.id))
    }
}

#[async_trait]
impl EventSource for FakeFeed {
    fn events_url(&self) -> String {
        "mem://events?page=1".to_string()
    }

    async fn fetch_page(&self, url: &str, etag: Option<&str>) -> Result<FetchedPage, SourceError> {
        self.requests
            .lock()
            .push((url.to_string(), etag.map(String::from)));

        let current = self.etag();
        if etag.is_some() && etag.map(String::from) == current {
            return Ok(FetchedPage::NotModified);
        }

        let page: usize = url
            .rsplit('=')
            .next()
            .and_then(|p| p.parse().ok())
            .unwrap_or(1);
        let all = self.events.lock();
        let start = (page - 1) * self.page_size;
        let events: Vec<Event> = all.iter().skip(start).take(self.page_size).cloned().collect();
        let next = (start + self.page_size < all.len()).then(|| format!("mem://events?page={}", page + 1));
        Ok(FetchedPage::Page(Page {
            events,
            etag: current,
            next,
        }))
    }
}

pub fn push_event(id: u64, branch: &str) -> Event {
    Event::new(
        id,
        "PushEvent",
        json!({"ref": format!("refs/heads/{branch}"), "before": "a", "head": "b", "commits": []}),
    )
}

pub fn event(id: u64, event_type: &str) -> Event {
    Event::new(id, event_type, json!({}))
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2018, 10, 3, 12, 0, 0).unwrap()),
        }
    }

    pub fn advance_minutes(&self, minutes: i64) {
        *self.now.lock() += ChronoDuration::minutes(minutes);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Comment sink that keeps every body it was sent.
#[derive(Default)]
pub struct RecordingSink {
    bodies: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn last(&self) -> String {
        self.bodies.lock().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl CommentSink for RecordingSink {
    async fn create(&self, body: &str) -> quickcd::github::Result<CommentRef> {
        self.bodies.lock().push(body.to_string());
        Ok(CommentRef {
            api_url: "https://ghe/api/v3/repos/o/r/comments/1".to_string(),
            html_url: "https://ghe/o/r/commit/b#comment-1".to_string(),
        })
    }

    async fn update(&self, _comment: &CommentRef, body: &str) -> quickcd::github::Result<()> {
        self.bodies.lock().push(body.to_string());
        Ok(())
    }
}

pub async fn running_log() -> (Arc<RunningLog>, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let log = RunningLog::start(sink.clone(), "production/us-south/c1: deploy-push-production")
        .await
        .unwrap();
    (Arc::new(log), sink)
}

#[derive(Default)]
pub struct RecordingStatuses {
    pub statuses: Mutex<Vec<(String, BuildStatus, String)>>,
}

impl RecordingStatuses {
    pub fn descriptions(&self) -> Vec<String> {
        self.statuses.lock().iter().map(|(_, _, d)| d.clone()).collect()
    }

    pub fn last(&self) -> Option<(BuildStatus, String)> {
        self.statuses.lock().last().map(|(_, s, d)| (*s, d.clone()))
    }
}

#[async_trait]
impl StatusReporter for RecordingStatuses {
    async fn set_status(&self, sha: &str, status: BuildStatus, description: &str, _target_url: &str) {
        self.statuses
            .lock()
            .push((sha.to_string(), status, description.to_string()));
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, Vec<String>, String)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        subject: &str,
        recipients: &NonEmpty<Address>,
        body: &str,
    ) -> Result<(), NotifyError> {
        self.sent.lock().push((
            subject.to_string(),
            recipients.iter().map(|a| a.email.clone()).collect(),
            body.to_string(),
        ));
        Ok(())
    }
}

fn command_failed(command: &str) -> ChartError {
    ChartError::Command(ExecError::Failed {
        command: command.to_string(),
        exit_code: 1,
        stdout: String::new(),
        stderr: "boom".to_string(),
    })
}

/// Deployer whose charts, history and failures are set up front.
#[derive(Default)]
pub struct FakeDeployer {
    pub settings: Mutex<BTreeMap<String, CdSettings>>,
    pub revisions: Mutex<BTreeMap<String, u32>>,
    pub failing_upgrades: Mutex<BTreeSet<String>>,
    pub failing_rollbacks: Mutex<BTreeSet<String>>,
    pub listing_fails: Mutex<bool>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeDeployer {
    pub fn chart(&self, name: &str, enabled: bool, tests: &[&str], revision: Option<u32>) -> &Self {
        let settings = CdSettings {
            enabled,
            integration_tests: tests
                .iter()
                .map(|t| (t.to_string(), serde_yaml::Value::Null))
                .collect(),
        };
        self.settings.lock().insert(name.to_string(), settings);
        if let Some(rev) = revision {
            self.revisions.lock().insert(name.to_string(), rev);
        }
        self
    }

    pub fn fail_upgrade(&self, name: &str) -> &Self {
        self.failing_upgrades.lock().insert(name.to_string());
        self
    }

    pub fn fail_rollback(&self, name: &str) -> &Self {
        self.failing_rollbacks.lock().insert(name.to_string());
        self
    }

    pub fn fail_listing(&self) -> &Self {
        *self.listing_fails.lock() = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Deployer for FakeDeployer {
    async fn releases(&self) -> quickcd::charts::Result<BTreeSet<String>> {
        if *self.listing_fails.lock() {
            return Err(command_failed("helm ls --short --all"));
        }
        Ok(self.revisions.lock().keys().cloned().collect())
    }

    async fn last_deployed_revision(&self, release: &str) -> quickcd::charts::Result<Option<u32>> {
        Ok(self.revisions.lock().get(release).copied())
    }

    async fn settings(&self, chart: &str) -> quickcd::charts::Result<CdSettings> {
        Ok(self.settings.lock().get(chart).cloned().unwrap_or_default())
    }

    async fn upgrade(&self, chart: &str) -> quickcd::charts::Result<()> {
        self.calls.lock().push(format!("upgrade {chart}"));
        if self.failing_upgrades.lock().contains(chart) {
            return Err(command_failed(&format!("kdep -i ./{chart}/values.yaml")));
        }
        Ok(())
    }

    async fn rollback(&self, release: &str, revision: u32) -> quickcd::charts::Result<()> {
        self.calls.lock().push(format!("rollback {release} {revision}"));
        if self.failing_rollbacks.lock().contains(release) {
            return Err(command_failed(&format!("helm rollback --force {release} {revision}")));
        }
        Ok(())
    }
}

/// Job runner replaying a scripted sequence of statuses per test.
#[derive(Default)]
pub struct FakeJobs {
    script: Mutex<BTreeMap<String, VecDeque<JobStatus>>>,
    pub launched: Mutex<Vec<String>>,
    pub polls: Mutex<usize>,
}

impl FakeJobs {
    /// Statuses returned in order; the last one repeats.
    pub fn script(&self, test: &str, statuses: &[JobStatus]) -> &Self {
        self.script
            .lock()
            .insert(test.to_string(), statuses.iter().copied().collect());
        self
    }

    pub fn launched(&self) -> Vec<String> {
        self.launched.lock().clone()
    }
}

#[async_trait]
impl JobRunner for FakeJobs {
    async fn launch(&self, test: &str, _release: &str) -> quickcd::charts::Result<()> {
        self.launched.lock().push(test.to_string());
        Ok(())
    }

    async fn status(&self, test: &str, _release: &str) -> quickcd::charts::Result<JobStatus> {
        *self.polls.lock() += 1;
        let mut script = self.script.lock();
        let queue = script.entry(test.to_string()).or_default();
        let status = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().copied()
        };
        Ok(status.unwrap_or(JobStatus::Succeeded))
    }

    async fn logs(&self, test: &str, release: &str) -> quickcd::charts::Result<String> {
        Ok(format!("logs of {test} ({release})"))
    }
}
