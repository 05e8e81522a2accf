// ABOUTME: Handler capability trait and the startup-built registry of handlers per event type.
// ABOUTME: Filters that error count as "no match"; registration is append-only.

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use crate::types::{Event, EventId, HandlerId};

/// Errors a handler can report back to the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Ordinary failure. Absorbed by the dispatcher and retried behind the backoff gate.
    #[error("{0}")]
    Failed(String),

    /// A broken invariant. Never retried; stops the control loop.
    #[error("invariant violated: {0}")]
    Fatal(String),
}

impl HandlerError {
    pub fn failed(message: impl fmt::Display) -> Self {
        HandlerError::Failed(message.to_string())
    }

    pub fn fatal(message: impl fmt::Display) -> Self {
        HandlerError::Fatal(message.to_string())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, HandlerError::Fatal(_))
    }
}

/// What a handler gets to know about the invocation.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub event_id: EventId,
    pub handler: String,
    /// Freshly emptied scratch directory. Run commands here.
    pub workdir: PathBuf,
}

/// A unit of work triggered by one event type.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Human-readable name. The stable handler id is derived from it.
    fn name(&self) -> &str;

    /// Whether this handler cares about the payload. An `Err` counts as no match.
    fn matches(&self, _payload: &Value) -> Result<bool, HandlerError> {
        Ok(true)
    }

    async fn run(&self, ctx: &HandlerContext, payload: &Value) -> Result<(), HandlerError>;
}

type FilterFn = dyn Fn(&Value) -> Option<bool> + Send + Sync;
type RunFn = dyn Fn(HandlerContext, Value) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync;

/// Handler assembled from closures.
///
/// The filter returns `None` when the payload lacks what it looks for, which is
/// treated as no match.
pub struct FnHandler {
    name: String,
    filter: Box<FilterFn>,
    run: Box<RunFn>,
}

impl FnHandler {
    pub fn new<F, Fut>(name: impl Into<String>, run: F) -> Self
    where
        F: Fn(HandlerContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            filter: Box::new(|_| Some(true)),
            run: Box::new(move |ctx, payload| run(ctx, payload).boxed()),
        }
    }

    pub fn filter(mut self, filter: impl Fn(&Value) -> Option<bool> + Send + Sync + 'static) -> Self {
        self.filter = Box::new(filter);
        self
    }
}

impl fmt::Debug for FnHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").field("name", &self.name).finish()
    }
}

#[async_trait]
impl Handler for FnHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, payload: &Value) -> Result<bool, HandlerError> {
        (self.filter)(payload)
            .ok_or_else(|| HandlerError::failed("filter could not evaluate payload"))
    }

    async fn run(&self, ctx: &HandlerContext, payload: &Value) -> Result<(), HandlerError> {
        (self.run)(ctx.clone(), payload.clone()).await
    }
}

/// A handler bound to an event type.
#[derive(Clone)]
pub struct Registration {
    pub event_type: String,
    pub id: HandlerId,
    pub blocking: bool,
    handler: Arc<dyn Handler>,
}

impl Registration {
    pub fn name(&self) -> &str {
        self.handler.name()
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    /// Evaluate the filter, folding filter errors into "no match".
    pub fn matches(&self, payload: &Value) -> bool {
        match self.handler.matches(payload) {
            Ok(matched) => matched,
            Err(e) => {
                tracing::debug!(handler = self.name(), "filter error treated as no match: {}", e);
                false
            }
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("event_type", &self.event_type)
            .field("name", &self.name())
            .field("id", &self.id)
            .field("blocking", &self.blocking)
            .finish()
    }
}

/// Handlers keyed by event type, in registration order.
#[derive(Debug, Default)]
pub struct Registry {
    by_type: BTreeMap<String, Vec<Registration>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler that may run out of event order.
    pub fn register(&mut self, event_type: &str, handler: impl Handler + 'static) -> &mut Self {
        self.add(event_type, Arc::new(handler), false)
    }

    /// Register a handler that runs strictly oldest event first.
    pub fn register_blocking(&mut self, event_type: &str, handler: impl Handler + 'static) -> &mut Self {
        self.add(event_type, Arc::new(handler), true)
    }

    pub fn add(&mut self, event_type: &str, handler: Arc<dyn Handler>, blocking: bool) -> &mut Self {
        let id = HandlerId::from_name(handler.name());
        if self.iter().any(|r| r.id == id) {
            tracing::warn!(
                handler = handler.name(),
                "handler name registered twice; both share completion labels"
            );
        }
        tracing::info!(
            handler = handler.name(),
            %id,
            event_type,
            blocking,
            "registered handler"
        );
        self.by_type
            .entry(event_type.to_string())
            .or_default()
            .push(Registration {
                event_type: event_type.to_string(),
                id,
                blocking,
                handler,
            });
        self
    }

    pub fn handlers_for(&self, event_type: &str) -> &[Registration] {
        self.by_type.get(event_type).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Handlers for the event's type whose filter accepts its payload.
    pub fn matching<'a>(&'a self, event: &'a Event) -> impl Iterator<Item = &'a Registration> + 'a {
        self.handlers_for(&event.event_type)
            .iter()
            .filter(move |r| r.matches(&event.payload))
    }

    /// An event is of interest when at least one registered handler matches it.
    pub fn is_interesting(&self, event: &Event) -> bool {
        self.matching(event).next().is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Registration> {
        self.by_type.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.by_type.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
