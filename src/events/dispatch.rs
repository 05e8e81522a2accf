// ABOUTME: Drains pending event records through their handlers in two phases.
// ABOUTME: Non-blocking handlers go first; blocking handlers run strictly oldest event first.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;

use crate::store::{Labels, StateStore};
use crate::types::ResourceNamer;

use super::backoff::{Backoff, Clock};
use super::cursor::load_cursor;
use super::error::DispatchError;
use super::record::{COMPLETE, HANDLED, PendingEvent, STATUS, pending_selector};
use super::registry::{HandlerContext, HandlerError, Registration, Registry};
use super::workspace::Workspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    NonBlocking,
    Blocking,
}

impl Phase {
    fn includes(self, registration: &Registration) -> bool {
        registration.blocking == (self == Phase::Blocking)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct PassOutcome {
    ran: bool,
    handled: bool,
}

impl PassOutcome {
    fn did_work(self) -> bool {
        self.ran || self.handled
    }
}

pub struct Dispatcher<'a> {
    store: &'a dyn StateStore,
    registry: &'a Registry,
    namer: &'a ResourceNamer,
    workspace: &'a Workspace,
    clock: &'a dyn Clock,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        store: &'a dyn StateStore,
        registry: &'a Registry,
        namer: &'a ResourceNamer,
        workspace: &'a Workspace,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            store,
            registry,
            namer,
            workspace,
            clock,
        }
    }

    /// Run one drain step. Returns whether any handler ran or any record became handled.
    ///
    /// Handler failures are absorbed here. Only store errors and fatal handler
    /// errors come back to the caller.
    pub async fn process_next_pending(&self) -> Result<bool, DispatchError> {
        let Some(cursor) = load_cursor(self.store, self.namer).await? else {
            tracing::debug!("no event cursor yet, nothing to dispatch");
            return Ok(false);
        };

        let mut eligible: Vec<PendingEvent> = Vec::new();
        for record in self.store.list(&pending_selector(self.namer)).await? {
            match PendingEvent::decode(record) {
                Ok(pending) if pending.event.id <= cursor.event_id => eligible.push(pending),
                Ok(_) => {}
                Err((record, reason)) => {
                    tracing::warn!(record = %record.name, %reason, "skipping undecodable event record");
                }
            }
        }
        if eligible.is_empty() {
            return Ok(false);
        }
        eligible.sort_by_key(|p| p.event.id);

        for pending in &eligible {
            if self.run_pass(pending, Phase::NonBlocking).await?.did_work() {
                return Ok(true);
            }
        }

        let oldest = &eligible[0];
        Ok(self.run_pass(oldest, Phase::Blocking).await?.did_work())
    }

    async fn run_pass(&self, pending: &PendingEvent, phase: Phase) -> Result<PassOutcome, DispatchError> {
        let event = &pending.event;
        let name = pending.record.name.as_str();
        let mut labels: Labels = pending.record.labels.clone();
        let mut outcome = PassOutcome::default();

        for registration in self
            .registry
            .handlers_for(&event.event_type)
            .iter()
            .filter(|r| phase.includes(r))
        {
            if !registration.matches(&event.payload) {
                continue;
            }
            if labels.get(registration.id.as_str()).map(String::as_str) == Some(COMPLETE) {
                continue;
            }

            let now = self.clock.now();
            let backoff = Backoff::from_labels(&labels, &registration.id);
            if !backoff.is_open(now) {
                tracing::debug!(
                    event_id = %event.id,
                    handler = registration.name(),
                    attempts = backoff.attempts,
                    "backoff gate closed"
                );
                // A later blocking handler must never overtake an earlier one.
                if phase == Phase::Blocking {
                    break;
                }
                continue;
            }

            // Charge the attempt before running so a crash mid-handler still counts.
            let charged = backoff.charged(now).to_labels(&registration.id);
            self.store.label(name, &charged).await?;
            labels.extend(charged);
            outcome.ran = true;

            let workdir = self.workspace.reset().await?;
            let ctx = HandlerContext {
                event_id: event.id,
                handler: registration.name().to_string(),
                workdir,
            };

            tracing::info!(
                event_id = %event.id,
                handler = registration.name(),
                attempt = backoff.attempts + 1,
                "calling handler"
            );
            match invoke(registration, &ctx, &event.payload).await {
                Ok(()) => {
                    let done = vec![(registration.id.to_string(), COMPLETE.to_string())];
                    self.store.label(name, &done).await?;
                    labels.extend(done);
                    tracing::info!(event_id = %event.id, handler = registration.name(), "handler complete");
                }
                Err(HandlerError::Fatal(message)) => {
                    return Err(DispatchError::Fatal {
                        handler: registration.name().to_string(),
                        event_id: event.id,
                        message,
                    });
                }
                Err(HandlerError::Failed(message)) => {
                    tracing::error!(
                        event_id = %event.id,
                        handler = registration.name(),
                        error = %message,
                        "handler failed"
                    );
                    if phase == Phase::Blocking {
                        break;
                    }
                }
            }
        }

        let all_complete = self
            .registry
            .matching(event)
            .all(|r| labels.get(r.id.as_str()).map(String::as_str) == Some(COMPLETE));
        if all_complete {
            self.store
                .label(name, &[(STATUS.to_string(), HANDLED.to_string())])
                .await?;
            tracing::info!(event_id = %event.id, "event handled");
            outcome.handled = true;
        }

        Ok(outcome)
    }
}

/// Single boundary per invocation: panics become ordinary failures.
async fn invoke(
    registration: &Registration,
    ctx: &HandlerContext,
    payload: &serde_json::Value,
) -> Result<(), HandlerError> {
    match AssertUnwindSafe(registration.handler().run(ctx, payload))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "handler panicked".to_string());
            Err(HandlerError::Failed(format!("panic: {message}")))
        }
    }
}
