// ABOUTME: Cooperative shutdown flag set by SIGINT/SIGTERM.
// ABOUTME: The loop checks it between steps; a second signal exits immediately.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct Shutdown {
    requested: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Set the flag and wake sleepers. Returns whether this was the first request.
    pub fn request(&self) -> bool {
        let first = !self.requested.swap(true, Ordering::SeqCst);
        self.notify.notify_waiters();
        first
    }

    /// Sleep for `duration` unless shutdown is requested first.
    ///
    /// Returns `false` when woken by a shutdown request.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_requested() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = notified => false,
        }
    }
}

/// Route SIGINT and SIGTERM into `shutdown`. A second signal exits with code 1.
pub fn listen_for_signals(shutdown: Arc<Shutdown>) -> std::io::Result<JoinHandle<()>> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = interrupt.recv() => {}
                _ = terminate.recv() => {}
            }
            if shutdown.request() {
                tracing::warn!("interrupted, exiting once the current handler completes");
            } else {
                tracing::error!("interrupted twice, exiting");
                std::process::exit(1);
            }
        }
    }))
}
