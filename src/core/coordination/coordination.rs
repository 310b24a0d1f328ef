// Process-wide coordination handles.
//
// Both are plain values handed to whoever needs them instead of statics:
// - `Shutdown` / `ShutdownSignal`: one trigger, many cheap listeners.
// - `AuditLock`: mutual exclusion between the nickname sweep and the audit task.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, MutexGuard};

/// Owning side of the shutdown signal. Dropping it does not signal.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Listening side of the shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been triggered. If the owning `Shutdown` is
    /// gone without triggering, this never resolves.
    pub async fn triggered(&mut self) {
        if self.rx.wait_for(|triggered| *triggered).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Sleep for `period` unless shutdown arrives first. Returns `false` when
    /// shutdown cut the wait short.
    pub async fn sleep(&mut self, period: Duration) -> bool {
        let elapsed = tokio::select! {
            _ = tokio::time::sleep(period) => true,
            _ = self.triggered() => false,
        };
        elapsed && !self.is_triggered()
    }
}

/// Lock shared with the moderation audit task.
#[derive(Debug, Clone, Default)]
pub struct AuditLock {
    inner: Arc<Mutex<()>>,
}

impl AuditLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking acquire. `None` means somebody else holds it right now.
    pub fn try_acquire(&self) -> Option<MutexGuard<'_, ()>> {
        self.inner.try_lock().ok()
    }
}
