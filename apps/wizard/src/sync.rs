//! Background intake synchronization.
//!
//! Field edits call `schedule_intake_sync`; a burst of edits collapses into
//! one request carrying the draft as it is when the timer fires. Failures
//! here are logged and never reach the notification channel.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::models::DraftField;
use crate::session::SessionIdentity;
use crate::state::Reconciler;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(350);

/// Cancellable single-slot timer.
///
/// Scheduling replaces (and aborts) any timer still waiting. Once a timer
/// fires its task runs detached, so a later `schedule` or `cancel` never
/// interrupts work already underway.
pub struct Debouncer {
    delay: Duration,
    generation: Arc<AtomicU64>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: Arc::new(AtomicU64::new(0)),
            pending: Mutex::new(None),
        }
    }

    pub fn schedule<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let current = self.generation.clone();
        // The window starts now, not when the runtime first polls the timer.
        let deadline = Instant::now() + self.delay;

        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if current.load(Ordering::SeqCst) == generation {
                tokio::spawn(task);
            }
        });

        if let Some(previous) = self.pending.lock().replace(timer) {
            previous.abort();
        }
    }

    /// Drops a waiting timer. Returns whether one was still pending.
    pub fn cancel(&self) -> bool {
        self.generation.fetch_add(1, Ordering::SeqCst);
        match self.pending.lock().take() {
            Some(timer) => {
                let was_pending = !timer.is_finished();
                timer.abort();
                was_pending
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Some(timer) = self.pending.get_mut().take() {
            timer.abort();
        }
    }
}

struct Inner {
    backend: Arc<dyn Backend>,
    reconciler: Reconciler,
    session: SessionIdentity,
    debouncer: Debouncer,
    // At most one intake request in flight.
    in_flight: tokio::sync::Mutex<()>,
}

#[derive(Clone)]
pub struct SyncCoalescer {
    inner: Arc<Inner>,
}

impl SyncCoalescer {
    pub fn new(
        backend: Arc<dyn Backend>,
        reconciler: Reconciler,
        session: SessionIdentity,
        delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                reconciler,
                session,
                debouncer: Debouncer::new(delay),
                in_flight: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Restarts the debounce window. Call on every intake field edit.
    pub fn schedule_intake_sync(&self) {
        let this = self.clone();
        self.inner.debouncer.schedule(async move {
            this.sync_now().await;
        });
    }

    pub fn cancel_pending(&self) -> bool {
        self.inner.debouncer.cancel()
    }

    pub fn is_pending(&self) -> bool {
        self.inner.debouncer.is_pending()
    }

    /// Runs any waiting sync immediately instead of at timer expiry.
    pub async fn flush(&self) {
        if self.cancel_pending() {
            self.sync_now().await;
        }
    }

    /// Ensures a session (silently) and pushes the current intake fields.
    ///
    /// Skips the request when every intake edit is already confirmed, which
    /// is the case right after a creation call carried the same draft.
    pub async fn sync_now(&self) {
        let inner = &self.inner;
        let _serialized = inner.in_flight.lock().await;

        match inner.session.ensure_session().await {
            Ok(true) => {}
            Ok(false) => {
                debug!("Intake sync dropped: no session and nothing to start one with");
                return;
            }
            Err(e) => {
                warn!("Intake sync dropped: session creation failed: {}", e);
                return;
            }
        }

        let pending = inner.reconciler.state().read(|state| {
            let unconfirmed = DraftField::INTAKE.iter().any(|field| state.is_dirty(*field));
            state
                .session_id()
                .filter(|_| unconfirmed)
                .map(|id| (id.to_string(), state.draft().intake()))
        });
        let Some((session_id, intake)) = pending else {
            return;
        };

        let seq = inner.reconciler.state().issue_seq();
        match inner.backend.sync_intake(&session_id, &intake).await {
            Ok(envelope) => {
                inner.reconciler.apply(seq, envelope, Some(&intake));
            }
            Err(e) if e.is_session_invalid() => inner.reconciler.invalidate_session(),
            Err(e) => warn!("Background intake sync failed: {}", e),
        }
    }
}
