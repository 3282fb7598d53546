//! Explicit user actions and the notification slot they report into.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::errors::ClientError;
use crate::messages::{text, MessageKey};
use crate::state::Reconciler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Warn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

/// Single-slot notification channel. A new notice replaces the previous one.
#[derive(Clone)]
pub struct Notifier {
    tx: Arc<watch::Sender<Option<Notice>>>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Notice>> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Option<Notice> {
        self.tx.borrow().clone()
    }

    pub fn success(&self, text: impl Into<String>) {
        self.publish(NoticeKind::Success, text.into());
    }

    pub fn warn(&self, text: impl Into<String>) {
        self.publish(NoticeKind::Warn, text.into());
    }

    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    fn publish(&self, kind: NoticeKind, text: String) {
        self.tx.send_replace(Some(Notice { kind, text }));
    }
}

type AfterHook = Arc<dyn Fn() + Send + Sync>;

/// Runs explicit actions: every failure becomes one `Warn` notice, every
/// success with a message key becomes one `Success` notice, and the
/// `after` hook runs either way so derived UI state is recomputed.
#[derive(Clone)]
pub struct ActionRunner {
    reconciler: Reconciler,
    notifier: Notifier,
    after: AfterHook,
}

impl ActionRunner {
    pub fn new(reconciler: Reconciler, notifier: Notifier) -> Self {
        Self {
            reconciler,
            notifier,
            after: Arc::new(|| {}),
        }
    }

    pub fn with_after(mut self, after: impl Fn() + Send + Sync + 'static) -> Self {
        self.after = Arc::new(after);
        self
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub async fn run<T, F>(&self, success: Option<MessageKey>, action: F) -> Result<T, ClientError>
    where
        F: Future<Output = Result<T, ClientError>>,
    {
        let result = action.await;
        let language = self.reconciler.state().read(|s| s.language());
        match &result {
            Ok(_) => {
                if let Some(key) = success {
                    self.notifier.success(text(language, key));
                }
            }
            Err(e) => {
                if e.is_session_invalid() {
                    self.reconciler.invalidate_session();
                }
                warn!("Action failed: {}", e);
                self.notifier.warn(e.user_message(language));
            }
        }
        debug!("Recomputing derived state after action");
        (self.after)();
        result
    }
}
