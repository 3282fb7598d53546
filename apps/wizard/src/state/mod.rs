//! The single in-memory state container.
//!
//! Everything the engine knows lives in one `WizardState` behind a shared
//! lock. Readers take clones or short read guards; the server snapshot is
//! only ever written from the `reconcile` submodule.

pub mod reconcile;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::messages::Language;
use crate::models::{DraftEdit, DraftField, LocalDraft, ServerSnapshot};
use crate::storage::PersistedRecord;

pub use reconcile::{Applied, Reconciler};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WizardState {
    session_id: Option<String>,
    server: Option<ServerSnapshot>,
    draft: LocalDraft,
    /// Fields edited locally and not yet confirmed by a server response.
    dirty: BTreeSet<DraftField>,
    artifact_token: Option<String>,
    last_applied_seq: u64,
}

impl WizardState {
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn server(&self) -> Option<&ServerSnapshot> {
        self.server.as_ref()
    }

    pub fn draft(&self) -> &LocalDraft {
        &self.draft
    }

    pub fn language(&self) -> Language {
        self.draft.language
    }

    pub fn artifact_token(&self) -> Option<&str> {
        self.artifact_token.as_deref()
    }

    pub fn is_dirty(&self, field: DraftField) -> bool {
        self.dirty.contains(&field)
    }

    pub(crate) fn edit(&mut self, edit: DraftEdit) -> DraftField {
        let field = self.draft.apply(edit);
        self.dirty.insert(field);
        field
    }

    pub(crate) fn set_language(&mut self, language: Language) {
        self.draft.language = language;
    }

    pub(crate) fn set_artifact_token(&mut self, token: Option<String>) {
        self.artifact_token = token;
    }

    /// Loads the persisted record. The restored token is not validated here.
    pub(crate) fn restore_from(&mut self, record: PersistedRecord) {
        self.session_id = record.session_id();
        self.artifact_token = record.artifact_token();
        self.draft = record.draft();
        self.dirty.clear();
    }
}

/// Cloneable handle to the state container plus the request sequence
/// counter used to order overlapping responses.
#[derive(Clone, Default)]
pub struct SharedState {
    inner: Arc<RwLock<WizardState>>,
    seq: Arc<AtomicU64>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> WizardState {
        self.inner.read().clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&WizardState) -> R) -> R {
        f(&self.inner.read())
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut WizardState) -> R) -> R {
        f(&mut self.inner.write())
    }

    pub fn session_id(&self) -> Option<String> {
        self.inner.read().session_id.clone()
    }

    pub fn draft(&self) -> LocalDraft {
        self.inner.read().draft.clone()
    }

    /// Draws the next sequence number. Call when a request is issued, not
    /// when its response arrives.
    pub fn issue_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }
}
