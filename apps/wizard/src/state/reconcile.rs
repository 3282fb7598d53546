//! Server state reconciliation.
//!
//! The only code path that writes the server snapshot. Each apply:
//! 1. drops responses older than the newest one already applied
//! 2. replaces the snapshot wholesale
//! 3. takes the UI language from the server
//! 4. refills draft fields the user has not touched since the last sync
//! 5. persists the local mirror
//! 6. runs the change hook

use std::sync::Arc;

use tracing::{debug, info};

use crate::models::{DraftField, IntakePayload, SessionEnvelope};
use crate::state::{SharedState, WizardState};
use crate::storage::LocalMirror;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Applied,
    /// An older request's response arrived after a newer one was applied.
    Stale,
}

type ChangeHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
pub struct Reconciler {
    state: SharedState,
    mirror: LocalMirror,
    on_change: ChangeHook,
}

impl Reconciler {
    pub fn new(state: SharedState, mirror: LocalMirror) -> Self {
        Self {
            state,
            mirror,
            on_change: Arc::new(|| {}),
        }
    }

    /// Runs `hook` after every applied response, invalidation and clear,
    /// including those made by background work. Set before cloning.
    pub fn with_on_change(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_change = Arc::new(hook);
        self
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Applies a server response issued with sequence number `seq`.
    /// `sent` is the intake payload the request carried, if any; edits that
    /// still match it count as confirmed.
    pub fn apply(&self, seq: u64, envelope: SessionEnvelope, sent: Option<&IntakePayload>) -> Applied {
        let outcome = self
            .state
            .write(|state| apply_envelope(state, seq, envelope, sent));
        match outcome {
            Applied::Applied => {
                self.persist();
                (self.on_change)();
            }
            Applied::Stale => debug!("Discarded stale server response (seq {seq})"),
        }
        outcome
    }

    /// Session reported unknown or expired: drop the token, the snapshot and
    /// everything derived from them. The user's draft input survives.
    pub fn invalidate_session(&self) {
        let fence = self.state.issue_seq();
        let dropped = self.state.write(|state| {
            let dropped = state.session_id.take();
            reset_session(state, fence);
            dropped
        });
        if let Some(id) = dropped {
            info!("Session {} is no longer valid; cleared local session state", short_id(&id));
        }
        self.mirror.clear();
        self.persist();
        (self.on_change)();
    }

    /// Explicit teardown: session, snapshot and durable record are wiped and
    /// the draft returns to its defaults (language preference kept).
    pub fn clear_session(&self) {
        let fence = self.state.issue_seq();
        self.state.write(|state| {
            let language = state.draft.language;
            state.session_id = None;
            reset_session(state, fence);
            state.draft = Default::default();
            state.draft.language = language;
            state.dirty.clear();
        });
        self.mirror.clear();
        (self.on_change)();
    }

    pub fn persist(&self) {
        self.state.read(|state| self.mirror.save(state));
    }
}

/// Anything issued before `fence` is stale once the session is gone.
fn reset_session(state: &mut WizardState, fence: u64) {
    state.server = None;
    state.artifact_token = None;
    state.last_applied_seq = state.last_applied_seq.max(fence);
}

pub(crate) fn short_id(id: &str) -> &str {
    id.char_indices().nth(12).map(|(i, _)| &id[..i]).unwrap_or(id)
}

fn apply_envelope(
    state: &mut WizardState,
    seq: u64,
    envelope: SessionEnvelope,
    sent: Option<&IntakePayload>,
) -> Applied {
    if seq < state.last_applied_seq {
        return Applied::Stale;
    }
    state.last_applied_seq = seq;

    let SessionEnvelope {
        session_id, state: snapshot, ..
    } = envelope;
    state.session_id = Some(session_id);

    if let Some(sent) = sent {
        let draft = &state.draft;
        state
            .dirty
            .retain(|field| !(field.is_intake() && draft.intake_field_matches(*field, sent)));
    }

    state.draft.language = snapshot.language();

    let replaceable = |state: &WizardState, field: DraftField| {
        !state.dirty.contains(&field) || state.draft.field_is_empty(field)
    };
    let fill = |target: &mut String, value: &str| {
        if !value.is_empty() {
            *target = value.to_string();
        }
    };

    if replaceable(state, DraftField::Company) {
        fill(&mut state.draft.company, &snapshot.company_name);
    }
    if replaceable(state, DraftField::Position) {
        fill(&mut state.draft.position, &snapshot.position_title);
    }
    if replaceable(state, DraftField::JobAd) {
        fill(&mut state.draft.job_ad, &snapshot.job_ad_text);
    }
    // An unchecked box is a deliberate answer, not an empty widget.
    if !state.dirty.contains(&DraftField::Consent) {
        state.draft.consent = snapshot.consent_confirmed;
    }
    if replaceable(state, DraftField::Template) {
        if let Some(template_id) = snapshot.template_id.as_deref() {
            fill(&mut state.draft.template_id, template_id);
        }
    }
    if let Some(theme) = snapshot.theme.as_ref() {
        if replaceable(state, DraftField::PrimaryColor) {
            fill(&mut state.draft.primary_color, &theme.primary_hex);
        }
        if replaceable(state, DraftField::AccentColor) {
            fill(&mut state.draft.accent_color, &theme.accent_hex);
        }
    }

    state.server = Some(snapshot);
    Applied::Applied
}
