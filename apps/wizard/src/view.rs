//! Derived UI state.
//!
//! `evaluate` is the pure function presentation layers consume: given the
//! state container, the page being shown and the widget-only file
//! selection, it yields the guard decision, button enablement, progress and
//! step chips. Nothing here is ever persisted.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::guard::{decide, step_allowed, GuardDecision, SessionProgress};
use crate::models::{LocalDraft, ServerSnapshot, Step};
use crate::state::reconcile::short_id;
use crate::state::WizardState;

/// Widget state that never leaves the page: how many files are picked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileSelection {
    pub documents: usize,
    pub photo: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UiFlags {
    pub upload: bool,
    pub upload_photo: bool,
    pub extract: bool,
    pub save_answers: bool,
    pub generate: bool,
    pub clear_session: bool,
    pub continue_to_review: bool,
    pub continue_from_start: bool,
    pub continue_from_upload: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub step_index: usize,
    pub total_steps: usize,
    pub percent: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepChip {
    pub step: Step,
    pub active: bool,
    pub clickable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionMeta {
    pub label: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WizardView {
    pub page: Step,
    pub decision: GuardDecision,
    pub flags: UiFlags,
    pub progress: Progress,
    pub chips: Vec<StepChip>,
    pub session: Option<SessionMeta>,
    pub recommended_step: Option<Step>,
    pub unresolved_required: Vec<String>,
}

pub fn evaluate(state: &WizardState, page: Step, selection: FileSelection) -> WizardView {
    let server = state.server();
    let progress_input = server
        .filter(|_| state.session_id().is_some())
        .map(SessionProgress::from_snapshot);

    WizardView {
        page,
        decision: decide(page, progress_input.as_ref()),
        flags: ui_flags(state.session_id().is_some(), state.draft(), server, selection),
        progress: progress(page),
        chips: Step::ORDER
            .into_iter()
            .map(|step| StepChip {
                step,
                active: step == page,
                clickable: step_allowed(step, progress_input.as_ref()),
            })
            .collect(),
        session: state.session_id().map(|id| session_meta(id, server)),
        recommended_step: server.map(ServerSnapshot::recommended_step),
        unresolved_required: server
            .map(|s| s.unresolved_required_question_ids.clone())
            .unwrap_or_default(),
    }
}

pub fn ui_flags(
    has_session: bool,
    draft: &LocalDraft,
    server: Option<&ServerSnapshot>,
    selection: FileSelection,
) -> UiFlags {
    let has_questions = server.is_some_and(|s| !s.questions.is_empty());
    let unresolved = server.map_or(0, |s| s.unresolved_required_question_ids.len());
    let has_docs = server.is_some_and(ServerSnapshot::has_documents);
    let ready = server.is_some_and(|s| s.ready_to_generate);

    UiFlags {
        upload: has_session && selection.documents > 0,
        upload_photo: has_session && selection.photo,
        extract: has_session,
        save_answers: has_session && has_questions,
        generate: has_session && ready,
        clear_session: has_session,
        continue_to_review: has_session && unresolved == 0 && ready,
        continue_from_start: !draft.job_ad.trim().is_empty() && draft.consent,
        continue_from_upload: has_session && has_docs,
    }
}

pub fn progress(page: Step) -> Progress {
    Progress {
        step_index: page.index(),
        total_steps: Step::ORDER.len(),
        percent: page.progress_percent(),
    }
}

fn session_meta(session_id: &str, server: Option<&ServerSnapshot>) -> SessionMeta {
    let expires_at = server
        .filter(|s| s.expires_at > 0.0)
        .and_then(|s| DateTime::<Utc>::from_timestamp(s.expires_at.trunc() as i64, 0));
    SessionMeta {
        label: format!("{}…", short_id(session_id)),
        expires_at,
    }
}
