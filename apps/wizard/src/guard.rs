//! Navigation guard: may the current page render, or must the user be sent
//! elsewhere? Pure and recomputed on every evaluation.

use serde::Serialize;

use crate::models::{ServerSnapshot, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "target", rename_all = "snake_case")]
pub enum GuardDecision {
    Allow,
    Redirect(Step),
}

/// The slice of server state the guard looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProgress {
    pub recommended_step: Step,
    pub has_documents: bool,
    pub has_profile: bool,
}

impl SessionProgress {
    pub fn from_snapshot(snapshot: &ServerSnapshot) -> Self {
        Self {
            recommended_step: snapshot.recommended_step(),
            has_documents: snapshot.has_documents(),
            has_profile: snapshot.has_profile(),
        }
    }
}

/// `session` is `None` until a session exists and its snapshot is known.
pub fn decide(page: Step, session: Option<&SessionProgress>) -> GuardDecision {
    if page == Step::Result {
        return GuardDecision::Allow;
    }
    let Some(progress) = session else {
        return if page == Step::Start {
            GuardDecision::Allow
        } else {
            GuardDecision::Redirect(Step::Start)
        };
    };

    let recommended = progress.recommended_step;
    let redirect = match page {
        Step::Start => progress.has_documents || progress.has_profile,
        Step::Questions => matches!(recommended, Step::Start | Step::Upload),
        Step::Review => recommended != Step::Review,
        Step::Upload | Step::Result => false,
    };

    if redirect && recommended != page {
        GuardDecision::Redirect(recommended)
    } else {
        GuardDecision::Allow
    }
}

/// Advisory chip clickability. Never the enforcement point; `decide` is.
pub fn step_allowed(step: Step, session: Option<&SessionProgress>) -> bool {
    match step {
        Step::Start | Step::Upload => true,
        Step::Questions => session
            .map(|p| !matches!(p.recommended_step, Step::Start | Step::Upload))
            .unwrap_or(false),
        Step::Review => session
            .map(|p| p.recommended_step == Step::Review)
            .unwrap_or(false),
        Step::Result => false,
    }
}
