pub mod draft;
pub mod snapshot;

pub use draft::{DraftEdit, DraftField, IntakePayload, LocalDraft};
pub use snapshot::{
    DocTag, DocumentMeta, ExtractedProfile, MatchPayload, Question, ServerSnapshot,
    SessionEnvelope, Step, ThemeConfig,
};
