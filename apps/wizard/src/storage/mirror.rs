use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::messages::Language;
use crate::models::draft::{DEFAULT_ACCENT, DEFAULT_PRIMARY, DEFAULT_TEMPLATE};
use crate::models::LocalDraft;
use crate::state::WizardState;
use crate::storage::KeyValueStore;

/// Namespaced key of the single durable record.
pub const STORAGE_KEY: &str = "application_wizard.v1.state";

/// Durable shape of the local draft. Plain strings and flags only.
///
/// Every field defaults so that records written by older clients, or
/// records missing keys, still load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedRecord {
    pub session_id: String,
    pub language: String,
    pub company: String,
    pub position: String,
    pub consent: bool,
    pub job_ad: String,
    pub template_id: String,
    pub primary: String,
    pub accent: String,
    pub artifact_token: String,
}

impl PersistedRecord {
    pub fn from_state(state: &WizardState) -> Self {
        let draft = state.draft();
        Self {
            session_id: state.session_id().unwrap_or_default().to_string(),
            language: draft.language.code().to_string(),
            company: draft.company.clone(),
            position: draft.position.clone(),
            consent: draft.consent,
            job_ad: draft.job_ad.clone(),
            template_id: draft.template_id.clone(),
            primary: draft.primary_color.clone(),
            accent: draft.accent_color.clone(),
            artifact_token: state.artifact_token().unwrap_or_default().to_string(),
        }
    }

    pub fn session_id(&self) -> Option<String> {
        non_empty(&self.session_id)
    }

    pub fn artifact_token(&self) -> Option<String> {
        non_empty(&self.artifact_token)
    }

    pub fn draft(&self) -> LocalDraft {
        LocalDraft {
            language: Language::parse(&self.language),
            company: self.company.clone(),
            position: self.position.clone(),
            job_ad: self.job_ad.clone(),
            consent: self.consent,
            template_id: non_empty(&self.template_id).unwrap_or_else(|| DEFAULT_TEMPLATE.into()),
            primary_color: non_empty(&self.primary).unwrap_or_else(|| DEFAULT_PRIMARY.into()),
            accent_color: non_empty(&self.accent).unwrap_or_else(|| DEFAULT_ACCENT.into()),
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Mirrors the local draft into durable storage.
///
/// Reads are defensive: a missing or unparsable record yields an empty
/// draft and never an error. Write failures are logged and swallowed; the
/// in-memory state stays authoritative for the running page.
#[derive(Clone)]
pub struct LocalMirror {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl LocalMirror {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(store, STORAGE_KEY)
    }

    pub fn with_key(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn save(&self, state: &WizardState) {
        let record = PersistedRecord::from_state(state);
        let result = serde_json::to_string(&record)
            .map_err(Into::into)
            .and_then(|raw| self.store.set(&self.key, &raw));
        if let Err(e) = result {
            warn!("Failed to persist local draft: {e}");
        }
    }

    pub fn restore(&self) -> PersistedRecord {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return PersistedRecord::default(),
            Err(e) => {
                warn!("Failed to read local draft: {e}");
                return PersistedRecord::default();
            }
        };
        match serde_json::from_str::<PersistedRecord>(&raw) {
            Ok(record) => {
                debug!("Restored local draft (session present: {})", record.session_id().is_some());
                record
            }
            Err(e) => {
                warn!("Discarding unparsable local draft: {e}");
                PersistedRecord::default()
            }
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.store.remove(&self.key) {
            warn!("Failed to clear local draft: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DraftEdit;
    use crate::storage::MemoryStore;

    fn mirror() -> (Arc<MemoryStore>, LocalMirror) {
        let store = Arc::new(MemoryStore::new());
        let mirror = LocalMirror::new(store.clone());
        (store, mirror)
    }

    #[test]
    fn test_save_then_restore_reproduces_fields() {
        let (_, mirror) = mirror();
        let mut state = WizardState::default();
        state.restore_from(PersistedRecord {
            session_id: "sess-1".into(),
            artifact_token: "tok-9".into(),
            ..PersistedRecord::default()
        });
        state.edit(DraftEdit::Company("Acme".into()));
        state.edit(DraftEdit::Position("Engineer".into()));
        state.edit(DraftEdit::JobAd("Rust, async".into()));
        state.edit(DraftEdit::Consent(true));
        state.edit(DraftEdit::Template("friendly".into()));
        state.edit(DraftEdit::PrimaryColor("#000000".into()));

        mirror.save(&state);
        let record = mirror.restore();

        assert_eq!(record.session_id().as_deref(), Some("sess-1"));
        assert_eq!(record.artifact_token().as_deref(), Some("tok-9"));
        assert_eq!(record.draft(), *state.draft());
    }

    #[test]
    fn test_missing_record_yields_empty_draft() {
        let (_, mirror) = mirror();
        let record = mirror.restore();
        assert_eq!(record, PersistedRecord::default());
        assert_eq!(record.draft(), LocalDraft::default());
        assert!(record.session_id().is_none());
    }

    #[test]
    fn test_corrupted_record_yields_empty_draft() {
        let (store, mirror) = mirror();
        store.set(STORAGE_KEY, "{not json at all").unwrap();
        let record = mirror.restore();
        assert_eq!(record.draft(), LocalDraft::default());
        assert!(record.session_id().is_none());
    }

    #[test]
    fn test_wrong_typed_record_yields_empty_draft() {
        let (store, mirror) = mirror();
        store.set(STORAGE_KEY, "{\"consent\": \"yes\"}").unwrap();
        assert_eq!(mirror.restore(), PersistedRecord::default());
    }

    #[test]
    fn test_partial_record_fills_defaults() {
        let (store, mirror) = mirror();
        store
            .set(STORAGE_KEY, "{\"company\": \"Acme\", \"language\": \"de\"}")
            .unwrap();
        let draft = mirror.restore().draft();
        assert_eq!(draft.company, "Acme");
        assert_eq!(draft.language, Language::De);
        assert_eq!(draft.template_id, DEFAULT_TEMPLATE);
        assert_eq!(draft.primary_color, DEFAULT_PRIMARY);
    }

    #[test]
    fn test_clear_removes_record() {
        let (store, mirror) = mirror();
        mirror.save(&WizardState::default());
        assert!(store.get(STORAGE_KEY).unwrap().is_some());
        mirror.clear();
        assert!(store.get(STORAGE_KEY).unwrap().is_none());
    }
}
