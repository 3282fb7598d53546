//! The wizard engine as one handle.
//!
//! `WizardClient` wires the state container, session identity, intake sync,
//! action runner and derived view together for one page load. Presentation
//! layers call its operations and read `view()` / subscribe to the view and
//! notice channels.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::action::{ActionRunner, Notice, Notifier};
use crate::backend::{Backend, GenerateRequest, GenerateResponse, UploadFile};
use crate::errors::ClientError;
use crate::guard::GuardDecision;
use crate::messages::{Language, MessageKey};
use crate::models::{DocTag, DraftEdit, Step};
use crate::session::SessionIdentity;
use crate::state::reconcile::short_id;
use crate::state::{Reconciler, SharedState};
use crate::storage::{KeyValueStore, LocalMirror};
use crate::sync::{SyncCoalescer, DEFAULT_DEBOUNCE};
use crate::view::{evaluate, FileSelection, WizardView};

#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
    /// The page being loaded.
    pub page: Step,
    pub debounce: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            page: Step::Start,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Recomputes the derived view and publishes it.
#[derive(Clone)]
struct ViewPublisher {
    state: SharedState,
    page: Step,
    selection: Arc<Mutex<FileSelection>>,
    tx: Arc<watch::Sender<WizardView>>,
}

impl ViewPublisher {
    fn compute(&self) -> WizardView {
        let selection = *self.selection.lock();
        self.state.read(|state| evaluate(state, self.page, selection))
    }

    fn publish(&self) -> WizardView {
        let view = self.compute();
        self.tx.send_replace(view.clone());
        view
    }
}

pub struct WizardClient {
    backend: Arc<dyn Backend>,
    reconciler: Reconciler,
    session: SessionIdentity,
    sync: SyncCoalescer,
    runner: ActionRunner,
    views: ViewPublisher,
}

impl WizardClient {
    /// Builds the engine for one page load and restores the durable record.
    /// The restored session is not validated until `init`.
    pub fn new(backend: Arc<dyn Backend>, store: Arc<dyn KeyValueStore>, options: ClientOptions) -> Self {
        let state = SharedState::new();
        let mirror = LocalMirror::new(store);
        let record = mirror.restore();
        state.write(|s| s.restore_from(record));

        let selection = Arc::new(Mutex::new(FileSelection::default()));
        let initial = state.read(|s| evaluate(s, options.page, FileSelection::default()));
        let (tx, _rx) = watch::channel(initial);
        let views = ViewPublisher {
            state: state.clone(),
            page: options.page,
            selection,
            tx: Arc::new(tx),
        };

        // background syncs and session creation publish through this too
        let publisher = views.clone();
        let reconciler = Reconciler::new(state, mirror).with_on_change(move || {
            publisher.publish();
        });
        let session = SessionIdentity::new(backend.clone(), reconciler.clone());
        let sync = SyncCoalescer::new(backend.clone(), reconciler.clone(), session.clone(), options.debounce);

        let publisher = views.clone();
        let runner = ActionRunner::new(reconciler.clone(), Notifier::new()).with_after(move || {
            publisher.publish();
        });

        Self {
            backend,
            reconciler,
            session,
            sync,
            runner,
            views,
        }
    }

    /// Page-load sequence: auto-start on the start page, validate a
    /// restored session (except on the result page), then decide once
    /// whether the page may render.
    pub async fn init(&self) -> GuardDecision {
        let page = self.views.page;
        let state = self.reconciler.state();

        if page == Step::Start && state.session_id().is_none() && state.draft().has_start_signal() {
            debug!("Restored draft carries start signal; scheduling intake sync");
            self.sync.schedule_intake_sync();
        }

        if page != Step::Result {
            self.validate_session().await;
        }

        let view = self.views.publish();
        match view.decision {
            GuardDecision::Allow => debug!("Rendering {} page", page.as_str()),
            GuardDecision::Redirect(target) => {
                info!("Redirecting from {} to {}", page.as_str(), target.as_str())
            }
        }
        view.decision
    }

    /// Fetches the restored session once. Any failure drops it for good.
    async fn validate_session(&self) -> bool {
        let Some(session_id) = self.reconciler.state().session_id() else {
            return false;
        };
        let seq = self.reconciler.state().issue_seq();
        match self.backend.fetch_state(&session_id).await {
            Ok(envelope) => {
                self.reconciler.apply(seq, envelope, None);
                true
            }
            Err(e) => {
                info!("Restored session {} failed validation: {}", short_id(&session_id), e);
                self.reconciler.invalidate_session();
                false
            }
        }
    }

    pub fn page(&self) -> Step {
        self.views.page
    }

    pub fn state(&self) -> &SharedState {
        self.reconciler.state()
    }

    pub fn view(&self) -> WizardView {
        self.views.compute()
    }

    pub fn subscribe_view(&self) -> watch::Receiver<WizardView> {
        self.views.tx.subscribe()
    }

    pub fn notices(&self) -> watch::Receiver<Option<Notice>> {
        self.runner.notifier().subscribe()
    }

    pub fn notice(&self) -> Option<Notice> {
        self.runner.notifier().current()
    }

    pub fn set_file_selection(&self, selection: FileSelection) {
        *self.views.selection.lock() = selection;
        self.views.publish();
    }

    /// Records a field edit, mirrors it locally and, for intake fields,
    /// restarts the sync debounce window.
    pub fn edit(&self, edit: DraftEdit) {
        let field = self.reconciler.state().write(|s| s.edit(edit));
        self.reconciler.persist();
        if field.is_intake() {
            self.sync.schedule_intake_sync();
        }
        self.views.publish();
    }

    /// Sends any intake edit still waiting for its debounce timer.
    pub async fn flush(&self) {
        self.sync.flush().await;
        self.views.publish();
    }

    pub fn has_pending_sync(&self) -> bool {
        self.sync.is_pending()
    }

    pub async fn ensure_session(&self) -> Result<bool, ClientError> {
        self.session.ensure_session().await
    }

    /// Explicit start. Returns `false` when a session already existed.
    pub async fn start_session(&self) -> Result<bool, ClientError> {
        if self.reconciler.state().session_id().is_some() {
            return Ok(false);
        }
        self.runner
            .run(Some(MessageKey::SessionStarted), async move {
                match self.session.ensure_session().await? {
                    true => Ok(true),
                    false => Err(ClientError::NoSession),
                }
            })
            .await
    }

    /// Returns whether the language actually changed.
    pub async fn change_language(&self, language: Language) -> Result<bool, ClientError> {
        if self.reconciler.state().read(|s| s.language()) == language {
            return Ok(false);
        }
        self.runner
            .run(Some(MessageKey::LanguageUpdated), async move {
                self.reconciler.state().write(|s| s.set_language(language));
                self.reconciler.persist();
                if let Some(session_id) = self.reconciler.state().session_id() {
                    let seq = self.reconciler.state().issue_seq();
                    match self.backend.set_language(&session_id, language).await {
                        Ok(envelope) => {
                            self.reconciler.apply(seq, envelope, None);
                        }
                        Err(e) => debug!("Language sync failed: {}", e),
                    }
                }
                Ok(true)
            })
            .await
    }

    pub async fn upload_documents(&self, files: Vec<UploadFile>) -> Result<(), ClientError> {
        self.runner
            .run(Some(MessageKey::DocumentsUploaded), async move {
                let session_id = self.require_session(true).await?;
                if files.is_empty() {
                    return Err(ClientError::NoFilesSelected);
                }
                let seq = self.reconciler.state().issue_seq();
                let envelope = self.backend.upload_documents(&session_id, &files).await?;
                self.reconciler.apply(seq, envelope, None);
                self.set_file_selection_quiet(|s| s.documents = 0);
                Ok(())
            })
            .await
    }

    pub async fn upload_photo(&self, file: Option<UploadFile>) -> Result<(), ClientError> {
        self.runner
            .run(Some(MessageKey::DocumentsUploaded), async move {
                let session_id = self.require_session(true).await?;
                let file = file.ok_or(ClientError::NoFilesSelected)?;
                let seq = self.reconciler.state().issue_seq();
                let envelope = self.backend.upload_photo(&session_id, &file).await?;
                self.reconciler.apply(seq, envelope, None);
                self.set_file_selection_quiet(|s| s.photo = false);
                Ok(())
            })
            .await
    }

    pub async fn extract(&self, tag_overrides: BTreeMap<String, DocTag>) -> Result<(), ClientError> {
        self.runner
            .run(Some(MessageKey::ExtractionRefreshed), async move {
                let session_id = self.require_session(false).await?;
                let seq = self.reconciler.state().issue_seq();
                let envelope = self.backend.extract(&session_id, &tag_overrides).await?;
                self.reconciler.apply(seq, envelope, None);
                Ok(())
            })
            .await
    }

    pub async fn save_answers(&self, answers: BTreeMap<String, String>) -> Result<(), ClientError> {
        self.runner
            .run(Some(MessageKey::AnswersSaved), async move {
                let session_id = self.require_session(false).await?;
                let seq = self.reconciler.state().issue_seq();
                let envelope = self.backend.save_answers(&session_id, &answers).await?;
                self.reconciler.apply(seq, envelope, None);
                Ok(())
            })
            .await
    }

    /// Generates the documents with the draft's template and colors and
    /// keeps the returned artifact token.
    pub async fn generate(&self) -> Result<GenerateResponse, ClientError> {
        self.runner
            .run(Some(MessageKey::FilesGenerated), async move {
                let session_id = self.require_session(false).await?;
                let draft = self.reconciler.state().draft();
                let request = GenerateRequest {
                    template_id: draft.template_id,
                    primary_color: draft.primary_color,
                    accent_color: draft.accent_color,
                };
                let response = self.backend.generate(&session_id, &request).await?;
                self.reconciler
                    .state()
                    .write(|s| s.set_artifact_token(Some(response.token.clone())));
                self.reconciler.persist();
                if let Some(warning) = response.warning.as_deref() {
                    info!("Generation warning: {}", warning);
                }
                Ok(response)
            })
            .await
    }

    /// Explicit state re-fetch.
    pub async fn refresh_session(&self) -> Result<(), ClientError> {
        self.runner
            .run(Some(MessageKey::SessionRefreshed), async move {
                let session_id = self.require_session(false).await?;
                let seq = self.reconciler.state().issue_seq();
                match self.backend.fetch_state(&session_id).await {
                    Ok(envelope) => {
                        self.reconciler.apply(seq, envelope, None);
                        Ok(())
                    }
                    // any server refusal means the session is unusable
                    Err(e @ ClientError::Api { .. }) => {
                        self.reconciler.invalidate_session();
                        Err(e)
                    }
                    Err(e) => Err(e),
                }
            })
            .await
    }

    /// Cancels a waiting sync, deletes the session server-side (best
    /// effort) and wipes every trace of it locally.
    pub async fn clear_session(&self) -> Result<(), ClientError> {
        self.runner
            .run(Some(MessageKey::SessionCleared), async move {
                self.sync.cancel_pending();
                if let Some(session_id) = self.reconciler.state().session_id() {
                    if let Err(e) = self.backend.delete_session(&session_id).await {
                        debug!("Session delete failed: {}", e);
                    }
                    info!("Cleared session {}", short_id(&session_id));
                }
                self.reconciler.clear_session();
                Ok(())
            })
            .await
    }

    async fn require_session(&self, ensure: bool) -> Result<String, ClientError> {
        if ensure {
            // failures here surface as the missing-session error below
            if let Err(e) = self.session.ensure_session().await {
                debug!("Silent session start failed: {}", e);
            }
        }
        self.reconciler.state().session_id().ok_or(ClientError::NoSession)
    }

    fn set_file_selection_quiet(&self, f: impl FnOnce(&mut FileSelection)) {
        f(&mut self.views.selection.lock());
    }
}
