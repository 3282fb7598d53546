//! In-memory `Backend` used by the engine's tests.
//!
//! Behaves like a tiny version of the real session API: it keeps snapshots
//! per session, recommends a step from what the session holds, and records
//! every call so tests can count network traffic.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::backend::{Backend, GenerateRequest, GenerateResponse, SessionStartRequest, UploadFile};
use crate::errors::ClientError;
use crate::messages::Language;
use crate::models::{
    DocTag, DocumentMeta, ExtractedProfile, IntakePayload, Question, ServerSnapshot, SessionEnvelope, Step,
    ThemeConfig,
};

const EXPIRES_AT: f64 = 1_900_000_000.0;

#[derive(Default)]
struct FakeInner {
    calls: HashMap<String, usize>,
    failures: HashMap<String, ClientError>,
    sessions: BTreeMap<String, ServerSnapshot>,
    created: Vec<String>,
    start_requests: Vec<SessionStartRequest>,
    intake_requests: Vec<(String, IntakePayload)>,
    deleted: Vec<String>,
}

#[derive(Default)]
pub struct FakeBackend {
    delay: Duration,
    inner: Mutex<FakeInner>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(self, op: &str, error: ClientError) -> Self {
        self.fail(op, error);
        self
    }

    pub fn fail(&self, op: &str, error: ClientError) {
        self.inner.lock().failures.insert(op.to_string(), error);
    }

    pub fn clear_failure(&self, op: &str) {
        self.inner.lock().failures.remove(op);
    }

    pub fn calls(&self, op: &str) -> usize {
        self.inner.lock().calls.get(op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.inner.lock().calls.values().sum()
    }

    pub fn created_sessions(&self) -> Vec<String> {
        self.inner.lock().created.clone()
    }

    pub fn last_start_request(&self) -> Option<SessionStartRequest> {
        self.inner.lock().start_requests.last().cloned()
    }

    pub fn intake_requests(&self) -> Vec<(String, IntakePayload)> {
        self.inner.lock().intake_requests.clone()
    }

    pub fn deleted_sessions(&self) -> Vec<String> {
        self.inner.lock().deleted.clone()
    }

    /// Forgets a session, as if it expired server-side.
    pub fn expire(&self, session_id: &str) {
        self.inner.lock().sessions.remove(session_id);
    }

    /// Seeds a session directly, bypassing `create_session`.
    pub fn insert_session(&self, session_id: &str, mut snapshot: ServerSnapshot) {
        snapshot.session_id = session_id.to_string();
        snapshot.recommended_step = Some(recommend(&snapshot));
        self.inner.lock().sessions.insert(session_id.to_string(), snapshot);
    }

    async fn enter(&self, op: &str) -> Result<(), ClientError> {
        let failure = {
            let mut inner = self.inner.lock();
            *inner.calls.entry(op.to_string()).or_default() += 1;
            inner.failures.get(op).cloned()
        };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn update(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut ServerSnapshot) -> Result<(), ClientError>,
    ) -> Result<SessionEnvelope, ClientError> {
        let mut inner = self.inner.lock();
        let snapshot = inner.sessions.get_mut(session_id).ok_or_else(not_found)?;
        f(snapshot)?;
        snapshot.recommended_step = Some(recommend(snapshot));
        Ok(envelope(snapshot))
    }
}

fn not_found() -> ClientError {
    ClientError::Api {
        status: 404,
        detail: Some("Session not found or expired.".into()),
    }
}

fn envelope(snapshot: &ServerSnapshot) -> SessionEnvelope {
    SessionEnvelope {
        session_id: snapshot.session_id.clone(),
        expires_at: snapshot.expires_at,
        state: snapshot.clone(),
    }
}

fn recommend(snapshot: &ServerSnapshot) -> Step {
    let intake_done = snapshot.consent_confirmed && !snapshot.job_ad_text.trim().is_empty();
    if !intake_done {
        Step::Start
    } else if !snapshot.has_documents() {
        Step::Upload
    } else if !snapshot.has_profile() || !snapshot.unresolved_required_question_ids.is_empty() {
        Step::Questions
    } else {
        Step::Review
    }
}

fn apply_intake(snapshot: &mut ServerSnapshot, intake: &IntakePayload) {
    snapshot.company_name = intake.company_name.clone();
    snapshot.position_title = intake.position_title.clone();
    snapshot.job_ad_text = intake.job_ad_text.clone();
    snapshot.consent_confirmed = intake.consent_confirmed;
}

#[async_trait]
impl Backend for FakeBackend {
    async fn create_session(&self, request: &SessionStartRequest) -> Result<SessionEnvelope, ClientError> {
        self.enter("create_session").await?;
        let session_id = uuid::Uuid::new_v4().simple().to_string();
        let mut snapshot = ServerSnapshot {
            session_id: session_id.clone(),
            language: request.language.code().to_string(),
            template_id: Some("simple".into()),
            theme: Some(ThemeConfig {
                primary_hex: "#1F5AA8".into(),
                accent_hex: "#173A73".into(),
            }),
            expires_at: EXPIRES_AT,
            api_key_configured: true,
            ..ServerSnapshot::default()
        };
        apply_intake(&mut snapshot, &request.intake);
        snapshot.recommended_step = Some(recommend(&snapshot));

        let mut inner = self.inner.lock();
        inner.start_requests.push(request.clone());
        inner.created.push(session_id.clone());
        inner.sessions.insert(session_id, snapshot.clone());
        Ok(envelope(&snapshot))
    }

    async fn sync_intake(&self, session_id: &str, intake: &IntakePayload) -> Result<SessionEnvelope, ClientError> {
        self.enter("sync_intake").await?;
        self.inner
            .lock()
            .intake_requests
            .push((session_id.to_string(), intake.clone()));
        self.update(session_id, |s| {
            apply_intake(s, intake);
            Ok(())
        })
    }

    async fn fetch_state(&self, session_id: &str) -> Result<SessionEnvelope, ClientError> {
        self.enter("fetch_state").await?;
        self.update(session_id, |_| Ok(()))
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), ClientError> {
        self.enter("delete_session").await?;
        let mut inner = self.inner.lock();
        inner.deleted.push(session_id.to_string());
        inner.sessions.remove(session_id).map(|_| ()).ok_or_else(not_found)
    }

    async fn set_language(&self, session_id: &str, language: Language) -> Result<SessionEnvelope, ClientError> {
        self.enter("set_language").await?;
        self.update(session_id, |s| {
            s.language = language.code().to_string();
            Ok(())
        })
    }

    async fn upload_documents(&self, session_id: &str, files: &[UploadFile]) -> Result<SessionEnvelope, ClientError> {
        self.enter("upload_documents").await?;
        self.update(session_id, |s| {
            for file in files {
                s.documents.push(DocumentMeta {
                    doc_id: format!("doc{}", s.documents.len() + 1),
                    filename: file.filename.clone(),
                    mime: file.mime.clone().unwrap_or_default(),
                    tag: file.tag.unwrap_or(DocTag::Other),
                    parse_method: "pdf_text".into(),
                    confidence: 0.9,
                    size_bytes: file.bytes.len() as u64,
                });
            }
            Ok(())
        })
    }

    async fn upload_photo(&self, session_id: &str, _file: &UploadFile) -> Result<SessionEnvelope, ClientError> {
        self.enter("upload_photo").await?;
        self.update(session_id, |_| Ok(()))
    }

    async fn extract(
        &self,
        session_id: &str,
        tag_overrides: &BTreeMap<String, DocTag>,
    ) -> Result<SessionEnvelope, ClientError> {
        self.enter("extract").await?;
        self.update(session_id, |s| {
            for doc in &mut s.documents {
                if let Some(tag) = tag_overrides.get(&doc.doc_id) {
                    doc.tag = *tag;
                }
            }
            s.profile = ExtractedProfile {
                full_name: "Jane Doe".into(),
                ..ExtractedProfile::default()
            };
            s.questions = vec![Question {
                question_id: "q_email".into(),
                field_path: "email".into(),
                prompt: "What is your email address?".into(),
                required: true,
                reason: "missing".into(),
                options: vec![],
            }];
            s.unresolved_required_question_ids = vec!["q_email".into()];
            s.ready_to_generate = false;
            Ok(())
        })
    }

    async fn save_answers(
        &self,
        session_id: &str,
        answers: &BTreeMap<String, String>,
    ) -> Result<SessionEnvelope, ClientError> {
        self.enter("save_answers").await?;
        self.update(session_id, |s| {
            for (id, value) in answers {
                s.answers.insert(id.clone(), value.clone());
            }
            let answered = &s.answers;
            s.unresolved_required_question_ids
                .retain(|id| answered.get(id).map_or(true, |v| v.trim().is_empty()));
            s.ready_to_generate = s.unresolved_required_question_ids.is_empty();
            Ok(())
        })
    }

    async fn generate(&self, session_id: &str, request: &GenerateRequest) -> Result<GenerateResponse, ClientError> {
        self.enter("generate").await?;
        let inner = self.inner.lock();
        let snapshot = inner.sessions.get(session_id).ok_or_else(not_found)?;
        if !snapshot.unresolved_required_question_ids.is_empty() {
            return Err(ClientError::UnresolvedQuestions(
                snapshot.unresolved_required_question_ids.clone(),
            ));
        }
        Ok(GenerateResponse {
            token: format!("artifact-{}-{}", request.template_id, session_id),
            filename_cv: "cv.pdf".into(),
            filename_cover: "cover_letter.pdf".into(),
            warning: None,
            result_url: Some(format!("/result/{session_id}")),
        })
    }
}
