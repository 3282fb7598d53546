//! HTTP implementation of the session API.
//!
//! The only place the engine talks to the network. Responses are decoded
//! into `SessionEnvelope`s; failures carry the server's `detail` so the
//! action wrapper can surface it verbatim.
//!
//! No request timeout is configured beyond the transport defaults: a hung
//! call keeps the caller's busy state engaged until it settles.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::backend::{Backend, GenerateRequest, GenerateResponse, SessionStartRequest, UploadFile};
use crate::errors::ClientError;
use crate::messages::Language;
use crate::models::{DocTag, IntakePayload, SessionEnvelope};

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    /// `base_url` includes any root path the backend is mounted under.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder().build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn session_endpoint(&self, session_id: &str, action: &str) -> String {
        self.endpoint(&format!("/api/session/{session_id}{action}"))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn create_session(&self, request: &SessionStartRequest) -> Result<SessionEnvelope, ClientError> {
        debug!("POST /api/session/start");
        let response = self
            .client
            .post(self.endpoint("/api/session/start"))
            .json(request)
            .send()
            .await?;
        parse_json_response(response).await
    }

    async fn sync_intake(&self, session_id: &str, intake: &IntakePayload) -> Result<SessionEnvelope, ClientError> {
        let response = self
            .client
            .post(self.session_endpoint(session_id, "/intake"))
            .json(intake)
            .send()
            .await?;
        parse_json_response(response).await
    }

    async fn fetch_state(&self, session_id: &str) -> Result<SessionEnvelope, ClientError> {
        let response = self
            .client
            .get(self.session_endpoint(session_id, "/state"))
            .send()
            .await?;
        parse_json_response(response).await
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .delete(self.session_endpoint(session_id, ""))
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Api {
            status: status.as_u16(),
            detail: error_detail(&body),
        })
    }

    async fn set_language(&self, session_id: &str, language: Language) -> Result<SessionEnvelope, ClientError> {
        let response = self
            .client
            .post(self.session_endpoint(session_id, "/language"))
            .json(&json!({ "language": language }))
            .send()
            .await?;
        parse_json_response(response).await
    }

    async fn upload_documents(&self, session_id: &str, files: &[UploadFile]) -> Result<SessionEnvelope, ClientError> {
        let mut form = Form::new();
        for file in files {
            form = form.part("files", file_part(file)?);
            if let Some(tag) = file.tag {
                form = form.text("tags", tag.as_str());
            }
        }
        debug!("Uploading {} documents", files.len());
        let response = self
            .client
            .post(self.session_endpoint(session_id, "/upload"))
            .multipart(form)
            .send()
            .await?;
        parse_json_response(response).await
    }

    async fn upload_photo(&self, session_id: &str, file: &UploadFile) -> Result<SessionEnvelope, ClientError> {
        let form = Form::new().part("file", file_part(file)?);
        let response = self
            .client
            .post(self.session_endpoint(session_id, "/photo"))
            .multipart(form)
            .send()
            .await?;
        parse_json_response(response).await
    }

    async fn extract(
        &self,
        session_id: &str,
        tag_overrides: &BTreeMap<String, DocTag>,
    ) -> Result<SessionEnvelope, ClientError> {
        let response = self
            .client
            .post(self.session_endpoint(session_id, "/extract"))
            .json(&json!({ "tag_overrides": tag_overrides }))
            .send()
            .await?;
        parse_json_response(response).await
    }

    async fn save_answers(
        &self,
        session_id: &str,
        answers: &BTreeMap<String, String>,
    ) -> Result<SessionEnvelope, ClientError> {
        let response = self
            .client
            .post(self.session_endpoint(session_id, "/answer"))
            .json(&json!({ "answers": answers }))
            .send()
            .await?;
        parse_json_response(response).await
    }

    async fn generate(&self, session_id: &str, request: &GenerateRequest) -> Result<GenerateResponse, ClientError> {
        let response = self
            .client
            .post(self.session_endpoint(session_id, "/generate"))
            .json(request)
            .send()
            .await?;

        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            let body = response.text().await.unwrap_or_default();
            if let Some(ids) = unresolved_question_ids(&body) {
                return Err(ClientError::UnresolvedQuestions(ids));
            }
            return Err(ClientError::Api {
                status: StatusCode::UNPROCESSABLE_ENTITY.as_u16(),
                detail: error_detail(&body),
            });
        }
        parse_json_response(response).await
    }
}

fn file_part(file: &UploadFile) -> Result<Part, ClientError> {
    let part = Part::bytes(file.bytes.clone()).file_name(file.filename.clone());
    match file.mime.as_deref() {
        Some(mime) => Ok(part.mime_str(mime)?),
        None => Ok(part),
    }
}

async fn parse_json_response<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }
    let body = response.text().await.unwrap_or_default();
    debug!("Backend returned {}: {}", status, body);
    Err(ClientError::Api {
        status: status.as_u16(),
        detail: error_detail(&body),
    })
}

/// Extracts the human-readable failure detail from an error body.
///
/// A string `detail` is taken as-is; a structured `detail` (or a payload
/// without one) is rendered as compact JSON. Non-JSON bodies yield `None`
/// so callers fall back to a generic message.
fn error_detail(body: &str) -> Option<String> {
    let payload: Value = serde_json::from_str(body).ok()?;
    match payload.get("detail") {
        Some(Value::String(detail)) => Some(detail.clone()),
        Some(Value::Null) | None => Some(payload.to_string()),
        Some(detail) => Some(detail.to_string()),
    }
}

#[derive(Deserialize)]
struct ValidationBody {
    detail: ValidationDetail,
}

#[derive(Deserialize)]
struct ValidationDetail {
    unresolved_question_ids: Vec<String>,
}

fn unresolved_question_ids(body: &str) -> Option<Vec<String>> {
    serde_json::from_str::<ValidationBody>(body)
        .ok()
        .map(|b| b.detail.unresolved_question_ids)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        extract::{Multipart, Path},
        http::StatusCode as AxumStatus,
        routing::{delete, get, post},
        Json, Router,
    };
    use serde_json::json;

    use super::*;
    use crate::models::Step;

    fn state_body(session_id: &str, step: &str) -> Value {
        json!({
            "session_id": session_id,
            "expires_at": 1_700_000_000.0,
            "state": {
                "session_id": session_id,
                "language": "en",
                "recommended_step": step,
                "documents": [],
                "questions": [],
                "answers": {},
                "unresolved_required_question_ids": [],
                "ready_to_generate": false,
                "expires_at": 1_700_000_000.0,
                "api_key_configured": true
            }
        })
    }

    async fn serve(router: Router) -> HttpBackend {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        HttpBackend::new(format!("http://{addr}/")).unwrap()
    }

    #[test]
    fn test_error_detail_string() {
        assert_eq!(
            error_detail(r#"{"detail": "Session not found or expired."}"#).as_deref(),
            Some("Session not found or expired.")
        );
    }

    #[test]
    fn test_error_detail_structured() {
        assert_eq!(
            error_detail(r#"{"detail": {"message": "bad"}}"#).as_deref(),
            Some(r#"{"message":"bad"}"#)
        );
        assert_eq!(
            error_detail(r#"{"error": "boom"}"#).as_deref(),
            Some(r#"{"error":"boom"}"#)
        );
    }

    #[test]
    fn test_error_detail_non_json() {
        assert_eq!(error_detail("<html>502 Bad Gateway</html>"), None);
        assert_eq!(error_detail(""), None);
    }

    #[test]
    fn test_unresolved_ids_parsed_from_validation_body() {
        let body = r#"{"detail": {"message": "Required questions unresolved.", "unresolved_question_ids": ["q1", "q2"]}}"#;
        assert_eq!(unresolved_question_ids(body), Some(vec!["q1".to_string(), "q2".to_string()]));
        assert_eq!(unresolved_question_ids(r#"{"detail": "nope"}"#), None);
    }

    #[tokio::test]
    async fn test_create_session_posts_intake_and_decodes_envelope() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::default();
        let captured = seen.clone();
        let router = Router::new().route(
            "/api/session/start",
            post(move |Json(body): Json<Value>| {
                let captured = captured.clone();
                async move {
                    *captured.lock().unwrap() = Some(body);
                    Json(state_body("sess-abc", "upload"))
                }
            }),
        );
        let backend = serve(router).await;

        let envelope = backend
            .create_session(&SessionStartRequest {
                language: Language::En,
                intake: IntakePayload {
                    company_name: "Acme".into(),
                    position_title: "Engineer".into(),
                    job_ad_text: String::new(),
                    consent_confirmed: true,
                },
            })
            .await
            .unwrap();

        assert_eq!(envelope.session_id, "sess-abc");
        assert_eq!(envelope.state.recommended_step(), Step::Upload);
        let body = seen.lock().unwrap().clone().unwrap();
        assert_eq!(body["company_name"], "Acme");
        assert_eq!(body["consent_confirmed"], true);
        assert_eq!(body["language"], "en");
    }

    #[tokio::test]
    async fn test_fetch_state_maps_404_detail() {
        let router = Router::new().route(
            "/api/session/:id/state",
            get(|| async {
                (
                    AxumStatus::NOT_FOUND,
                    Json(json!({"detail": "Session not found or expired."})),
                )
            }),
        );
        let backend = serve(router).await;

        let err = backend.fetch_state("gone").await.unwrap_err();
        assert!(err.is_session_invalid());
        assert_eq!(err.user_message(Language::En), "Session not found or expired.");
    }

    #[tokio::test]
    async fn test_sync_intake_hits_session_path() {
        let router = Router::new().route(
            "/api/session/:id/intake",
            post(|Path(id): Path<String>, Json(body): Json<Value>| async move {
                assert_eq!(body["position_title"], "Engineer");
                Json(state_body(&id, "start"))
            }),
        );
        let backend = serve(router).await;
        let envelope = backend
            .sync_intake(
                "sess-1",
                &IntakePayload {
                    position_title: "Engineer".into(),
                    ..IntakePayload::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(envelope.session_id, "sess-1");
    }

    #[tokio::test]
    async fn test_generate_422_yields_unresolved_questions() {
        let router = Router::new().route(
            "/api/session/:id/generate",
            post(|| async {
                (
                    AxumStatus::UNPROCESSABLE_ENTITY,
                    Json(json!({"detail": {
                        "message": "Required questions unresolved.",
                        "unresolved_question_ids": ["q_email"]
                    }})),
                )
            }),
        );
        let backend = serve(router).await;
        let err = backend
            .generate(
                "sess-1",
                &GenerateRequest {
                    template_id: "simple".into(),
                    primary_color: "#1F5AA8".into(),
                    accent_color: "#173A73".into(),
                },
            )
            .await
            .unwrap_err();
        match err {
            ClientError::UnresolvedQuestions(ids) => assert_eq!(ids, vec!["q_email"]),
            other => panic!("expected UnresolvedQuestions, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_upload_sends_files_and_tags() {
        let parts: Arc<Mutex<Vec<(String, String)>>> = Arc::default();
        let captured = parts.clone();
        let router = Router::new().route(
            "/api/session/:id/upload",
            post(move |Path(id): Path<String>, mut multipart: Multipart| {
                let captured = captured.clone();
                async move {
                    while let Some(field) = multipart.next_field().await.unwrap() {
                        let name = field.name().unwrap_or_default().to_string();
                        let file_name = field.file_name().map(str::to_string);
                        let value = match file_name {
                            Some(file_name) => file_name,
                            None => field.text().await.unwrap(),
                        };
                        captured.lock().unwrap().push((name, value));
                    }
                    Json(state_body(&id, "questions"))
                }
            }),
        );
        let backend = serve(router).await;
        let files = vec![
            UploadFile {
                filename: "cv.pdf".into(),
                mime: Some("application/pdf".into()),
                bytes: b"%PDF-1.4".to_vec(),
                tag: Some(DocTag::Cv),
            },
            UploadFile {
                filename: "zeugnis.pdf".into(),
                mime: None,
                bytes: b"%PDF-1.4".to_vec(),
                tag: None,
            },
        ];
        let envelope = backend.upload_documents("sess-1", &files).await.unwrap();
        assert_eq!(envelope.state.recommended_step(), Step::Questions);
        assert_eq!(
            *parts.lock().unwrap(),
            vec![
                ("files".to_string(), "cv.pdf".to_string()),
                ("tags".to_string(), "cv".to_string()),
                ("files".to_string(), "zeugnis.pdf".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_session_reports_failure() {
        let router = Router::new().route(
            "/api/session/:id",
            delete(|| async { AxumStatus::INTERNAL_SERVER_ERROR }),
        );
        let backend = serve(router).await;
        let err = backend.delete_session("sess-1").await.unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 500, detail: None }));
    }
}
