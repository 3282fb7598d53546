//! Backend session API, as seen from the client.
//!
//! Every endpoint the engine drives goes through the `Backend` trait. The
//! production implementation is `HttpBackend`; tests swap in an in-memory
//! fake without touching any caller.

pub mod http;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ClientError;
use crate::messages::Language;
use crate::models::{DocTag, IntakePayload, SessionEnvelope};

pub use http::HttpBackend;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStartRequest {
    pub language: Language,
    #[serde(flatten)]
    pub intake: IntakePayload,
}

/// A file picked for upload, with its optional manual tag.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub filename: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
    pub tag: Option<DocTag>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub template_id: String,
    pub primary_color: String,
    pub accent_color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub token: String,
    #[serde(default)]
    pub filename_cv: String,
    #[serde(default)]
    pub filename_cover: String,
    #[serde(default)]
    pub warning: Option<String>,
    #[serde(default)]
    pub result_url: Option<String>,
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn create_session(&self, request: &SessionStartRequest) -> Result<SessionEnvelope, ClientError>;

    async fn sync_intake(&self, session_id: &str, intake: &IntakePayload) -> Result<SessionEnvelope, ClientError>;

    /// Any failure here means the session is unusable.
    async fn fetch_state(&self, session_id: &str) -> Result<SessionEnvelope, ClientError>;

    async fn delete_session(&self, session_id: &str) -> Result<(), ClientError>;

    async fn set_language(&self, session_id: &str, language: Language) -> Result<SessionEnvelope, ClientError>;

    async fn upload_documents(&self, session_id: &str, files: &[UploadFile]) -> Result<SessionEnvelope, ClientError>;

    async fn upload_photo(&self, session_id: &str, file: &UploadFile) -> Result<SessionEnvelope, ClientError>;

    async fn extract(
        &self,
        session_id: &str,
        tag_overrides: &BTreeMap<String, DocTag>,
    ) -> Result<SessionEnvelope, ClientError>;

    async fn save_answers(
        &self,
        session_id: &str,
        answers: &BTreeMap<String, String>,
    ) -> Result<SessionEnvelope, ClientError>;

    async fn generate(&self, session_id: &str, request: &GenerateRequest) -> Result<GenerateResponse, ClientError>;
}
