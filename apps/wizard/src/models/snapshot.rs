use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::messages::Language;

/// Wizard phases, in order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    #[default]
    Start,
    Upload,
    Questions,
    Review,
    Result,
}

impl Step {
    pub const ORDER: [Step; 5] = [
        Step::Start,
        Step::Upload,
        Step::Questions,
        Step::Review,
        Step::Result,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Step::Start => "start",
            Step::Upload => "upload",
            Step::Questions => "questions",
            Step::Review => "review",
            Step::Result => "result",
        }
    }

    /// 1-based position in the wizard.
    pub fn index(self) -> usize {
        Step::ORDER.iter().position(|s| *s == self).unwrap_or(0) + 1
    }

    pub fn progress_percent(self) -> u8 {
        match self {
            Step::Start => 0,
            Step::Upload => 25,
            Step::Questions => 50,
            Step::Review => 75,
            Step::Result => 100,
        }
    }
}

impl std::str::FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Step::ORDER
            .into_iter()
            .find(|step| step.as_str() == s.trim())
            .ok_or_else(|| format!("unknown wizard step '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocTag {
    Cv,
    CoverLetter,
    Arbeitszeugnis,
    Certificate,
    Other,
}

impl DocTag {
    pub fn as_str(self) -> &'static str {
        match self {
            DocTag::Cv => "cv",
            DocTag::CoverLetter => "cover_letter",
            DocTag::Arbeitszeugnis => "arbeitszeugnis",
            DocTag::Certificate => "certificate",
            DocTag::Other => "other",
        }
    }
}

impl std::str::FromStr for DocTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "cv" => Ok(DocTag::Cv),
            "cover_letter" => Ok(DocTag::CoverLetter),
            "arbeitszeugnis" => Ok(DocTag::Arbeitszeugnis),
            "certificate" => Ok(DocTag::Certificate),
            "other" => Ok(DocTag::Other),
            other => Err(format!("unknown document tag '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub doc_id: String,
    pub filename: String,
    #[serde(default)]
    pub mime: String,
    pub tag: DocTag,
    #[serde(default)]
    pub parse_method: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub question_id: String,
    #[serde(default)]
    pub field_path: String,
    pub prompt: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub options: Vec<String>,
}

/// Review-time scoring payload. Opaque to the engine beyond display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPayload {
    pub overall_score: f64,
    #[serde(default)]
    pub category_scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub matched_keywords: Vec<String>,
    #[serde(default)]
    pub missing_keywords: Vec<String>,
    #[serde(default)]
    pub ats_issues: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    pub primary_hex: String,
    pub accent_hex: String,
}

/// Only the fields needed to tell whether a profile has been established.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedProfile {
    pub full_name: String,
    pub summary: String,
    pub skills: Vec<Value>,
    pub experience: Vec<Value>,
    pub education: Vec<Value>,
}

impl ExtractedProfile {
    pub fn has_data(&self) -> bool {
        !self.full_name.is_empty()
            || !self.summary.is_empty()
            || !self.skills.is_empty()
            || !self.experience.is_empty()
            || !self.education.is_empty()
    }
}

/// Authoritative mirror of the server's wizard state.
///
/// Never edited in place: the reconciler swaps the whole value for each
/// fresh response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSnapshot {
    pub session_id: String,
    pub recommended_step: Option<Step>,
    pub phase: Option<Step>,
    pub language: String,
    pub company_name: String,
    pub position_title: String,
    pub job_ad_text: String,
    pub consent_confirmed: bool,
    pub documents: Vec<DocumentMeta>,
    pub profile: ExtractedProfile,
    pub questions: Vec<Question>,
    pub answers: BTreeMap<String, String>,
    pub unresolved_required_question_ids: Vec<String>,
    pub review_match: Option<MatchPayload>,
    pub template_id: Option<String>,
    pub theme: Option<ThemeConfig>,
    pub ready_to_generate: bool,
    pub extraction_warning: String,
    pub expires_at: f64,
    pub api_key_configured: bool,
}

impl ServerSnapshot {
    /// Server-computed step, falling back to the legacy `phase` field.
    pub fn recommended_step(&self) -> Step {
        self.recommended_step.or(self.phase).unwrap_or_default()
    }

    pub fn language(&self) -> Language {
        Language::parse(&self.language)
    }

    pub fn has_documents(&self) -> bool {
        !self.documents.is_empty()
    }

    pub fn has_profile(&self) -> bool {
        self.profile.has_data()
    }
}

/// Response envelope shared by every session endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEnvelope {
    pub session_id: String,
    #[serde(default)]
    pub expires_at: f64,
    pub state: ServerSnapshot,
}
