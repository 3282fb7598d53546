use serde::{Deserialize, Serialize};

use crate::messages::Language;

pub const DEFAULT_TEMPLATE: &str = "simple";
pub const DEFAULT_PRIMARY: &str = "#1F5AA8";
pub const DEFAULT_ACCENT: &str = "#173A73";

/// User-editable working copy of intake and preference fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalDraft {
    pub language: Language,
    pub company: String,
    pub position: String,
    pub job_ad: String,
    pub consent: bool,
    pub template_id: String,
    pub primary_color: String,
    pub accent_color: String,
}

impl Default for LocalDraft {
    fn default() -> Self {
        Self {
            language: Language::En,
            company: String::new(),
            position: String::new(),
            job_ad: String::new(),
            consent: false,
            template_id: DEFAULT_TEMPLATE.to_string(),
            primary_color: DEFAULT_PRIMARY.to_string(),
            accent_color: DEFAULT_ACCENT.to_string(),
        }
    }
}

/// Full intake payload. Always sent whole, never as a diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakePayload {
    pub company_name: String,
    pub position_title: String,
    pub job_ad_text: String,
    pub consent_confirmed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DraftField {
    Company,
    Position,
    JobAd,
    Consent,
    Template,
    PrimaryColor,
    AccentColor,
}

impl DraftField {
    pub const INTAKE: [DraftField; 4] = [
        DraftField::Company,
        DraftField::Position,
        DraftField::JobAd,
        DraftField::Consent,
    ];

    /// Intake fields are the ones that trigger a debounced sync.
    pub fn is_intake(self) -> bool {
        DraftField::INTAKE.contains(&self)
    }
}

/// A single keystroke or selection.
#[derive(Debug, Clone, PartialEq)]
pub enum DraftEdit {
    Company(String),
    Position(String),
    JobAd(String),
    Consent(bool),
    Template(String),
    PrimaryColor(String),
    AccentColor(String),
}

impl LocalDraft {
    pub fn intake(&self) -> IntakePayload {
        IntakePayload {
            company_name: self.company.clone(),
            position_title: self.position.clone(),
            job_ad_text: self.job_ad.clone(),
            consent_confirmed: self.consent,
        }
    }

    /// Enough signal to justify starting a session: any identifying text,
    /// or explicit consent.
    pub fn has_start_signal(&self) -> bool {
        let has_text = !self.company.trim().is_empty()
            || !self.position.trim().is_empty()
            || !self.job_ad.trim().is_empty();
        has_text || self.consent
    }

    pub fn apply(&mut self, edit: DraftEdit) -> DraftField {
        match edit {
            DraftEdit::Company(v) => {
                self.company = v;
                DraftField::Company
            }
            DraftEdit::Position(v) => {
                self.position = v;
                DraftField::Position
            }
            DraftEdit::JobAd(v) => {
                self.job_ad = v;
                DraftField::JobAd
            }
            DraftEdit::Consent(v) => {
                self.consent = v;
                DraftField::Consent
            }
            DraftEdit::Template(v) => {
                self.template_id = v;
                DraftField::Template
            }
            DraftEdit::PrimaryColor(v) => {
                self.primary_color = v;
                DraftField::PrimaryColor
            }
            DraftEdit::AccentColor(v) => {
                self.accent_color = v;
                DraftField::AccentColor
            }
        }
    }

    /// True when the field still holds what was last sent in `sent`.
    pub fn intake_field_matches(&self, field: DraftField, sent: &IntakePayload) -> bool {
        match field {
            DraftField::Company => self.company == sent.company_name,
            DraftField::Position => self.position == sent.position_title,
            DraftField::JobAd => self.job_ad == sent.job_ad_text,
            DraftField::Consent => self.consent == sent.consent_confirmed,
            _ => false,
        }
    }

    pub fn field_is_empty(&self, field: DraftField) -> bool {
        match field {
            DraftField::Company => self.company.is_empty(),
            DraftField::Position => self.position.is_empty(),
            DraftField::JobAd => self.job_ad.is_empty(),
            DraftField::Consent => !self.consent,
            DraftField::Template => self.template_id.is_empty(),
            DraftField::PrimaryColor => self.primary_color.is_empty(),
            DraftField::AccentColor => self.accent_color.is_empty(),
        }
    }
}
