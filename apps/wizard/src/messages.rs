//! Notification texts shown by the action wrapper, in both UI languages.

use serde::{Deserialize, Serialize};

/// UI language. The server is authoritative once a session exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    De,
}

impl Language {
    /// Anything other than `de` is English.
    pub fn parse(code: &str) -> Self {
        if code.trim().eq_ignore_ascii_case("de") {
            Language::De
        } else {
            Language::En
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::De => "de",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKey {
    SessionStarted,
    DocumentsUploaded,
    ExtractionRefreshed,
    AnswersSaved,
    FilesGenerated,
    SessionCleared,
    SessionRefreshed,
    LanguageUpdated,
    RequestFailed,
    ActionFailed,
    StartSessionFirst,
    SelectFilesFirst,
    RequiredUnresolved,
}

pub fn text(language: Language, key: MessageKey) -> &'static str {
    use MessageKey::*;
    match (language, key) {
        (Language::En, SessionStarted) => "Session started.",
        (Language::En, DocumentsUploaded) => "Documents uploaded.",
        (Language::En, ExtractionRefreshed) => "Extraction refreshed.",
        (Language::En, AnswersSaved) => "Answers saved.",
        (Language::En, FilesGenerated) => "Files generated.",
        (Language::En, SessionCleared) => "Session cleared.",
        (Language::En, SessionRefreshed) => "Session refreshed.",
        (Language::En, LanguageUpdated) => "Language updated.",
        (Language::En, RequestFailed) => "Request failed.",
        (Language::En, ActionFailed) => "Action failed.",
        (Language::En, StartSessionFirst) => "Start a session first.",
        (Language::En, SelectFilesFirst) => "Select files first.",
        (Language::En, RequiredUnresolved) => "Required questions unresolved",

        (Language::De, SessionStarted) => "Sitzung gestartet.",
        (Language::De, DocumentsUploaded) => "Dokumente hochgeladen.",
        (Language::De, ExtractionRefreshed) => "Extraktion aktualisiert.",
        (Language::De, AnswersSaved) => "Antworten gespeichert.",
        (Language::De, FilesGenerated) => "Dateien generiert.",
        (Language::De, SessionCleared) => "Sitzung gelöscht.",
        (Language::De, SessionRefreshed) => "Sitzung aktualisiert.",
        (Language::De, LanguageUpdated) => "Sprache aktualisiert.",
        (Language::De, RequestFailed) => "Anfrage fehlgeschlagen.",
        (Language::De, ActionFailed) => "Aktion fehlgeschlagen.",
        (Language::De, StartSessionFirst) => "Bitte zuerst eine Sitzung starten.",
        (Language::De, SelectFilesFirst) => "Bitte zuerst Dateien auswählen.",
        (Language::De, RequiredUnresolved) => "Pflichtfragen noch offen",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults_to_english() {
        assert_eq!(Language::parse("de"), Language::De);
        assert_eq!(Language::parse(" DE "), Language::De);
        assert_eq!(Language::parse("fr"), Language::En);
        assert_eq!(Language::parse(""), Language::En);
    }

    #[test]
    fn test_texts_differ_per_language() {
        assert_ne!(
            text(Language::En, MessageKey::SessionCleared),
            text(Language::De, MessageKey::SessionCleared)
        );
    }
}
