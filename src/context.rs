//! Request-scoped turn context.

use crate::config::{Settings, ExamSettings};
use crate::error::{Result, VidyaError};
use std::path::PathBuf;

/// Everything a turn needs to know about who it is answering.
///
/// Built once per request and passed explicitly to the orchestrator, tools and
/// agents. Nothing here is shared between requests.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnContext {
    /// Exam id from the catalog.
    pub exam_id: String,
    /// Display name of the exam.
    pub exam_name: String,
    /// Target response language name (e.g. "Hindi").
    pub language: String,
    /// Knowledge-base collection searched for this exam.
    pub collection: String,
    /// Exam overview file for the tutor agent.
    pub overview_path: Option<PathBuf>,
}

impl TurnContext {
    /// Resolve a context from an exam id and a language code.
    ///
    /// A missing exam falls back to the configured default; an unknown one is an error.
    /// Unknown language codes resolve to English.
    pub fn resolve(settings: &Settings, exam_id: Option<&str>, language_code: Option<&str>) -> Result<Self> {
        let exam_id = exam_id
            .filter(|id| !id.is_empty())
            .unwrap_or(&settings.orchestrator.default_exam);

        let exam = settings
            .exams
            .get(exam_id)
            .ok_or_else(|| VidyaError::UnknownExam(exam_id.to_string()))?;

        let language = settings.language_name(language_code.unwrap_or("en-US"));

        Ok(Self::from_exam(exam_id, exam, &language))
    }

    /// Build a context for a known catalog entry.
    pub fn from_exam(exam_id: &str, exam: &ExamSettings, language: &str) -> Self {
        Self {
            exam_id: exam_id.to_string(),
            exam_name: exam.name.clone(),
            language: language.to_string(),
            collection: exam.collection.clone().unwrap_or_else(|| exam_id.to_string()),
            overview_path: exam.overview_path.as_deref().map(Settings::expand_path),
        }
    }

    /// Read the exam overview, or an empty string when none is configured or readable.
    pub async fn exam_overview(&self) -> String {
        let Some(path) = &self.overview_path else {
            return String::new();
        };
        match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Could not read exam overview {:?}: {}", path, e);
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_defaults() {
        let settings = Settings::default();
        let ctx = TurnContext::resolve(&settings, None, None).unwrap();
        assert_eq!(ctx.exam_id, "investor_awareness");
        assert_eq!(ctx.language, "English");
        assert_eq!(ctx.collection, "investor_awareness");
    }

    #[test]
    fn test_resolve_language_and_exam() {
        let settings = Settings::default();
        let ctx = TurnContext::resolve(&settings, Some("mf_foundation"), Some("bn-IN")).unwrap();
        assert_eq!(ctx.language, "Bengali");
        assert!(ctx.exam_name.contains("Mutual Fund"));
    }

    #[test]
    fn test_resolve_unknown_exam() {
        let settings = Settings::default();
        let err = TurnContext::resolve(&settings, Some("nism_xyz"), None).unwrap_err();
        assert!(matches!(err, VidyaError::UnknownExam(_)));
    }

    #[tokio::test]
    async fn test_missing_overview_is_empty() {
        let mut ctx = TurnContext::resolve(&Settings::default(), None, None).unwrap();
        ctx.overview_path = Some(PathBuf::from("/nonexistent/overview.txt"));
        assert_eq!(ctx.exam_overview().await, "");
    }

    #[tokio::test]
    async fn test_overview_read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overview.txt");
        std::fs::write(&path, "Covers NAV and SIP.").unwrap();

        let mut ctx = TurnContext::resolve(&Settings::default(), None, None).unwrap();
        ctx.overview_path = Some(path);
        assert_eq!(ctx.exam_overview().await, "Covers NAV and SIP.");
    }
}
