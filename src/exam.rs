//! Adaptive mock exam questions.
//!
//! The model is shown the exam's question bank and the questions already
//! asked (with the examinee's results) and picks the next question.

use crate::config::{ExamSettings, Prompts, Settings};
use crate::error::{Result, VidyaError};
use crate::llm::{ChatMessage, ChatModel};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Selects the next mock exam question with one model call.
pub struct QuestionGenerator {
    model: Arc<dyn ChatModel>,
    prompts: Prompts,
}

impl QuestionGenerator {
    pub fn new(model: Arc<dyn ChatModel>, prompts: Prompts) -> Self {
        Self { model, prompts }
    }

    /// Read a question bank: a JSON array of question objects.
    pub async fn load_question_bank(path: &Path) -> Result<Vec<Value>> {
        let content = tokio::fs::read_to_string(path).await?;
        match serde_json::from_str(&content)? {
            Value::Array(questions) => Ok(questions),
            _ => Err(VidyaError::InvalidInput(format!(
                "Question bank {:?} must be a JSON array",
                path
            ))),
        }
    }

    /// One line per sample question.
    pub fn render_sample_questions(questions: &[Value]) -> String {
        questions
            .iter()
            .enumerate()
            .map(|(i, q)| format!("Question {}: {}\n", i + 1, q))
            .collect()
    }

    /// Pretty-printed previous questions separated by rules.
    pub fn render_previous_questions(questions: &[Value]) -> String {
        questions
            .iter()
            .enumerate()
            .map(|(i, q)| {
                let pretty = serde_json::to_string_pretty(q).unwrap_or_else(|_| q.to_string());
                format!("Question {}:\n{}\n{}\n", i + 1, pretty, "-".repeat(50))
            })
            .collect()
    }

    /// Render the selection prompt.
    pub fn build_prompt(&self, exam_name: &str, bank: &[Value], previous: &[Value], is_initial: bool) -> String {
        let previous_questions = if is_initial {
            self.prompts.mock_exam.first_question.clone()
        } else {
            Self::render_previous_questions(previous)
        };

        let vars = HashMap::from([
            ("exam_name".to_string(), exam_name.to_string()),
            ("sample_questions".to_string(), Self::render_sample_questions(bank)),
            ("previous_questions".to_string(), previous_questions),
        ]);
        self.prompts.render_with_custom(&self.prompts.mock_exam.user, &vars)
    }

    /// Pick the next question for an exam from the catalog.
    #[instrument(skip(self, settings, previous), fields(previous = previous.len()))]
    pub async fn next_question(
        &self,
        settings: &Settings,
        exam_id: &str,
        previous: &[Value],
        is_initial: bool,
    ) -> Result<Value> {
        let exam = settings
            .exams
            .get(exam_id)
            .ok_or_else(|| VidyaError::UnknownExam(exam_id.to_string()))?;
        self.next_question_for(exam, previous, is_initial).await
    }

    /// Pick the next question for a resolved exam.
    pub async fn next_question_for(&self, exam: &ExamSettings, previous: &[Value], is_initial: bool) -> Result<Value> {
        let path = exam
            .questions_path
            .as_deref()
            .map(Settings::expand_path)
            .ok_or_else(|| VidyaError::Config(format!("No question bank configured for {}", exam.name)))?;
        let bank = Self::load_question_bank(&path).await?;
        debug!("Loaded {} sample questions from {:?}", bank.len(), path);

        let prompt = self.build_prompt(&exam.name, &bank, previous, is_initial);
        let response = self.model.complete(&[ChatMessage::user(prompt)], &[]).await?;
        parse_question(&response.text())
    }
}

/// Parse the model's answer as a JSON object, tolerating a Markdown code fence.
pub fn parse_question(text: &str) -> Result<Value> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(body)
        .map_err(|e| VidyaError::Model(format!("Model returned an invalid question: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;
    use crate::llm::ModelDelta;
    use serde_json::json;
    use std::io::Write;

    fn bank() -> Vec<Value> {
        vec![
            json!({"question": "What does NAV stand for?", "options": ["A", "B"], "answer": "A"}),
            json!({"question": "Who regulates mutual funds?", "options": ["SEBI", "RBI"], "answer": "SEBI"}),
        ]
    }

    #[test]
    fn test_render_sample_questions() {
        let rendered = QuestionGenerator::render_sample_questions(&bank());
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Question 1: {"));
        assert!(lines[1].contains("Who regulates mutual funds?"));
    }

    #[test]
    fn test_render_previous_questions() {
        let previous = vec![json!({"question": "Q", "user_answer": "A", "correct": true})];
        let rendered = QuestionGenerator::render_previous_questions(&previous);
        assert!(rendered.starts_with("Question 1:\n{\n  \""));
        assert!(rendered.ends_with(&format!("}}\n{}\n", "-".repeat(50))));
    }

    #[test]
    fn test_build_prompt_first_question() {
        let generator = QuestionGenerator::new(Arc::new(ScriptedModel::new(vec![])), Prompts::default());
        let prompt = generator.build_prompt("MF Foundation", &bank(), &[json!({"ignored": true})], true);
        assert!(prompt.contains("EXAM NAME: MF Foundation"));
        assert!(prompt.contains("This is the first question"));
        assert!(!prompt.contains("ignored"));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn test_parse_question() {
        assert_eq!(parse_question(r#" {"question": "Q"} "#).unwrap(), json!({"question": "Q"}));
        assert_eq!(
            parse_question("```json\n{\"question\": \"Q\"}\n```").unwrap(),
            json!({"question": "Q"})
        );
        assert!(matches!(parse_question("Here is a question"), Err(VidyaError::Model(_))));
    }

    #[tokio::test]
    async fn test_next_question_from_bank_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::to_string(&bank()).unwrap()).unwrap();

        let exam = ExamSettings {
            name: "MF Foundation".to_string(),
            overview_path: None,
            questions_path: Some(file.path().to_string_lossy().to_string()),
            collection: None,
        };

        let model = Arc::new(ScriptedModel::new(vec![vec![ModelDelta::text(
            r#"{"question": "Who regulates mutual funds?", "options": ["SEBI", "RBI"], "answer": "SEBI"}"#,
        )]]));
        let generator = QuestionGenerator::new(model.clone(), Prompts::default());

        let question = generator.next_question_for(&exam, &[], true).await.unwrap();
        assert_eq!(question["answer"], "SEBI");

        match &model.messages(0)[0] {
            ChatMessage::User { content } => assert!(content.text().contains("What does NAV stand for?")),
            other => panic!("Expected user prompt, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_exam() {
        let generator = QuestionGenerator::new(Arc::new(ScriptedModel::new(vec![])), Prompts::default());
        let err = generator
            .next_question(&Settings::default(), "nism_xyz", &[], true)
            .await
            .unwrap_err();
        assert!(matches!(err, VidyaError::UnknownExam(_)));
    }
}
