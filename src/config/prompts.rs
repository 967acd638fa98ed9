//! Prompt templates for Vidya.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use crate::agent::AgentDefinitions;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("Invalid regex"));

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub orchestrator: OrchestratorPrompts,
    pub explanation: ExplanationPrompts,
    pub mock_exam: MockExamPrompts,
    /// Per-topic agent definitions.
    pub agents: AgentDefinitions,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for the chat orchestration loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorPrompts {
    /// System directive prepended to every turn.
    pub system: String,
}

impl Default for OrchestratorPrompts {
    fn default() -> Self {
        Self {
            system: "You are an experienced AI Tutor helping users prepare for their {{exam_name}} exam. \
Always respond in {{language}} irrespective of the language of the user query. \
Maintain a positive tone. Follow all information and instructions received from tools."
                .to_string(),
        }
    }
}

/// Prompts for explaining a submitted exam answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplanationPrompts {
    /// Instructions prefixed to the user's answer message.
    pub prefix: String,
}

impl Default for ExplanationPrompts {
    fn default() -> Self {
        Self {
            prefix: r#"You are an expert certification exam tutor providing detailed explanations for exam answers.

Always respond in {{language}} language.

Your task is to:
1. Analyze the question and the user's response as given below.
2. Explain whether the answer is correct or incorrect and why.
3. Provide educational context about the topic.
4. Give practical examples when relevant, following the cultural context of the user's language.
5. Suggest study tips for similar questions.

Be thorough, educational, and encouraging in your explanations.

---

"#
            .to_string(),
        }
    }
}

/// Prompts for adaptive mock exam question selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MockExamPrompts {
    pub user: String,
    /// Text used in place of the history on the first question.
    pub first_question: String,
}

impl Default for MockExamPrompts {
    fn default() -> Self {
        Self {
            user: r#"You are an experienced examiner who sets questions for certification exams.
You will be given sample questions for an exam. Select questions based on the examinee's performance:
if the examinee answers a topic correctly, ask another question from the same topic with increased difficulty;
if they answer that as well, move to another topic. Gradually increase difficulty and make sure all topics are covered.

EXAM NAME: {{exam_name}}

SAMPLE QUESTIONS:
{{sample_questions}}

PREVIOUSLY ASKED QUESTIONS and RESULTS:
{{previous_questions}}

Only select a new question from the given sample questions. Never repeat a question asked previously.
Output a single JSON object in exactly the same format as the sample questions, and nothing else.

QUESTION
"#
            .to_string(),
            first_question: "This is the first question, so no previous questions are available."
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let orchestrator_path = custom_path.join("orchestrator.toml");
            if orchestrator_path.exists() {
                let content = std::fs::read_to_string(&orchestrator_path)?;
                prompts.orchestrator = toml::from_str(&content)?;
            }

            let explanation_path = custom_path.join("explanation.toml");
            if explanation_path.exists() {
                let content = std::fs::read_to_string(&explanation_path)?;
                prompts.explanation = toml::from_str(&content)?;
            }

            let mock_exam_path = custom_path.join("mock_exam.toml");
            if mock_exam_path.exists() {
                let content = std::fs::read_to_string(&mock_exam_path)?;
                prompts.mock_exam = toml::from_str(&content)?;
            }

            let agents_path = custom_path.join("agents.toml");
            if agents_path.exists() {
                let content = std::fs::read_to_string(&agents_path)?;
                prompts.agents = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// Placeholders are substituted in one pass, so `{{...}}` inside a value is
    /// left as written. Unknown placeholders are kept.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        PLACEHOLDER
            .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_does_not_expand_values() {
        for _ in 0..20 {
            let vars = HashMap::from([
                ("user_query".to_string(), "what is {{exam_name}}?".to_string()),
                ("exam_name".to_string(), "MF".to_string()),
            ]);
            assert_eq!(
                Prompts::render("{{exam_name}} Q: {{user_query}} {{missing}}", &vars),
                "MF Q: what is {{exam_name}}? {{missing}}"
            );
        }
    }

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(prompts.orchestrator.system.contains("{{language}}"));
        assert!(prompts.explanation.prefix.contains("{{language}}"));
        assert!(!prompts.agents.tutor.role.is_empty());
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_provided_vars_override_custom() {
        let mut prompts = Prompts::default();
        prompts
            .variables
            .insert("language".to_string(), "Hindi".to_string());
        prompts
            .variables
            .insert("exam_name".to_string(), "MF Foundation".to_string());

        let mut vars = HashMap::new();
        vars.insert("language".to_string(), "Marathi".to_string());

        let rendered = prompts.render_with_custom("{{exam_name}} in {{language}}", &vars);
        assert_eq!(rendered, "MF Foundation in Marathi");
    }
}
