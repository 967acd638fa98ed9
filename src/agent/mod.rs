//! Agent definitions and the bounded tool-calling runner.
//!
//! An agent definition is static configuration (role, goal, backstory, task
//! template and expected output) that parameterises one run of
//! [`AgentRunner`]. Definitions ship with defaults and can be overridden from
//! `agents.toml` in the custom prompts directory.

mod runner;

pub use runner::{AgentResponse, AgentRunner, ToolCallRecord};

use crate::error::{Result, VidyaError};
use serde::{Deserialize, Serialize};

/// One agent persona and its task template.
///
/// `task` is rendered with `{{var}}` substitution before each run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentDefinition {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub task: String,
    pub expected_output: String,
}

impl AgentDefinition {
    /// System message describing the persona.
    pub fn system_prompt(&self) -> String {
        format!(
            "You are {}. {}\n\nYour personal goal is: {}",
            self.role, self.backstory, self.goal
        )
    }
}

/// The shipped agent definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentDefinitions {
    /// Answers exam questions for the orchestrator.
    pub tutor: AgentDefinition,
    /// Explains why an MCQ answer is right or wrong.
    pub mcq_explainer: AgentDefinition,
    /// Checks a claim against study materials and the web.
    pub fact_checker: AgentDefinition,
}

impl AgentDefinitions {
    pub const NAMES: [&'static str; 3] = ["tutor", "mcq_explainer", "fact_checker"];

    /// Look up a definition by name.
    pub fn get(&self, name: &str) -> Result<&AgentDefinition> {
        match name {
            "tutor" => Ok(&self.tutor),
            "mcq_explainer" => Ok(&self.mcq_explainer),
            "fact_checker" => Ok(&self.fact_checker),
            other => Err(VidyaError::Agent(format!(
                "Unknown agent '{}'. Available: {}",
                other,
                Self::NAMES.join(", ")
            ))),
        }
    }
}

impl Default for AgentDefinitions {
    fn default() -> Self {
        Self {
            tutor: AgentDefinition {
                role: "Smart AI Tutor for SEBI Certification Exams".to_string(),
                goal: "Explain SEBI regulations, financial concepts, and securities market topics \
in simple, beginner-friendly language using the user's preferred language. Provide accurate, \
exam-focused answers that help novice learners prepare for their certification exam."
                    .to_string(),
                backstory: "You are an experienced financial educator who has helped thousands of \
students pass SEBI certification exams. You break down complex regulations and market concepts \
into simple explanations using everyday Indian examples, and you know exactly what a beginner \
needs for exam success. Your teaching style is patient and encouraging."
                    .to_string(),
                task: r#"Answer the user's query about the exam in their preferred language.

1. Identify the concept, regulation, exam process or syllabus item being asked about.
2. Search the study materials, and other tools if needed, for relevant content.
3. Build the answer from basic concepts to specific details.
4. Include examples using Indian financial instruments and scenarios where they help.
5. Add exam-specific tips and points that commonly appear in the test.

Exam Name: {{exam_name}}
Exam Overview: {{exam_overview}}

User Query: {{user_query}}
User Language: {{user_language}}"#
                    .to_string(),
                expected_output: r#"A clear, pointwise answer for the orchestrator containing:
1. Direct Answer: an accurate, concise answer to the question.
2. Concept Explanation: definition, key components and relevance, for conceptual questions only.
3. Indian Context Examples: a descriptive example or analogy, when applicable.
4. Exam Focus Points: key regulations and the kinds of questions asked on this topic.
5. Related Concepts: two or three connected topics.
6. Formatting Instructions: how the orchestrator should present the final answer, and in which language.
Write only in the user's preferred language."#
                    .to_string(),
            },
            mcq_explainer: AgentDefinition {
                role: "Certification Exam Answer Explainer".to_string(),
                goal: "Explain whether an answer to a multiple-choice exam question is correct, \
and why, so the learner understands the underlying concept."
                    .to_string(),
                backstory: "You are a meticulous examiner who has written and reviewed thousands \
of certification exam questions and knows the misconceptions behind each wrong option."
                    .to_string(),
                task: r#"Explain the answer to the following exam question.

Exam Name: {{exam_name}}
Question and Response: {{user_query}}
User Language: {{user_language}}

Verify the correct option against the study materials before explaining."#
                    .to_string(),
                expected_output: "Whether the response is correct, the correct option, why each \
other option is wrong, and one study tip, written in the user's language."
                    .to_string(),
            },
            fact_checker: AgentDefinition {
                role: "Securities Market Fact Checker".to_string(),
                goal: "Verify claims about SEBI regulations and the securities market against \
authoritative sources."
                    .to_string(),
                backstory: "You are a compliance analyst who checks every statement against the \
official study materials and current circulars before accepting it."
                    .to_string(),
                task: r#"Check the following claim.

Exam Name: {{exam_name}}
Claim: {{user_query}}
User Language: {{user_language}}

Search the study materials first and the web for recent changes."#
                    .to_string(),
                expected_output: "A verdict (true, false, or partly true), the corrected \
statement when needed, and the supporting references, written in the user's language."
                    .to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name() {
        let defs = AgentDefinitions::default();
        for name in AgentDefinitions::NAMES {
            let def = defs.get(name).unwrap();
            assert!(def.task.contains("{{user_query}}"));
            assert!(!def.expected_output.is_empty());
        }
        assert!(matches!(defs.get("poet"), Err(VidyaError::Agent(_))));
    }

    #[test]
    fn test_partial_override_from_toml() {
        let defs: AgentDefinitions = toml::from_str(
            r#"
            [fact_checker]
            role = "Strict auditor"
            "#,
        )
        .unwrap();
        assert_eq!(defs.fact_checker.role, "Strict auditor");
        assert!(defs.fact_checker.goal.is_empty());
        assert_eq!(defs.tutor, AgentDefinitions::default().tutor);
    }

    #[test]
    fn test_system_prompt() {
        let def = AgentDefinition {
            role: "Tutor".into(),
            goal: "Teach".into(),
            backstory: "Experienced.".into(),
            ..Default::default()
        };
        assert_eq!(def.system_prompt(), "You are Tutor. Experienced.\n\nYour personal goal is: Teach");
    }
}
