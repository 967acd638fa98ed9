//! Configuration module for Vidya.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{ExplanationPrompts, MockExamPrompts, OrchestratorPrompts, Prompts};
pub use settings::{
    EmbeddingSettings, ExamSettings, GeneralSettings, LlmSettings, OrchestratorSettings,
    PromptSettings, SearchSettings, ServerSettings, Settings, VectorStoreSettings,
};
