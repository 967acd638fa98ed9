//! Configuration settings for Vidya.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub vector_store: VectorStoreSettings,
    pub search: SearchSettings,
    pub orchestrator: OrchestratorSettings,
    pub server: ServerSettings,
    /// Exam catalog keyed by exam id (e.g. "mf_foundation").
    pub exams: BTreeMap<String, ExamSettings>,
    /// Language code (e.g. "hi-IN") to language name (e.g. "Hindi").
    pub languages: BTreeMap<String, String>,
    pub prompts: PromptSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            general: GeneralSettings::default(),
            llm: LlmSettings::default(),
            embedding: EmbeddingSettings::default(),
            vector_store: VectorStoreSettings::default(),
            search: SearchSettings::default(),
            orchestrator: OrchestratorSettings::default(),
            server: ServerSettings::default(),
            exams: default_exams(),
            languages: default_languages(),
            prompts: PromptSettings::default(),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.vidya".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Chat model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Chat completion model (or deployment) name.
    pub model: String,
    /// Base URL of an OpenAI-compatible API. None uses the OpenAI default.
    pub api_base: Option<String>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            api_base: None,
            temperature: 0.0,
            timeout_secs: 300,
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (openai).
    pub provider: String,
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Vector store provider (sqlite, memory).
    pub provider: String,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            provider: "sqlite".to_string(),
            sqlite_path: "~/.vidya/study_materials.db".to_string(),
        }
    }
}

/// Web and knowledge-base search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Serper search endpoint.
    pub serper_url: String,
    /// Maximum characters kept from each fetched page.
    pub max_page_chars: usize,
    /// Timeout for fetching each result page, in seconds.
    pub page_timeout_secs: u64,
    /// Number of passages returned by knowledge-base search.
    pub knowledge_base_results: usize,
    /// Collection searched when an exam has no explicit collection.
    pub default_collection: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            serper_url: "https://google.serper.dev/search".to_string(),
            max_page_chars: 5000,
            page_timeout_secs: 10,
            knowledge_base_results: 10,
            default_collection: "invest_advisor".to_string(),
        }
    }
}

/// Orchestration loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    /// Number of tool rounds executed per turn.
    pub max_tool_rounds: usize,
    /// Tools offered to the model during a chat turn.
    pub tools: Vec<String>,
    /// Iteration cap for delegated agent runs.
    pub agent_max_iterations: usize,
    /// Exam used when a request does not name one.
    pub default_exam: String,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_tool_rounds: 1,
            tools: vec![
                "get_web_search_result".to_string(),
                "ai_tutor_tool".to_string(),
                "calculator".to_string(),
            ],
            agent_max_iterations: 10,
            default_exam: "investor_awareness".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// One certification exam in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ExamSettings {
    /// Display name of the exam.
    pub name: String,
    /// Plain-text exam overview handed to the tutor agent.
    pub overview_path: Option<String>,
    /// JSON array of sample questions for mock exams.
    pub questions_path: Option<String>,
    /// Knowledge-base collection. Defaults to the exam id.
    pub collection: Option<String>,
}

fn default_exams() -> BTreeMap<String, ExamSettings> {
    let exam = |name: &str, slug: &str| ExamSettings {
        name: name.to_string(),
        overview_path: Some(format!("~/.vidya/exams/{}_overview.txt", slug)),
        questions_path: Some(format!("~/.vidya/exams/{}_test_questions.json", slug)),
        collection: None,
    };

    BTreeMap::from([
        (
            "investor_awareness".to_string(),
            exam("SEBI Investor Awareness Certification", "investor_awareness"),
        ),
        (
            "mf_foundation".to_string(),
            exam(
                "NISM-Series-V-B: Mutual Fund Foundation Certification",
                "mf_foundation",
            ),
        ),
        (
            "invest_advisor".to_string(),
            exam(
                "NISM-Series-X-A: Investment Adviser (Level 1) Certification",
                "invest_advisor",
            ),
        ),
    ])
}

fn default_languages() -> BTreeMap<String, String> {
    [
        ("en-US", "English"),
        ("hi-IN", "Hindi"),
        ("bn-IN", "Bengali"),
        ("mr-IN", "Marathi"),
        ("kn-IN", "Kannada"),
        ("gu-IN", "Gujarati"),
    ]
    .into_iter()
    .map(|(code, name)| (code.to_string(), name.to_string()))
    .collect()
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::VidyaError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vidya")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.vector_store.sqlite_path)
    }

    /// Resolve a language code to its name, falling back to English.
    pub fn language_name(&self, code: &str) -> String {
        self.languages
            .get(code)
            .cloned()
            .unwrap_or_else(|| "English".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_catalog() {
        let settings = Settings::default();
        assert_eq!(settings.exams.len(), 3);
        assert!(settings.exams.contains_key(&settings.orchestrator.default_exam));
        assert_eq!(settings.orchestrator.max_tool_rounds, 1);
    }

    #[test]
    fn test_language_fallback() {
        let settings = Settings::default();
        assert_eq!(settings.language_name("hi-IN"), "Hindi");
        assert_eq!(settings.language_name("xx-YY"), "English");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [orchestrator]
            max_tool_rounds = 2

            [llm]
            model = "gpt-4.1"
            "#,
        )
        .unwrap();

        assert_eq!(settings.orchestrator.max_tool_rounds, 2);
        assert_eq!(settings.orchestrator.default_exam, "investor_awareness");
        assert_eq!(settings.llm.model, "gpt-4.1");
        assert_eq!(settings.search.max_page_chars, 5000);
        assert_eq!(settings.languages.len(), 6);
    }
}
