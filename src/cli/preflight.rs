//! Pre-flight checks before expensive operations.
//!
//! Validates that required credentials are available before starting
//! operations that would otherwise fail midway.

use crate::error::{Result, VidyaError};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Chat turns need the model key; web search needs the Serper key.
    Chat,
    /// Indexing needs the embedding key.
    Ingest,
    /// Listing the catalog has no external requirements.
    Catalog,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all hard requirements are met, or an error describing
/// what's missing.
pub fn check(operation: Operation) -> Result<()> {
    match operation {
        Operation::Chat | Operation::Ingest => check_env_key("OPENAI_API_KEY", "sk-..."),
        Operation::Catalog => Ok(()),
    }
}

/// Soft requirements: features that will degrade rather than fail.
pub fn warnings(operation: Operation) -> Vec<String> {
    match operation {
        Operation::Chat => check_env_key("SERPER_API_KEY", "...")
            .err()
            .map(|e| format!("{} Web search will be unavailable.", e))
            .into_iter()
            .collect(),
        Operation::Ingest | Operation::Catalog => Vec::new(),
    }
}

fn check_env_key(name: &str, example: &str) -> Result<()> {
    match std::env::var(name) {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(VidyaError::Config(format!(
            "{} is empty. Set it with: export {}='{}'",
            name, name, example
        ))),
        Err(_) => Err(VidyaError::Config(format!(
            "{} not set. Set it with: export {}='{}'",
            name, name, example
        ))),
    }
}
