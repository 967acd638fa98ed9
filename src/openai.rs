//! OpenAI client configuration with sensible defaults.

use crate::config::LlmSettings;
use crate::error::Result;
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for OpenAI API requests (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Create an OpenAI client with the default timeout and endpoint.
pub fn create_client() -> Result<Client<OpenAIConfig>> {
    create_client_with(None, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create an OpenAI client from chat model settings.
pub fn client_from_settings(settings: &LlmSettings) -> Result<Client<OpenAIConfig>> {
    create_client_with(
        settings.api_base.as_deref(),
        Duration::from_secs(settings.timeout_secs),
    )
}

/// Create an OpenAI client against an optional custom base URL with a custom timeout.
///
/// The API key is read from `OPENAI_API_KEY`.
pub fn create_client_with(api_base: Option<&str>, timeout: Duration) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder().timeout(timeout).build()?;

    let mut config = OpenAIConfig::default();
    if let Some(base) = api_base {
        config = config.with_api_base(base);
    }

    Ok(Client::with_config(config).with_http_client(http_client))
}
