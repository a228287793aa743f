//! OpenAI client construction for the speech endpoint.

use crate::error::{Result, SamtaleError};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for one speech request (2 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Check if the OpenAI API key is configured.
pub fn is_api_key_configured() -> bool {
    std::env::var("OPENAI_API_KEY").is_ok_and(|key| !key.trim().is_empty())
}

/// Create an OpenAI client with a custom timeout.
///
/// Fails with `BackendUnavailable` when no API key is present, so callers
/// learn about it before any request is made.
pub fn create_client_with_timeout(timeout: Duration) -> Result<Client<OpenAIConfig>> {
    if !is_api_key_configured() {
        return Err(SamtaleError::BackendUnavailable(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        ));
    }

    let http_client = reqwest::Client::builder().timeout(timeout).build()?;

    Ok(Client::with_config(OpenAIConfig::default()).with_http_client(http_client))
}
