//! Pre-flight checks before expensive operations.
//!
//! Validates that the configured speech backend is reachable before any
//! segment is sent to it, so a missing key or executable is reported up
//! front instead of as a run where every segment fails.

use crate::config::{Settings, SynthesisBackend};
use crate::error::{Result, SamtaleError};
use crate::openai::is_api_key_configured;
use crate::synthesis::check_binary;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Podcast generation needs the configured backend.
    Podcast,
    /// The HTTP server synthesizes too.
    Serve,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Podcast | Operation::Serve => check_backend(settings),
    }
}

fn check_backend(settings: &Settings) -> Result<()> {
    match settings.synthesis.backend {
        SynthesisBackend::OpenAI => check_api_key(),
        SynthesisBackend::Espeak => check_binary(&settings.synthesis.espeak.binary),
    }
}

/// Check if OpenAI API key is configured.
fn check_api_key() -> Result<()> {
    if is_api_key_configured() {
        Ok(())
    } else {
        Err(SamtaleError::BackendUnavailable(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...' \
             or switch backends with: samtale config set synthesis.backend espeak"
                .to_string(),
        ))
    }
}
