//! Text-to-speech backends.
//!
//! Every backend turns `(text, voice)` into a PCM [`AudioClip`]. Failures for
//! a single utterance are reported as [`SynthesisError`] values so the
//! pipeline can drop that segment and carry on.
//!
//! # Backends
//!
//! - **OpenAI** (default): hosted speech, requested as raw 24 kHz PCM.
//! - **espeak-ng**: local synthesis through the `espeak-ng` executable.
//!
//! [`CachedSynthesizer`] wraps either backend with a per-pipeline cache.

mod cache;
mod espeak;
#[cfg(test)]
pub(crate) mod mock;
mod openai;

pub use cache::{CacheStats, CachedSynthesizer, SynthesisCache};
pub use espeak::{check_binary, EspeakSynthesizer};
pub use openai::{OpenAiSynthesizer, OPENAI_VOICES};

use crate::audio::AudioClip;
use crate::config::{Settings, SynthesisBackend};
use crate::error::Result;
use crate::voice::VoiceId;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Why one utterance produced no audio.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SynthesisError {
    #[error("nothing to say after trimming")]
    EmptyText,

    #[error("backend error: {0}")]
    Backend(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("unreadable audio: {0}")]
    Decode(String),
}

impl SynthesisError {
    /// Empty text is expected and skipped quietly; everything else is a real failure.
    pub fn is_skip(&self) -> bool {
        matches!(self, SynthesisError::EmptyText)
    }
}

/// Result of synthesizing one utterance.
pub type SynthesisResult = std::result::Result<AudioClip, SynthesisError>;

/// Trait for speech synthesis services.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Short backend name for logs and diagnostics.
    fn name(&self) -> &str;

    /// Reject voices the backend cannot use. Called once, before any synthesis.
    fn validate_voice(&self, _voice: &VoiceId) -> Result<()> {
        Ok(())
    }

    /// Synthesize one utterance.
    async fn synthesize(&self, text: &str, voice: &VoiceId) -> SynthesisResult;
}

/// Trimmed text, or `EmptyText` if nothing is left.
pub(crate) fn require_text(text: &str) -> std::result::Result<&str, SynthesisError> {
    let text = text.trim();
    if text.is_empty() {
        Err(SynthesisError::EmptyText)
    } else {
        Ok(text)
    }
}

/// Build the configured backend.
///
/// Fails with `BackendUnavailable` when the backend cannot be reached at all
/// (missing API key, missing executable).
pub fn create_synthesizer(settings: &Settings) -> Result<Arc<dyn Synthesizer>> {
    let synthesizer: Arc<dyn Synthesizer> = match settings.synthesis.backend {
        SynthesisBackend::OpenAI => {
            let openai = &settings.synthesis.openai;
            Arc::new(OpenAiSynthesizer::with_config(
                &openai.model,
                openai.speed,
                Duration::from_secs(openai.timeout_secs),
            )?)
        }
        SynthesisBackend::Espeak => {
            let espeak = &settings.synthesis.espeak;
            Arc::new(EspeakSynthesizer::with_config(
                &espeak.binary,
                espeak.rate,
                espeak.amplitude,
                settings.temp_dir(),
            )?)
        }
    };
    Ok(synthesizer)
}
