//! OpenAI text-to-speech implementation.

use super::{require_text, SynthesisError, SynthesisResult, Synthesizer};
use crate::audio::{AudioClip, AudioFormat};
use crate::error::{Result, SamtaleError};
use crate::openai::create_client_with_timeout;
use crate::voice::VoiceId;
use async_openai::types::{CreateSpeechRequestArgs, SpeechModel, SpeechResponseFormat, Voice};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

/// Voices accepted by the speech endpoint.
pub const OPENAI_VOICES: &[&str] = &["alloy", "echo", "fable", "onyx", "nova", "shimmer"];

/// OpenAI-based synthesizer.
pub struct OpenAiSynthesizer {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: SpeechModel,
    speed: f32,
}

impl OpenAiSynthesizer {
    /// Create a synthesizer with custom model, speed and request timeout.
    pub fn with_config(model: &str, speed: f32, timeout: Duration) -> Result<Self> {
        if !(0.25..=4.0).contains(&speed) {
            return Err(SamtaleError::Config(format!(
                "Speech speed must be between 0.25 and 4.0, got {}",
                speed
            )));
        }

        Ok(Self {
            client: create_client_with_timeout(timeout)?,
            model: parse_model(model),
            speed,
        })
    }
}

fn parse_model(model: &str) -> SpeechModel {
    match model {
        "tts-1" => SpeechModel::Tts1,
        "tts-1-hd" => SpeechModel::Tts1Hd,
        other => SpeechModel::Other(other.to_string()),
    }
}

fn parse_voice(voice: &VoiceId) -> std::result::Result<Voice, String> {
    match voice.as_str().to_lowercase().as_str() {
        "alloy" => Ok(Voice::Alloy),
        "echo" => Ok(Voice::Echo),
        "fable" => Ok(Voice::Fable),
        "onyx" => Ok(Voice::Onyx),
        "nova" => Ok(Voice::Nova),
        "shimmer" => Ok(Voice::Shimmer),
        other => Err(format!(
            "Unknown OpenAI voice '{}'. Available: {}",
            other,
            OPENAI_VOICES.join(", ")
        )),
    }
}

#[async_trait]
impl Synthesizer for OpenAiSynthesizer {
    fn name(&self) -> &str {
        "openai"
    }

    fn validate_voice(&self, voice: &VoiceId) -> Result<()> {
        parse_voice(voice).map(|_| ()).map_err(SamtaleError::Config)
    }

    #[instrument(skip(self, text), fields(voice = %voice, chars = text.len()))]
    async fn synthesize(&self, text: &str, voice: &VoiceId) -> SynthesisResult {
        let text = require_text(text)?;
        let voice = parse_voice(voice).map_err(SynthesisError::Backend)?;

        let request = CreateSpeechRequestArgs::default()
            .input(text)
            .model(self.model.clone())
            .voice(voice)
            .response_format(SpeechResponseFormat::Pcm)
            .speed(self.speed)
            .build()
            .map_err(|e| SynthesisError::Backend(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .audio()
            .speech(request)
            .await
            .map_err(|e| SynthesisError::Backend(format!("Speech API error: {}", e)))?;

        debug!("Received {} bytes of PCM", response.bytes.len());

        let mut pcm = response.bytes.to_vec();
        // A truncated stream can end mid-sample.
        pcm.truncate(pcm.len() - pcm.len() % AudioFormat::OPENAI_PCM.frame_size());

        AudioClip::new(AudioFormat::OPENAI_PCM, pcm).map_err(|e| SynthesisError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_voice() {
        assert!(matches!(parse_voice(&VoiceId::new("Nova")), Ok(Voice::Nova)));
        assert!(matches!(parse_voice(&VoiceId::new("onyx")), Ok(Voice::Onyx)));
        assert!(parse_voice(&VoiceId::new("en-gb")).is_err());
    }

    #[test]
    fn test_parse_model() {
        assert!(matches!(parse_model("tts-1"), SpeechModel::Tts1));
        assert!(matches!(parse_model("tts-1-hd"), SpeechModel::Tts1Hd));
        assert!(matches!(
            parse_model("gpt-4o-mini-tts"),
            SpeechModel::Other(name) if name == "gpt-4o-mini-tts"
        ));
    }
}
