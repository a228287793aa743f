//! Configuration settings for Samtale.

use crate::error::{Result, SamtaleError};
use crate::voice::{VoiceAssignment, VoiceId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub voices: VoiceSettings,
    pub synthesis: SynthesisSettings,
    pub pipeline: PipelineSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for intermediate audio files.
    pub temp_dir: String,
    /// Default directory for generated podcasts.
    pub output_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            temp_dir: "/tmp/samtale".to_string(),
            output_dir: "~/samtale".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// The two canonical speaker labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    /// Label of the first host (gets `voice_a`).
    pub host_a: String,
    /// Label of the second host (gets `voice_b`).
    pub host_b: String,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            host_a: "Sarah".to_string(),
            host_b: "Mike".to_string(),
        }
    }
}

/// Speech synthesis backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisBackend {
    /// OpenAI hosted text-to-speech.
    #[default]
    OpenAI,
    /// Local espeak-ng.
    Espeak,
}

impl std::str::FromStr for SynthesisBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(SynthesisBackend::OpenAI),
            "espeak" | "espeak-ng" => Ok(SynthesisBackend::Espeak),
            _ => Err(format!("Unknown synthesis backend: {}", s)),
        }
    }
}

impl std::fmt::Display for SynthesisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SynthesisBackend::OpenAI => write!(f, "openai"),
            SynthesisBackend::Espeak => write!(f, "espeak"),
        }
    }
}

/// Synthesis backend selection and per-backend options.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SynthesisSettings {
    pub backend: SynthesisBackend,
    pub openai: OpenAiSpeechSettings,
    pub espeak: EspeakSettings,
}

/// OpenAI text-to-speech options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSpeechSettings {
    /// Speech model (tts-1, tts-1-hd, ...).
    pub model: String,
    /// Voice for host A.
    pub voice_a: String,
    /// Voice for host B.
    pub voice_b: String,
    /// Playback speed, 0.25 to 4.0.
    pub speed: f32,
    /// HTTP timeout for one request.
    pub timeout_secs: u64,
}

impl Default for OpenAiSpeechSettings {
    fn default() -> Self {
        Self {
            model: "tts-1".to_string(),
            voice_a: "nova".to_string(),
            voice_b: "onyx".to_string(),
            speed: 1.0,
            timeout_secs: crate::openai::DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// espeak-ng options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EspeakSettings {
    /// Executable name or path.
    pub binary: String,
    /// Voice for host A.
    pub voice_a: String,
    /// Voice for host B.
    pub voice_b: String,
    /// Speaking rate in words per minute.
    pub rate: u32,
    /// Amplitude, 0 to 200.
    pub amplitude: u32,
}

impl Default for EspeakSettings {
    fn default() -> Self {
        Self {
            binary: "espeak-ng".to_string(),
            voice_a: "en-us".to_string(),
            voice_b: "en-gb".to_string(),
            rate: 160,
            amplitude: 90,
        }
    }
}

/// Script-to-audio pipeline tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Number of segments synthesized at once.
    pub max_concurrent: usize,
    /// Per-segment deadline in seconds (0 disables).
    pub segment_timeout_secs: u64,
    /// Silence inserted between segments.
    pub silence_ms: u64,
    /// Cached clips kept per pipeline (0 = unbounded).
    pub cache_capacity: usize,
    /// Strip markup and unusual characters before synthesis.
    pub sanitize: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            segment_timeout_secs: 60,
            silence_ms: 500,
            cache_capacity: 256,
            sanitize: true,
        }
    }
}

impl PipelineSettings {
    pub fn segment_timeout(&self) -> Option<Duration> {
        (self.segment_timeout_secs > 0).then(|| Duration::from_secs(self.segment_timeout_secs))
    }

    pub fn silence(&self) -> Duration {
        Duration::from_millis(self.silence_ms)
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
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

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("samtale")
            .join("config.toml")
    }

    /// Set a scalar value by dotted key, e.g. `pipeline.max_concurrent`.
    ///
    /// The value is parsed as a TOML literal (numbers, booleans, quoted
    /// strings) and falls back to a plain string. The result must still
    /// deserialize into `Settings`.
    pub fn set_value(&self, key: &str, value: &str) -> Result<Settings> {
        let mut root = toml::Value::try_from(self)?;

        let parsed = toml::from_str::<toml::Table>(&format!("v = {}", value))
            .ok()
            .and_then(|mut t| t.remove("v"))
            .unwrap_or_else(|| toml::Value::String(value.to_string()));

        let mut parts = key.split('.').peekable();
        let mut node = &mut root;
        while let Some(part) = parts.next() {
            let table = node.as_table_mut().ok_or_else(|| {
                SamtaleError::Config(format!("'{}' does not name a config section", key))
            })?;
            if parts.peek().is_none() {
                match table.get(part).map(toml::Value::is_table) {
                    Some(true) => {
                        return Err(SamtaleError::Config(format!(
                            "'{}' is a section, not a value",
                            key
                        )));
                    }
                    Some(false) => {
                        table.insert(part.to_string(), parsed);
                        break;
                    }
                    None => {
                        return Err(SamtaleError::Config(format!("Unknown config key: {}", key)));
                    }
                }
            }
            node = table
                .get_mut(part)
                .ok_or_else(|| SamtaleError::Config(format!("Unknown config key: {}", key)))?;
        }

        let settings: Settings = root
            .try_into()
            .map_err(|e| SamtaleError::Config(format!("Invalid value for {}: {}", key, e)))?;
        Ok(settings)
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Get the expanded output directory path.
    pub fn output_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.output_dir)
    }

    /// Speaker table for the configured backend.
    pub fn voice_assignment(&self) -> VoiceAssignment {
        let (voice_a, voice_b) = match self.synthesis.backend {
            SynthesisBackend::OpenAI => (&self.synthesis.openai.voice_a, &self.synthesis.openai.voice_b),
            SynthesisBackend::Espeak => (&self.synthesis.espeak.voice_a, &self.synthesis.espeak.voice_b),
        };
        VoiceAssignment::new(
            &self.voices.host_a,
            VoiceId::new(voice_a.as_str()),
            &self.voices.host_b,
            VoiceId::new(voice_b.as_str()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.synthesis.backend, SynthesisBackend::OpenAI);
        assert_eq!(settings.pipeline.max_concurrent, 2);
        assert_eq!(settings.pipeline.silence(), Duration::from_millis(500));
        assert_eq!(settings.pipeline.segment_timeout(), Some(Duration::from_secs(60)));
        assert_eq!(settings.voice_assignment().resolve("Mike", 0).as_str(), "onyx");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[synthesis]\nbackend = \"espeak\"\n\n[pipeline]\nsegment_timeout_secs = 0\n",
        )
        .unwrap();

        let settings = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(settings.synthesis.backend, SynthesisBackend::Espeak);
        assert_eq!(settings.synthesis.espeak.rate, 160);
        assert_eq!(settings.pipeline.segment_timeout(), None);
        assert_eq!(settings.voice_assignment().resolve("Sarah", 1).as_str(), "en-us");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut settings = Settings::default();
        settings.voices.host_a = "Ada".to_string();
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.voices.host_a, "Ada");
    }

    #[test]
    fn test_set_value() {
        let settings = Settings::default();

        let updated = settings.set_value("pipeline.max_concurrent", "4").unwrap();
        assert_eq!(updated.pipeline.max_concurrent, 4);

        let updated = settings.set_value("synthesis.backend", "espeak").unwrap();
        assert_eq!(updated.synthesis.backend, SynthesisBackend::Espeak);

        let updated = settings.set_value("voices.host_b", "Jonas").unwrap();
        assert_eq!(updated.voices.host_b, "Jonas");

        assert!(settings.set_value("pipeline.nope", "1").is_err());
        assert!(settings.set_value("pipeline", "1").is_err());
        assert!(settings.set_value("pipeline.max_concurrent", "lots").is_err());
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("OpenAI".parse::<SynthesisBackend>().unwrap(), SynthesisBackend::OpenAI);
        assert_eq!("espeak-ng".parse::<SynthesisBackend>().unwrap(), SynthesisBackend::Espeak);
        assert!("festival".parse::<SynthesisBackend>().is_err());
    }
}
