//! Configuration module for Samtale.
//!
//! Handles loading and managing application settings.

mod settings;

pub use settings::{
    EspeakSettings, GeneralSettings, OpenAiSpeechSettings, PipelineSettings, Settings,
    SynthesisBackend, SynthesisSettings, VoiceSettings,
};
