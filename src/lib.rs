//! Samtale - two-host podcast audio from dialogue scripts
//!
//! Turns a `Speaker: text` dialogue script into one playable audio clip,
//! with each host speaking in their own voice.
//!
//! The name "Samtale" is Norwegian for "conversation."
//!
//! # Overview
//!
//! A run goes through four steps:
//! - Parse the script into ordered dialogue segments
//! - Pick a voice for every segment (two-entry table, alternating fallback)
//! - Synthesize segments concurrently, dropping the ones that fail
//! - Join the clips in script order with short silences, encoded as WAV
//!
//! # Architecture
//!
//! - `script` - Script parsing and text sanitizing
//! - `voice` - Speaker-to-voice assignment
//! - `synthesis` - Speech backends (OpenAI, espeak-ng) and the clip cache
//! - `audio` - PCM clips, concatenation and WAV encoding
//! - `cancel` - Cancellation for in-flight synthesis
//! - `orchestrator` - Pipeline coordination
//! - `config` - Configuration management
//!
//! # Example
//!
//! ```rust,no_run
//! use samtale::config::Settings;
//! use samtale::orchestrator::PodcastPipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let pipeline = PodcastPipeline::new(&settings)?;
//!
//!     let result = pipeline
//!         .run("Sarah: Hello there.\nMike: Hi Sarah, great to be here.\n")
//!         .await;
//!     if let Some(wav) = result.wav_bytes()? {
//!         std::fs::write("podcast.wav", wav)?;
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod error;
pub mod openai;
pub mod orchestrator;
pub mod script;
pub mod synthesis;
pub mod voice;

pub use error::{Result, SamtaleError};
