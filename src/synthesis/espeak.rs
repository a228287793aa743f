//! Local synthesis through the `espeak-ng` executable.
//!
//! Each utterance is rendered into its own temporary WAV file, which is
//! removed when the call returns, fails, times out or is cancelled. The
//! child process is killed if the future is dropped.

use super::{require_text, SynthesisError, SynthesisResult, Synthesizer};
use crate::audio::decode_wav;
use crate::error::{Result, SamtaleError};
use crate::voice::VoiceId;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

/// espeak-ng based synthesizer.
pub struct EspeakSynthesizer {
    binary: String,
    rate: u32,
    amplitude: u32,
    temp_dir: PathBuf,
}

impl EspeakSynthesizer {
    /// Create a synthesizer, checking that the executable runs.
    pub fn with_config(binary: &str, rate: u32, amplitude: u32, temp_dir: PathBuf) -> Result<Self> {
        check_binary(binary)?;
        std::fs::create_dir_all(&temp_dir)?;

        Ok(Self {
            binary: binary.to_string(),
            rate,
            amplitude: amplitude.min(200),
            temp_dir,
        })
    }
}

/// Verify the executable exists and answers `--version`.
pub fn check_binary(binary: &str) -> Result<()> {
    match std::process::Command::new(binary)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => Err(SamtaleError::BackendUnavailable(format!(
            "{} --version exited with {}",
            binary, status
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
            SamtaleError::BackendUnavailable(format!("{} not found in PATH", binary)),
        ),
        Err(e) => Err(SamtaleError::BackendUnavailable(format!("{}: {}", binary, e))),
    }
}

#[async_trait]
impl Synthesizer for EspeakSynthesizer {
    fn name(&self) -> &str {
        "espeak"
    }

    /// Speak a single character quietly with the voice; espeak-ng fails or
    /// complains on stderr when it cannot load it.
    fn validate_voice(&self, voice: &VoiceId) -> Result<()> {
        let output = std::process::Command::new(&self.binary)
            .arg("-q")
            .arg("-v")
            .arg(voice.as_str())
            .arg(".")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| SamtaleError::BackendUnavailable(format!("{}: {}", self.binary, e)))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if output.status.success() && stderr.trim().is_empty() {
            debug!("espeak-ng voice {} is available", voice);
            Ok(())
        } else {
            Err(SamtaleError::BackendUnavailable(format!(
                "espeak-ng voice '{}' is not available: {}",
                voice,
                stderr.trim()
            )))
        }
    }

    #[instrument(skip(self, text), fields(voice = %voice, chars = text.len()))]
    async fn synthesize(&self, text: &str, voice: &VoiceId) -> SynthesisResult {
        let text = require_text(text)?;

        let wav_file = tempfile::Builder::new()
            .prefix("samtale-")
            .suffix(".wav")
            .tempfile_in(&self.temp_dir)
            .map_err(|e| SynthesisError::Backend(format!("Cannot create temp file: {}", e)))?;

        let mut child = Command::new(&self.binary)
            .arg("-v")
            .arg(voice.as_str())
            .arg("-s")
            .arg(self.rate.to_string())
            .arg("-a")
            .arg(self.amplitude.to_string())
            .arg("-w")
            .arg(wav_file.path())
            .arg("--stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SynthesisError::Backend(format!("{} failed to start: {}", self.binary, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| SynthesisError::Backend(format!("Failed to send text: {}", e)))?;
            // Closing stdin tells espeak-ng the input is complete.
            drop(stdin);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| SynthesisError::Backend(format!("{} failed: {}", self.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SynthesisError::Backend(format!(
                "{} failed: {}",
                self.binary,
                stderr.trim()
            )));
        }

        let bytes = tokio::fs::read(wav_file.path())
            .await
            .map_err(|e| SynthesisError::Decode(e.to_string()))?;
        debug!("espeak-ng wrote {} bytes", bytes.len());

        decode_wav(&bytes).map_err(|e| SynthesisError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A stand-in `espeak-ng` that knows one voice and fails every synthesis.
    #[cfg(unix)]
    const FAKE_ESPEAK: &str = r#"#!/bin/sh
case "$*" in
  *--version*) echo "eSpeak NG text-to-speech: 1.51"; exit 0 ;;
  *"-q -v en-us"*) exit 0 ;;
  *"-q -v "*) echo "Error processing file: no such voice" >&2; exit 1 ;;
esac
cat > /dev/null
echo "synthesis exploded" >&2
exit 1
"#;

    #[cfg(unix)]
    fn fake_espeak(dir: &std::path::Path) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("espeak-ng");
        std::fs::write(&path, FAKE_ESPEAK).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[test]
    fn test_unknown_voice_is_backend_unavailable() {
        let bin_dir = tempfile::tempdir().unwrap();
        let work_dir = tempfile::tempdir().unwrap();
        let binary = fake_espeak(bin_dir.path());

        let synthesizer =
            EspeakSynthesizer::with_config(&binary, 160, 90, work_dir.path().to_path_buf())
                .unwrap();

        assert!(synthesizer.validate_voice(&VoiceId::new("en-us")).is_ok());
        assert!(matches!(
            synthesizer.validate_voice(&VoiceId::new("xx-nope")),
            Err(SamtaleError::BackendUnavailable(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_pipeline_refuses_unknown_voice() {
        use crate::orchestrator::{PipelineOptions, PodcastPipeline};
        use crate::voice::VoiceAssignment;
        use std::sync::Arc;

        let bin_dir = tempfile::tempdir().unwrap();
        let work_dir = tempfile::tempdir().unwrap();
        let binary = fake_espeak(bin_dir.path());
        let synthesizer =
            EspeakSynthesizer::with_config(&binary, 160, 90, work_dir.path().to_path_buf())
                .unwrap();

        let voices = VoiceAssignment::new("Sarah", "en-us".into(), "Mike", "xx-nope".into());
        let result =
            PodcastPipeline::with_components(Arc::new(synthesizer), voices, PipelineOptions::default());

        assert!(matches!(result, Err(SamtaleError::BackendUnavailable(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_synthesis_leaves_no_temp_files() {
        let bin_dir = tempfile::tempdir().unwrap();
        let work_dir = tempfile::tempdir().unwrap();
        let binary = fake_espeak(bin_dir.path());
        let synthesizer =
            EspeakSynthesizer::with_config(&binary, 160, 90, work_dir.path().to_path_buf())
                .unwrap();

        let result = synthesizer
            .synthesize("Hello there.", &VoiceId::new("en-us"))
            .await;

        match result {
            Err(SynthesisError::Backend(message)) => assert!(message.contains("synthesis exploded")),
            other => panic!("expected backend error, got {:?}", other),
        }
        assert_eq!(std::fs::read_dir(work_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_binary_is_backend_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let result = EspeakSynthesizer::with_config(
            "samtale-no-such-espeak-binary",
            160,
            90,
            dir.path().to_path_buf(),
        );
        assert!(matches!(result, Err(SamtaleError::BackendUnavailable(_))));
    }
}
