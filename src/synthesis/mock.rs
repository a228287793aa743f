//! Scripted synthesizer for tests.

use super::{require_text, SynthesisError, SynthesisResult, Synthesizer};
use crate::audio::{AudioClip, AudioFormat};
use crate::cancel::CancellationToken;
use crate::voice::VoiceId;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Produces a clip whose PCM repeats each text byte once per frame byte, so tests can find
/// every segment inside the concatenated output.
pub(crate) struct ScriptedSynthesizer {
    format: AudioFormat,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    default_delay: Option<Duration>,
    delays: HashMap<String, Duration>,
    cancels: HashMap<String, CancellationToken>,
    formats: HashMap<String, AudioFormat>,
    failures: HashSet<String>,
    completed: Mutex<Vec<String>>,
}

impl ScriptedSynthesizer {
    pub fn new() -> Self {
        Self {
            format: AudioFormat::OPENAI_PCM,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            default_delay: None,
            delays: HashMap::new(),
            cancels: HashMap::new(),
            formats: HashMap::new(),
            failures: HashSet::new(),
            completed: Mutex::new(Vec::new()),
        }
    }

    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }

    /// Sleep before answering for this exact text.
    pub fn delay(mut self, text: &str, delay: Duration) -> Self {
        self.delays.insert(text.to_string(), delay);
        self
    }

    /// Sleep before answering for every text without its own delay.
    pub fn delay_all(mut self, delay: Duration) -> Self {
        self.default_delay = Some(delay);
        self
    }

    /// Fire `token` right after this exact text has been synthesized.
    pub fn cancel_after(mut self, text: &str, token: CancellationToken) -> Self {
        self.cancels.insert(text.to_string(), token);
        self
    }

    /// Answer with a different sample layout for this exact text.
    pub fn format_on(mut self, text: &str, format: AudioFormat) -> Self {
        self.formats.insert(text.to_string(), format);
        self
    }

    /// Fail with a backend error for this exact text.
    pub fn fail_on(mut self, text: &str) -> Self {
        self.failures.insert(text.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most syntheses that were running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Texts in the order their synthesis finished.
    pub fn completion_order(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }

    /// The clip this synthesizer returns for `text`.
    pub fn clip_for(&self, text: &str) -> AudioClip {
        let text = text.trim();
        let format = self.formats.get(text).copied().unwrap_or(self.format);
        let pcm = text
            .bytes()
            .flat_map(|b| std::iter::repeat(b).take(format.frame_size()))
            .collect();
        AudioClip::new(format, pcm).unwrap()
    }
}

#[async_trait]
impl Synthesizer for ScriptedSynthesizer {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn synthesize(&self, text: &str, _voice: &VoiceId) -> SynthesisResult {
        let text = require_text(text)?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(text).or(self.default_delay.as_ref()) {
            tokio::time::sleep(*delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.lock().unwrap().push(text.to_string());
        if let Some(token) = self.cancels.get(text) {
            token.cancel();
        }

        if self.failures.contains(text) {
            return Err(SynthesisError::Backend(format!("scripted failure for '{}'", text)));
        }

        Ok(self.clip_for(text))
    }
}
