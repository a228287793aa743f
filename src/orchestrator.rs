//! Pipeline orchestrator for Samtale.
//!
//! Drives one script through `Parsing -> Synthesizing -> Concatenating -> Done`.
//! Synthesis fans out over a bounded number of concurrent tasks and joins
//! before concatenation; results are put back into script order at the join.
//! Failed segments are dropped and recorded as diagnostics. Pipeline-level
//! problems end in `Errored` with a populated `error`, never a panic or an
//! `Err` from [`PodcastPipeline::run`].

use crate::audio::{concatenate, AudioClip};
use crate::cancel::CancellationToken;
use crate::config::{PipelineSettings, Settings};
use crate::error::{Result, SamtaleError};
use crate::script::{parse_script, sanitize_text};
use crate::synthesis::{
    create_synthesizer, CacheStats, CachedSynthesizer, SynthesisCache, SynthesisError,
    SynthesisResult, Synthesizer,
};
use crate::voice::{Host, VoiceAssignment, VoiceId};
use futures::stream::{self, StreamExt};
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Where a pipeline run is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Idle,
    Parsing,
    Synthesizing,
    Concatenating,
    Done,
    Errored,
}

impl PipelineStage {
    fn advance(&mut self, next: PipelineStage) {
        debug!("Pipeline stage: {} -> {}", self, next);
        *self = next;
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Parsing => "parsing",
            PipelineStage::Synthesizing => "synthesizing",
            PipelineStage::Concatenating => "concatenating",
            PipelineStage::Done => "done",
            PipelineStage::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Longest gap accepted between segments.
pub const MAX_SILENCE: Duration = Duration::from_secs(10);

/// Tuning for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Segments synthesized at once. Must be at least 1.
    pub max_concurrent: usize,
    /// Deadline for a single segment; `None` waits indefinitely.
    pub segment_timeout: Option<Duration>,
    /// Silence between consecutive segments.
    pub silence: Duration,
    /// Cached clips kept (0 = unbounded).
    pub cache_capacity: usize,
    /// Run [`sanitize_text`] on every utterance.
    pub sanitize: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from(&PipelineSettings::default())
    }
}

impl From<&PipelineSettings> for PipelineOptions {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            max_concurrent: settings.max_concurrent,
            segment_timeout: settings.segment_timeout(),
            silence: settings.silence(),
            cache_capacity: settings.cache_capacity,
            sanitize: settings.sanitize,
        }
    }
}

/// A segment as it will be sent to the backend.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedSegment {
    pub order: usize,
    pub speaker: String,
    /// Text after optional sanitizing.
    pub text: String,
    pub voice: VoiceId,
    pub host: Host,
    /// Whether the speaker matched the voice table rather than the positional fallback.
    pub known: bool,
}

/// Parse a script and resolve the voice and final text of every segment.
pub fn plan_segments(script: &str, voices: &VoiceAssignment, sanitize: bool) -> Vec<PlannedSegment> {
    parse_script(script)
        .into_iter()
        .map(|segment| {
            let host = voices.host_for(&segment.speaker, segment.order);
            let text = if sanitize {
                sanitize_text(&segment.text)
            } else {
                segment.text
            };
            PlannedSegment {
                order: segment.order,
                known: voices.is_known(&segment.speaker),
                voice: voices.voice(host).clone(),
                host,
                speaker: segment.speaker,
                text,
            }
        })
        .collect()
}

/// A segment that produced no audio.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentFailure {
    pub order: usize,
    pub speaker: String,
    #[serde(serialize_with = "serialize_display")]
    pub error: SynthesisError,
}

impl SegmentFailure {
    /// Empty utterances are skipped, not failed.
    pub fn is_skip(&self) -> bool {
        self.error.is_skip()
    }
}

fn serialize_display<T: fmt::Display, S: Serializer>(
    value: &T,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone)]
pub struct PodcastResult {
    /// The input script, returned for text-only fallback.
    pub script: String,
    /// Concatenated audio, or `None` when nothing was synthesized.
    pub audio: Option<AudioClip>,
    /// Pipeline-level failure, if any.
    pub error: Option<String>,
    /// Dropped or skipped segments, in script order.
    pub failures: Vec<SegmentFailure>,
    pub stage: PipelineStage,
    /// Segments found in the script.
    pub segments: usize,
    /// Segments that made it into the audio.
    pub synthesized: usize,
}

impl PodcastResult {
    fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            audio: None,
            error: None,
            failures: Vec::new(),
            stage: PipelineStage::Idle,
            segments: 0,
            synthesized: 0,
        }
    }

    fn fail(mut self, error: impl Into<String>) -> Self {
        let error = error.into();
        warn!("Pipeline failed during {}: {}", self.stage, error);
        self.stage.advance(PipelineStage::Errored);
        self.error = Some(error);
        self.audio = None;
        self
    }

    fn finish(mut self) -> Self {
        self.stage.advance(PipelineStage::Done);
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Segments dropped because synthesis failed (skips excluded).
    pub fn dropped(&self) -> impl Iterator<Item = &SegmentFailure> {
        self.failures.iter().filter(|f| !f.is_skip())
    }

    /// The audio encoded as WAV, if there is any.
    pub fn wav_bytes(&self) -> Result<Option<Vec<u8>>> {
        self.audio.as_ref().map(AudioClip::to_wav).transpose()
    }
}

/// Turns dialogue scripts into podcast audio.
///
/// One instance owns one synthesis cache; share the pipeline (e.g. behind an
/// `Arc`) to reuse cached clips across runs.
pub struct PodcastPipeline {
    synthesizer: Arc<CachedSynthesizer>,
    voices: VoiceAssignment,
    options: PipelineOptions,
}

impl PodcastPipeline {
    /// Build the configured backend and pipeline.
    ///
    /// Fails with `BackendUnavailable` before any synthesis if the backend
    /// cannot be reached.
    pub fn new(settings: &Settings) -> Result<Self> {
        let backend = create_synthesizer(settings)?;
        Self::with_components(
            backend,
            settings.voice_assignment(),
            PipelineOptions::from(&settings.pipeline),
        )
    }

    /// Create a pipeline around an existing backend.
    pub fn with_components(
        backend: Arc<dyn Synthesizer>,
        voices: VoiceAssignment,
        options: PipelineOptions,
    ) -> Result<Self> {
        if options.max_concurrent == 0 {
            return Err(SamtaleError::Config(
                "pipeline.max_concurrent must be at least 1".to_string(),
            ));
        }
        if options.silence > MAX_SILENCE {
            return Err(SamtaleError::Config(format!(
                "pipeline.silence_ms must be at most {}",
                MAX_SILENCE.as_millis()
            )));
        }

        backend.validate_voice(voices.voice(Host::A))?;
        backend.validate_voice(voices.voice(Host::B))?;

        info!(
            "Using {} synthesis ({} / {}), {} concurrent",
            backend.name(),
            voices.voice(Host::A),
            voices.voice(Host::B),
            options.max_concurrent
        );

        let cache = Arc::new(SynthesisCache::new(options.cache_capacity));
        Ok(Self {
            synthesizer: Arc::new(CachedSynthesizer::new(backend, cache)),
            voices,
            options,
        })
    }

    pub fn backend_name(&self) -> &str {
        self.synthesizer.name()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.synthesizer.cache().stats()
    }

    /// Parse a script and resolve every segment's voice without synthesizing.
    pub fn plan(&self, script: &str) -> Vec<PlannedSegment> {
        plan_segments(script, &self.voices, self.options.sanitize)
    }

    /// Run the whole pipeline on a script.
    pub async fn run(&self, script: &str) -> PodcastResult {
        self.run_with(script, &CancellationToken::new(), None).await
    }

    /// Run on raw bytes. Input that is not UTF-8 ends in `Errored`.
    pub async fn run_bytes(&self, script: &[u8]) -> PodcastResult {
        match std::str::from_utf8(script) {
            Ok(script) => self.run(script).await,
            Err(e) => {
                let mut result = PodcastResult::new(String::from_utf8_lossy(script));
                result.stage.advance(PipelineStage::Parsing);
                result.fail(format!("Script is not valid UTF-8: {}", e))
            }
        }
    }

    /// Run with a cancellation token and an optional counter of finished segments.
    #[instrument(skip_all, fields(chars = script.len()))]
    pub async fn run_with(
        &self,
        script: &str,
        cancel: &CancellationToken,
        progress: Option<Arc<AtomicU64>>,
    ) -> PodcastResult {
        let mut result = PodcastResult::new(script);

        result.stage.advance(PipelineStage::Parsing);
        let planned = self.plan(script);
        result.segments = planned.len();

        if planned.is_empty() {
            info!("No speaker lines found, nothing to synthesize");
            return result.finish();
        }

        result.stage.advance(PipelineStage::Synthesizing);
        info!("Synthesizing {} segments", planned.len());
        let outcomes = self.synthesize_all(&planned, cancel, progress).await;

        let mut clips = Vec::with_capacity(planned.len());
        for (segment, outcome) in planned.iter().zip(outcomes) {
            match outcome {
                Ok(clip) => clips.push(clip),
                Err(error) => {
                    if error.is_skip() {
                        debug!("Skipping empty segment {} ({})", segment.order, segment.speaker);
                    } else {
                        warn!(
                            "Dropping segment {} ({}): {}",
                            segment.order, segment.speaker, error
                        );
                    }
                    result.failures.push(SegmentFailure {
                        order: segment.order,
                        speaker: segment.speaker.clone(),
                        error,
                    });
                }
            }
        }

        if result
            .failures
            .iter()
            .any(|f| f.error == SynthesisError::Cancelled)
        {
            return result.fail(SynthesisError::Cancelled.to_string());
        }

        result.stage.advance(PipelineStage::Concatenating);
        result.synthesized = clips.len();

        if clips.is_empty() {
            let dropped = result.dropped().count();
            if dropped > 0 {
                return result.fail(format!("All {} synthesizable segments failed", dropped));
            }
            info!("Every segment was empty, no audio produced");
            return result.finish();
        }

        match concatenate(&clips, self.options.silence) {
            Ok(audio) => {
                if let Some(audio) = &audio {
                    info!(
                        "Podcast ready: {} of {} segments, {:.1}s",
                        result.synthesized,
                        result.segments,
                        audio.duration().as_secs_f64()
                    );
                }
                result.audio = audio;
                result.finish()
            }
            Err(e) => result.fail(e.to_string()),
        }
    }

    /// Fan out one task per segment and join them back in script order.
    async fn synthesize_all(
        &self,
        planned: &[PlannedSegment],
        cancel: &CancellationToken,
        progress: Option<Arc<AtomicU64>>,
    ) -> Vec<SynthesisResult> {
        let tasks: Vec<_> = planned
            .iter()
            .map(|segment| {
                let progress = progress.clone();
                async move {
                    let result = self
                        .synthesize_one(&segment.text, &segment.voice, cancel)
                        .await;
                    if let Some(p) = progress {
                        p.fetch_add(1, Ordering::Relaxed);
                    }
                    debug!("Segment {} finished", segment.order);
                    (segment.order, result)
                }
            })
            .collect();

        let mut results: Vec<(usize, SynthesisResult)> = stream::iter(tasks)
            .buffer_unordered(self.options.max_concurrent)
            .collect()
            .await;

        results.sort_by_key(|(order, _)| *order);
        results.into_iter().map(|(_, result)| result).collect()
    }

    /// One segment, bounded by the deadline and the cancellation token.
    async fn synthesize_one(
        &self,
        text: &str,
        voice: &VoiceId,
        cancel: &CancellationToken,
    ) -> SynthesisResult {
        let bounded = async {
            match self.options.segment_timeout {
                Some(limit) => tokio::time::timeout(limit, self.synthesizer.synthesize(text, voice))
                    .await
                    .unwrap_or_else(|_| Err(SynthesisError::Timeout(limit))),
                None => self.synthesizer.synthesize(text, voice).await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SynthesisError::Cancelled),
            result = bounded => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioFormat;
    use crate::synthesis::mock::ScriptedSynthesizer;

    const SCRIPT: &str = "Sarah: Hello there.\nMike: Hi Sarah, great to be here.\n";

    fn voices() -> VoiceAssignment {
        VoiceAssignment::new("Sarah", "nova".into(), "Mike", "onyx".into())
    }

    fn pipeline(backend: Arc<ScriptedSynthesizer>) -> PodcastPipeline {
        PodcastPipeline::with_components(backend, voices(), PipelineOptions::default()).unwrap()
    }

    fn silence_len() -> usize {
        AudioFormat::OPENAI_PCM.bytes_for(Duration::from_millis(500))
    }

    #[tokio::test]
    async fn test_two_speaker_script_end_to_end() {
        let backend = Arc::new(ScriptedSynthesizer::new());
        let pipeline = pipeline(backend.clone());

        let result = pipeline.run(SCRIPT).await;

        assert_eq!(result.stage, PipelineStage::Done);
        assert!(result.is_success());
        assert_eq!(result.segments, 2);
        assert_eq!(result.synthesized, 2);

        let first = backend.clip_for("Hello there.");
        let second = backend.clip_for("Hi Sarah, great to be here.");
        let audio = result.audio.unwrap();
        assert_eq!(audio.len(), first.len() + silence_len() + second.len());
        assert_eq!(&audio.pcm()[..first.len()], first.pcm());
        assert_eq!(&audio.pcm()[audio.len() - second.len()..], second.pcm());
    }

    #[tokio::test]
    async fn test_script_without_speakers_is_not_an_error() {
        let pipeline = pipeline(Arc::new(ScriptedSynthesizer::new()));

        let result = pipeline.run("Just some prose.\nNo dialogue here.").await;

        assert_eq!(result.stage, PipelineStage::Done);
        assert_eq!(result.segments, 0);
        assert!(result.audio.is_none());
        assert!(result.error.is_none());
        assert_eq!(result.wav_bytes().unwrap(), None);
    }

    #[tokio::test]
    async fn test_order_survives_reversed_completion() {
        let backend = Arc::new(
            ScriptedSynthesizer::new().delay("Hello there.", Duration::from_millis(150)),
        );
        let pipeline = pipeline(backend.clone());

        let result = pipeline.run(SCRIPT).await;

        assert_eq!(
            backend.completion_order(),
            vec!["Hi Sarah, great to be here.", "Hello there."]
        );

        let first = backend.clip_for("Hello there.");
        let second = backend.clip_for("Hi Sarah, great to be here.");
        let mut expected = first.pcm().to_vec();
        expected.extend(std::iter::repeat(0u8).take(silence_len()));
        expected.extend_from_slice(second.pcm());
        assert_eq!(result.audio.unwrap().pcm(), expected.as_slice());
    }

    #[tokio::test]
    async fn test_one_failed_segment_is_dropped() {
        let backend = Arc::new(ScriptedSynthesizer::new().fail_on("Hello there."));
        let pipeline = pipeline(backend.clone());

        let result = pipeline.run(SCRIPT).await;

        assert!(result.is_success());
        assert_eq!(result.stage, PipelineStage::Done);
        assert_eq!(result.synthesized, 1);
        assert_eq!(
            result.audio.unwrap().len(),
            backend.clip_for("Hi Sarah, great to be here.").len()
        );
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].order, 0);
        assert_eq!(result.failures[0].speaker, "Sarah");
    }

    #[tokio::test]
    async fn test_all_segments_failing_sets_error() {
        let backend = Arc::new(
            ScriptedSynthesizer::new()
                .fail_on("Hello there.")
                .fail_on("Hi Sarah, great to be here."),
        );
        let pipeline = pipeline(backend);

        let result = pipeline.run(SCRIPT).await;

        assert_eq!(result.stage, PipelineStage::Errored);
        assert!(result.audio.is_none());
        assert_eq!(result.dropped().count(), 2);
        assert!(result.error.unwrap().contains("All 2"));
        assert_eq!(result.script, SCRIPT);
    }

    #[tokio::test]
    async fn test_empty_segments_are_skipped_quietly() {
        let pipeline = pipeline(Arc::new(ScriptedSynthesizer::new()));

        let result = pipeline.run("Sarah: <pause/>\nMike: Sure.").await;

        assert!(result.is_success());
        assert_eq!(result.synthesized, 1);
        assert_eq!(result.failures.len(), 1);
        assert!(result.failures[0].is_skip());
        assert_eq!(result.dropped().count(), 0);

        let only_empty = pipeline.run("Sarah:\nMike: ~~~").await;
        assert_eq!(only_empty.stage, PipelineStage::Done);
        assert!(only_empty.audio.is_none());
        assert!(only_empty.error.is_none());
    }

    #[tokio::test]
    async fn test_cache_spans_runs() {
        let backend = Arc::new(ScriptedSynthesizer::new());
        let pipeline = pipeline(backend.clone());

        let first = pipeline.run(SCRIPT).await;
        let second = pipeline.run(SCRIPT).await;

        assert_eq!(backend.calls(), 2);
        assert_eq!(first.audio, second.audio);
        assert_eq!(pipeline.cache_stats().hits, 2);
    }

    #[tokio::test]
    async fn test_segment_timeout_drops_segment() {
        let backend = Arc::new(
            ScriptedSynthesizer::new().delay("Hello there.", Duration::from_secs(30)),
        );
        let options = PipelineOptions {
            segment_timeout: Some(Duration::from_millis(50)),
            ..PipelineOptions::default()
        };
        let pipeline = PodcastPipeline::with_components(backend, voices(), options).unwrap();

        let result = pipeline.run(SCRIPT).await;

        assert!(result.is_success());
        assert_eq!(result.synthesized, 1);
        assert_eq!(
            result.failures[0].error,
            SynthesisError::Timeout(Duration::from_millis(50))
        );
    }

    #[tokio::test]
    async fn test_cancellation_resolves_outstanding_segments() {
        let backend = Arc::new(
            ScriptedSynthesizer::new()
                .delay("Hello there.", Duration::from_secs(30))
                .delay("Hi Sarah, great to be here.", Duration::from_secs(30)),
        );
        let pipeline = pipeline(backend);
        let cancel = CancellationToken::new();
        let progress = Arc::new(AtomicU64::new(0));

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result = pipeline
            .run_with(SCRIPT, &cancel, Some(progress.clone()))
            .await;

        assert_eq!(result.stage, PipelineStage::Errored);
        assert_eq!(result.error.as_deref(), Some("cancelled"));
        assert!(result.audio.is_none());
        assert_eq!(result.failures.len(), 2);
        assert!(result
            .failures
            .iter()
            .all(|f| f.error == SynthesisError::Cancelled));
        assert_eq!(progress.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_cancel_after_last_segment_keeps_podcast() {
        let cancel = CancellationToken::new();
        let backend = Arc::new(
            ScriptedSynthesizer::new().cancel_after("Hi Sarah, great to be here.", cancel.clone()),
        );
        let options = PipelineOptions {
            max_concurrent: 1,
            ..PipelineOptions::default()
        };
        let pipeline = PodcastPipeline::with_components(backend, voices(), options).unwrap();

        let result = pipeline.run_with(SCRIPT, &cancel, None).await;

        assert!(cancel.is_cancelled());
        assert_eq!(result.stage, PipelineStage::Done);
        assert!(result.error.is_none());
        assert_eq!(result.synthesized, 2);
        assert!(result.audio.is_some());
    }

    #[tokio::test]
    async fn test_in_flight_syntheses_never_exceed_limit() {
        let backend = Arc::new(ScriptedSynthesizer::new().delay_all(Duration::from_millis(20)));
        let options = PipelineOptions {
            max_concurrent: 2,
            ..PipelineOptions::default()
        };
        let pipeline = PodcastPipeline::with_components(backend.clone(), voices(), options).unwrap();
        let script: String = (0..10)
            .map(|i| {
                let speaker = if i % 2 == 0 { "Sarah" } else { "Mike" };
                format!("{}: Line number {}.\n", speaker, i)
            })
            .collect();

        let result = pipeline.run(&script).await;

        assert_eq!(result.synthesized, 10);
        assert_eq!(backend.calls(), 10);
        assert_eq!(backend.peak_in_flight(), 2);
    }

    #[test]
    fn test_run_future_is_send() {
        fn assert_send<T: Send>(_: &T) {}

        let pipeline = pipeline(Arc::new(ScriptedSynthesizer::new()));
        let cancel = CancellationToken::new();
        assert_send(&pipeline.run_bytes(b"Sarah: Hi."));
        assert_send(&pipeline.run_with(SCRIPT, &cancel, None));
    }

    #[tokio::test]
    async fn test_format_mismatch_fails_pipeline() {
        let backend = Arc::new(
            ScriptedSynthesizer::new()
                .format_on("Hi Sarah, great to be here.", AudioFormat::new(22_050, 1)),
        );
        let pipeline = pipeline(backend);

        let result = pipeline.run(SCRIPT).await;

        assert_eq!(result.stage, PipelineStage::Errored);
        assert!(result.audio.is_none());
        assert!(result.error.unwrap().contains("format mismatch"));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_errored() {
        let pipeline = pipeline(Arc::new(ScriptedSynthesizer::new()));

        let result = pipeline.run_bytes(b"Sarah: \xff\xfe broken").await;

        assert_eq!(result.stage, PipelineStage::Errored);
        assert!(result.error.unwrap().contains("UTF-8"));
    }

    #[test]
    fn test_plan_collapses_continuations_and_falls_back() {
        let pipeline = pipeline(Arc::new(ScriptedSynthesizer::new()));
        let script = "Host: Welcome <b>everyone</b>!\nThis is the show.\nGuest: Thanks.\n*waves*";

        let planned = pipeline.plan(script);

        assert_eq!(planned.len(), 2);
        assert_eq!(planned[0].text, "Welcome everyone! This is the show.");
        assert_eq!(planned[0].voice, VoiceId::new("nova"));
        assert!(!planned[0].known);
        assert_eq!(planned[1].text, "Thanks. waves");
        assert_eq!(planned[1].voice, VoiceId::new("onyx"));
    }

    #[test]
    fn test_excessive_silence_is_rejected() {
        let options = PipelineOptions {
            silence: MAX_SILENCE + Duration::from_millis(1),
            ..PipelineOptions::default()
        };
        let result = PodcastPipeline::with_components(
            Arc::new(ScriptedSynthesizer::new()),
            voices(),
            options,
        );
        assert!(matches!(result, Err(SamtaleError::Config(_))));

        let options = PipelineOptions {
            silence: MAX_SILENCE,
            ..PipelineOptions::default()
        };
        assert!(PodcastPipeline::with_components(
            Arc::new(ScriptedSynthesizer::new()),
            voices(),
            options,
        )
        .is_ok());
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let options = PipelineOptions {
            max_concurrent: 0,
            ..PipelineOptions::default()
        };
        let result = PodcastPipeline::with_components(
            Arc::new(ScriptedSynthesizer::new()),
            voices(),
            options,
        );
        assert!(matches!(result, Err(SamtaleError::Config(_))));
    }
}
