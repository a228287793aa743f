//! Podcast command - synthesize a script into a WAV file.

use super::read_script;
use crate::cancel::CancellationToken;
use crate::cli::preflight::{self, Operation};
use crate::cli::{format_duration, format_size, Output};
use crate::config::{Settings, SynthesisBackend};
use crate::orchestrator::{PodcastPipeline, PodcastResult};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Command-line overrides for one podcast run.
#[derive(Debug, Default)]
pub struct PodcastArgs {
    pub script: String,
    pub output: Option<String>,
    pub backend: Option<String>,
    pub no_sanitize: bool,
    pub concurrency: Option<usize>,
}

/// Run the podcast command.
pub async fn run_podcast(args: PodcastArgs, mut settings: Settings) -> Result<()> {
    apply_overrides(&args, &mut settings)?;

    // Fail before reading anything if the backend cannot work
    preflight::check(Operation::Podcast, &settings)?;

    let script = read_script(&args.script)?;
    let pipeline = PodcastPipeline::new(&settings)?;

    let planned = pipeline.plan(&script);
    if planned.is_empty() {
        Output::warning("No 'Speaker: text' lines found, nothing to synthesize.");
        print_fallback(&script);
        return Ok(());
    }

    Output::info(&format!(
        "Synthesizing {} segments with {}",
        planned.len(),
        pipeline.backend_name()
    ));

    let result = run_with_progress(&pipeline, &script, planned.len() as u64).await;

    print_summary(&result);

    if let Some(error) = &result.error {
        Output::error(&format!("Podcast generation failed: {}", error));
        print_fallback(&result.script);
        anyhow::bail!("podcast generation failed");
    }

    let Some(wav) = result.wav_bytes()? else {
        Output::warning("Every segment was empty, no audio written.");
        return Ok(());
    };

    let output_path = match &args.output {
        Some(path) => Settings::expand_path(path),
        None => settings.output_dir().join(default_file_name()),
    };
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&output_path, &wav)?;
    info!("Wrote {} bytes to {}", wav.len(), output_path.display());

    Output::success(&format!("Saved to {}", output_path.display()));
    Output::kv("Size", &format_size(wav.len()));

    Ok(())
}

fn apply_overrides(args: &PodcastArgs, settings: &mut Settings) -> Result<()> {
    if let Some(backend) = &args.backend {
        settings.synthesis.backend = backend
            .parse::<SynthesisBackend>()
            .map_err(|e| anyhow::anyhow!(e))?;
    }
    if args.no_sanitize {
        settings.pipeline.sanitize = false;
    }
    if let Some(concurrency) = args.concurrency {
        settings.pipeline.max_concurrent = concurrency;
    }
    Ok(())
}

/// Run the pipeline, driving a progress bar and cancelling on Ctrl+C.
async fn run_with_progress(pipeline: &PodcastPipeline, script: &str, total: u64) -> PodcastResult {
    let cancel = CancellationToken::new();
    let progress = Arc::new(AtomicU64::new(0));

    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let pb = Output::progress_bar(total, "Synthesizing");
    let run = pipeline.run_with(script, &cancel, Some(progress.clone()));
    tokio::pin!(run);

    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    let result = loop {
        tokio::select! {
            result = &mut run => break result,
            _ = ticker.tick() => pb.set_position(progress.load(Ordering::Relaxed)),
        }
    };

    pb.finish_and_clear();
    interrupt.abort();
    result
}

fn print_summary(result: &PodcastResult) {
    Output::header("Podcast");
    Output::kv("Segments", &result.segments.to_string());
    Output::kv("Synthesized", &result.synthesized.to_string());

    let dropped: Vec<_> = result.dropped().collect();
    Output::kv("Dropped", &dropped.len().to_string());
    if let Some(audio) = &result.audio {
        Output::kv("Duration", &format_duration(audio.duration()));
        Output::kv("Format", &audio.format().to_string());
    }

    for failure in dropped {
        Output::warning(&format!(
            "Segment {} ({}) dropped: {}",
            failure.order, failure.speaker, failure.error
        ));
    }
    println!();
}

/// Text-only fallback when there is no audio.
fn print_fallback(script: &str) {
    Output::header("Script");
    println!("{}", script.trim_end());
}

fn default_file_name() -> PathBuf {
    PathBuf::from(format!(
        "podcast-{}.wav",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    ))
}
