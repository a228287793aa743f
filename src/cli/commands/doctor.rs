//! Doctor command - verify system requirements and configuration.

use crate::cli::Output;
use crate::config::{Settings, SynthesisBackend};
use crate::orchestrator::MAX_SILENCE;
use crate::synthesis::OPENAI_VOICES;
use crate::voice::Host;
use console::style;
use std::path::PathBuf;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    /// Errors for a backend that is not in use are only warnings.
    fn downgrade_unless(mut self, active: bool) -> Self {
        if !active && self.status == CheckStatus::Error {
            self.status = CheckStatus::Warning;
            self.message = format!("{} (backend not selected)", self.message);
        }
        self
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings, config_path: Option<&PathBuf>) -> anyhow::Result<()> {
    Output::header("Samtale Doctor");
    println!();
    println!("Checking speech backends and configuration...\n");

    let mut checks = Vec::new();
    let active = settings.synthesis.backend;

    // The inactive backend only warns
    println!("{}", style("Speech Backends").bold());
    let espeak = &settings.synthesis.espeak;
    let espeak_check = check_tool(&espeak.binary, install_hint_espeak())
        .downgrade_unless(active == SynthesisBackend::Espeak);
    espeak_check.print();
    checks.push(espeak_check);

    let api_check = check_openai_api_key().downgrade_unless(active == SynthesisBackend::OpenAI);
    api_check.print();
    checks.push(api_check);

    println!();

    println!("{}", style("Voices").bold());
    let voice_check = check_voices(settings);
    voice_check.print();
    checks.push(voice_check);

    println!();

    // Check directories
    println!("{}", style("Directories").bold());
    let dir_checks = check_directories(settings);
    for check in &dir_checks {
        check.print();
    }
    checks.extend(dir_checks);

    println!();

    // Check configuration
    println!("{}", style("Configuration").bold());
    let config_check = check_config_file(config_path);
    config_check.print();
    checks.push(config_check);
    let pipeline_check = check_pipeline(settings);
    pipeline_check.print();
    checks.push(pipeline_check);

    println!();

    // Summary
    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Samtale.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!(
            "All checks passed with {} warning(s).",
            warnings
        ));
    } else {
        Output::success("All checks passed! Samtale is ready to use.");
    }

    Ok(())
}

/// Check if an external tool is available.
fn check_tool(name: &str, hint: &str) -> CheckResult {
    match Command::new(name).arg("--version").output() {
        Ok(output) if output.status.success() => {
            // Try to extract version from first line
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .to_string();

            // Truncate long version strings
            let version_display = if version.chars().count() > 50 {
                format!("{}...", version.chars().take(50).collect::<String>())
            } else {
                version
            };

            CheckResult::ok(name, &version_display)
        }
        Ok(_) => CheckResult::error(name, "installed but not working", hint),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error(name, "not found", hint)
        }
        Err(e) => CheckResult::error(name, &format!("error: {}", e), hint),
    }
}

/// Check if OpenAI API key is configured.
fn check_openai_api_key() -> CheckResult {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if key.starts_with("sk-") && key.len() > 20 => {
            let masked = format!("{}...{}", &key[..7], &key[key.len() - 4..]);
            CheckResult::ok("OPENAI_API_KEY", &format!("configured ({})", masked))
        }
        Ok(key) if key.trim().is_empty() => CheckResult::error(
            "OPENAI_API_KEY",
            "empty",
            "Set with: export OPENAI_API_KEY='sk-...'",
        ),
        Ok(_) => CheckResult::warning(
            "OPENAI_API_KEY",
            "set but format looks unusual",
            "Expected format: sk-... (OpenAI API key)",
        ),
        Err(_) => CheckResult::error(
            "OPENAI_API_KEY",
            "not set",
            "Set with: export OPENAI_API_KEY='sk-...'",
        ),
    }
}

/// Check the voices configured for the active backend.
fn check_voices(settings: &Settings) -> CheckResult {
    let voices = settings.voice_assignment();
    let summary = format!(
        "{} -> {}, {} -> {}",
        settings.voices.host_a,
        voices.voice(Host::A),
        settings.voices.host_b,
        voices.voice(Host::B)
    );

    if settings.voices.host_a.trim().eq_ignore_ascii_case(settings.voices.host_b.trim()) {
        return CheckResult::error(
            "Voices",
            &summary,
            "voices.host_a and voices.host_b must be different labels",
        );
    }

    if settings.synthesis.backend == SynthesisBackend::OpenAI {
        let unknown: Vec<&str> = [voices.voice(Host::A), voices.voice(Host::B)]
            .into_iter()
            .map(|v| v.as_str())
            .filter(|v| !OPENAI_VOICES.contains(&v.to_lowercase().as_str()))
            .collect();
        if !unknown.is_empty() {
            return CheckResult::error(
                "Voices",
                &format!("unknown OpenAI voice(s): {}", unknown.join(", ")),
                &format!("Available: {}", OPENAI_VOICES.join(", ")),
            );
        }
    }

    CheckResult::ok("Voices", &summary)
}

/// Check temp and output directories.
fn check_directories(settings: &Settings) -> Vec<CheckResult> {
    [("Temp directory", settings.temp_dir()), ("Output directory", settings.output_dir())]
        .into_iter()
        .map(|(name, dir)| {
            if dir.exists() {
                CheckResult::ok(name, &format!("{}", dir.display()))
            } else {
                CheckResult::warning(
                    name,
                    &format!("{} (will be created)", dir.display()),
                    "Directory will be created on first use",
                )
            }
        })
        .collect()
}

/// Check if config file exists.
fn check_config_file(config_path: Option<&PathBuf>) -> CheckResult {
    let config_path = config_path.cloned().unwrap_or_else(Settings::default_config_path);
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: samtale config edit",
        )
    }
}

/// Check pipeline tuning values.
fn check_pipeline(settings: &Settings) -> CheckResult {
    let pipeline = &settings.pipeline;
    if pipeline.max_concurrent == 0 {
        return CheckResult::error(
            "Pipeline",
            "max_concurrent is 0",
            "Set with: samtale config set pipeline.max_concurrent 2",
        );
    }
    if pipeline.silence() > MAX_SILENCE {
        return CheckResult::error(
            "Pipeline",
            &format!("silence_ms {} is above {}", pipeline.silence_ms, MAX_SILENCE.as_millis()),
            "Set with: samtale config set pipeline.silence_ms 500",
        );
    }

    let timeout = match pipeline.segment_timeout() {
        Some(t) => format!("{}s timeout", t.as_secs()),
        None => "no timeout".to_string(),
    };
    let summary = format!(
        "{} concurrent, {}, {} ms silence",
        pipeline.max_concurrent, timeout, pipeline.silence_ms
    );

    if pipeline.cache_capacity == 0 {
        CheckResult::warning(
            "Pipeline",
            &format!("{}, unbounded cache", summary),
            "Long-running servers should set pipeline.cache_capacity",
        )
    } else {
        CheckResult::ok("Pipeline", &format!("{}, cache {} clips", summary, pipeline.cache_capacity))
    }
}

/// Platform-specific install hint for espeak-ng.
fn install_hint_espeak() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install espeak-ng"
    } else if cfg!(target_os = "linux") {
        "Install with: sudo apt install espeak-ng (or your package manager)"
    } else {
        "Install from: https://github.com/espeak-ng/espeak-ng"
    }
}
