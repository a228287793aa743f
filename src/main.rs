//! Samtale CLI entry point.

use anyhow::Result;
use clap::Parser;
use samtale::cli::{commands, Cli, Commands};
use samtale::config::Settings;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.as_ref().map(PathBuf::from);
    let settings = Settings::load_from(config_path.as_ref())?;

    // Initialize logging; -v flags override the configured level
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("samtale={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    // Execute command
    match cli.command {
        Commands::Podcast {
            script,
            output,
            backend,
            no_sanitize,
            concurrency,
        } => {
            std::fs::create_dir_all(settings.temp_dir())?;
            let args = commands::PodcastArgs {
                script,
                output,
                backend,
                no_sanitize,
                concurrency,
            };
            commands::run_podcast(args, settings).await?;
        }

        Commands::Parse { script, json } => {
            commands::run_parse(&script, json, &settings)?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings, config_path.as_ref())?;
        }

        Commands::Serve { host, port } => {
            std::fs::create_dir_all(settings.temp_dir())?;
            commands::run_serve(&host, port, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(&action, settings, config_path)?;
        }
    }

    Ok(())
}
