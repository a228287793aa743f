//! CLI command implementations.

mod config;
mod doctor;
mod parse;
mod podcast;
mod serve;

pub use config::run_config;
pub use doctor::run_doctor;
pub use parse::run_parse;
pub use podcast::{run_podcast, PodcastArgs};
pub use serve::run_serve;

use anyhow::{Context, Result};
use std::io::Read;

/// Read a script from a file, or from stdin when `source` is `-`.
fn read_script(source: &str) -> Result<String> {
    let bytes = if source == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("Failed to read script from stdin")?;
        buf
    } else {
        std::fs::read(source).with_context(|| format!("Failed to read script {}", source))?
    };

    String::from_utf8(bytes).map_err(|e| anyhow::anyhow!("Script is not valid UTF-8: {}", e))
}
