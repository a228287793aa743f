//! Parse command - show segments and voices without synthesizing.

use super::read_script;
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::{plan_segments, PlannedSegment};
use anyhow::Result;

/// Run the parse command.
pub fn run_parse(script: &str, json: bool, settings: &Settings) -> Result<()> {
    let script = read_script(script)?;
    let planned = plan(&script, settings);

    if json {
        println!("{}", serde_json::to_string_pretty(&planned)?);
        return Ok(());
    }

    if planned.is_empty() {
        Output::warning("No 'Speaker: text' lines found.");
        return Ok(());
    }

    Output::header(&format!("{} segments", planned.len()));
    for segment in &planned {
        Output::segment(
            segment.order,
            &segment.speaker,
            segment.voice.as_str(),
            segment.known,
            &segment.text,
        );
    }

    let empty = planned.iter().filter(|s| s.text.is_empty()).count();
    if empty > 0 {
        println!();
        Output::warning(&format!("{} segment(s) have no text and will be skipped.", empty));
    }

    Ok(())
}

fn plan(script: &str, settings: &Settings) -> Vec<PlannedSegment> {
    plan_segments(script, &settings.voice_assignment(), settings.pipeline.sanitize)
}
