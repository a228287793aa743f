//! Dialogue script parsing.
//!
//! Scripts use one line per utterance in the form `Speaker: text`. Lines
//! without a delimiter continue the utterance above them; anything before
//! the first speaker line is ignored.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Separates the speaker label from the utterance.
pub const SPEAKER_DELIMITER: char = ':';

/// One speaker's contiguous utterance extracted from a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueSegment {
    /// Speaker label as written in the script (trimmed).
    pub speaker: String,
    /// Utterance text, continuation lines joined with a single space.
    pub text: String,
    /// Position of the segment in the script, starting at 0.
    pub order: usize,
}

impl DialogueSegment {
    fn new(speaker: &str, text: &str, order: usize) -> Self {
        Self {
            speaker: speaker.trim().to_string(),
            text: text.trim().to_string(),
            order,
        }
    }

    fn push_continuation(&mut self, line: &str) {
        if self.text.is_empty() {
            self.text = line.to_string();
        } else {
            self.text.push(' ');
            self.text.push_str(line);
        }
    }
}

/// Parse a dialogue script into ordered segments.
///
/// A script without any speaker line yields an empty vector; callers treat
/// that as "nothing to synthesize".
pub fn parse_script(script: &str) -> Vec<DialogueSegment> {
    let mut segments: Vec<DialogueSegment> = Vec::new();

    for line in script.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some((speaker, text)) = line.split_once(SPEAKER_DELIMITER) {
            let order = segments.len();
            segments.push(DialogueSegment::new(speaker, text, order));
        } else if let Some(current) = segments.last_mut() {
            current.push_continuation(line);
        }
    }

    segments
}

fn markup_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid markup regex"))
}

fn disallowed_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^\w\s.,?!]").expect("valid allow-list regex"))
}

fn whitespace_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"))
}

fn detached_punctuation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+([.,?!])").expect("valid punctuation regex"))
}

/// Strip markup tags and anything outside word characters, whitespace and
/// `. , ? !` so the text is safe to hand to a speech backend.
///
/// Tags become a space so words on either side stay apart; punctuation
/// left dangling after a closing tag is pulled back onto its word.
pub fn sanitize_text(text: &str) -> String {
    let without_tags = markup_pattern().replace_all(text, " ");
    let allowed = disallowed_pattern().replace_all(&without_tags, "");
    let collapsed = whitespace_pattern().replace_all(&allowed, " ");
    detached_punctuation_pattern()
        .replace_all(&collapsed, "$1")
        .trim()
        .to_string()
}
