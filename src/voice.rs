//! Speaker-to-voice assignment.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A backend-specific voice identifier (e.g. `nova` for OpenAI, `en-gb` for espeak-ng).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoiceId(String);

impl VoiceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VoiceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One of the two podcast hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Host {
    A,
    B,
}

impl Host {
    /// Alternating fallback: even positions go to host A, odd to host B.
    pub fn for_position(order: usize) -> Self {
        if order % 2 == 0 {
            Host::A
        } else {
            Host::B
        }
    }
}

/// Static mapping from the two canonical speaker labels to voices.
///
/// Labels are matched case-insensitively after trimming. Any other label
/// falls back to [`Host::for_position`], so every segment resolves to a voice.
#[derive(Debug, Clone)]
pub struct VoiceAssignment {
    label_a: String,
    label_b: String,
    voice_a: VoiceId,
    voice_b: VoiceId,
}

impl VoiceAssignment {
    pub fn new(
        label_a: impl Into<String>,
        voice_a: VoiceId,
        label_b: impl Into<String>,
        voice_b: VoiceId,
    ) -> Self {
        Self {
            label_a: label_a.into().trim().to_lowercase(),
            label_b: label_b.into().trim().to_lowercase(),
            voice_a,
            voice_b,
        }
    }

    /// Which host speaks a segment.
    pub fn host_for(&self, speaker: &str, order: usize) -> Host {
        let speaker = speaker.trim().to_lowercase();
        if !speaker.is_empty() && speaker == self.label_a {
            Host::A
        } else if !speaker.is_empty() && speaker == self.label_b {
            Host::B
        } else {
            Host::for_position(order)
        }
    }

    /// The voice a segment is synthesized with.
    pub fn resolve(&self, speaker: &str, order: usize) -> &VoiceId {
        self.voice(self.host_for(speaker, order))
    }

    pub fn voice(&self, host: Host) -> &VoiceId {
        match host {
            Host::A => &self.voice_a,
            Host::B => &self.voice_b,
        }
    }

    /// Whether the label is one of the two table entries.
    pub fn is_known(&self, speaker: &str) -> bool {
        let speaker = speaker.trim().to_lowercase();
        !speaker.is_empty() && (speaker == self.label_a || speaker == self.label_b)
    }
}
