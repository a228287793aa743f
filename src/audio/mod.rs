//! PCM audio clips and the operations the pipeline needs on them.
//!
//! Every clip is 16-bit signed little-endian PCM tagged with its sample rate
//! and channel count. Clips are joined at the sample level and only encoded
//! once, as WAV, at the very end. Compressed formats are never concatenated
//! byte-wise.

mod concat;
mod wav;

pub use concat::concatenate;
pub use wav::{decode_wav, encode_wav};

use crate::error::{Result, SamtaleError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Bytes per sample for the only sample format the crate handles.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Sample layout shared by every clip that goes into one podcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    pub const fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Raw PCM returned by the OpenAI speech endpoint.
    pub const OPENAI_PCM: AudioFormat = AudioFormat::new(24_000, 1);

    /// Bytes in one frame (one sample per channel).
    pub fn frame_size(&self) -> usize {
        self.channels as usize * BYTES_PER_SAMPLE
    }

    /// Number of bytes covering `duration`, rounded down to whole frames.
    ///
    /// Saturates at `usize::MAX` rather than wrapping.
    pub fn bytes_for(&self, duration: Duration) -> usize {
        let frames = (self.sample_rate as u128 * duration.as_millis()) / 1000;
        usize::try_from(frames)
            .unwrap_or(usize::MAX)
            .saturating_mul(self.frame_size())
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz / {} ch / s16le",
            self.sample_rate, self.channels
        )
    }
}

/// A synthesized piece of audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    format: AudioFormat,
    pcm: Vec<u8>,
}

impl AudioClip {
    /// Wrap raw PCM bytes. The length must be a whole number of frames.
    pub fn new(format: AudioFormat, pcm: Vec<u8>) -> Result<Self> {
        if format.sample_rate == 0 || format.channels == 0 {
            return Err(SamtaleError::InvalidInput(format!(
                "Unusable audio format: {}",
                format
            )));
        }
        if pcm.len() % format.frame_size() != 0 {
            return Err(SamtaleError::InvalidInput(format!(
                "PCM length {} is not a multiple of the {}-byte frame size",
                pcm.len(),
                format.frame_size()
            )));
        }
        Ok(Self { format, pcm })
    }

    /// Zero-valued samples lasting `duration`.
    pub fn silence(format: AudioFormat, duration: Duration) -> Self {
        Self {
            format,
            pcm: vec![0u8; format.bytes_for(duration)],
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn pcm(&self) -> &[u8] {
        &self.pcm
    }

    /// PCM length in bytes.
    pub fn len(&self) -> usize {
        self.pcm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }

    pub fn duration(&self) -> Duration {
        let frames = (self.pcm.len() / self.format.frame_size()) as u64;
        Duration::from_millis(frames * 1000 / self.format.sample_rate as u64)
    }

    /// Samples decoded from the little-endian byte buffer.
    pub fn samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.pcm
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
    }

    /// Encode as a playable WAV file.
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        encode_wav(self)
    }
}
