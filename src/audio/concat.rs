//! Sample-level concatenation with inter-segment silence.

use super::AudioClip;
use crate::error::{Result, SamtaleError};
use std::time::Duration;
use tracing::debug;

/// Join clips in the given order, inserting `gap` of silence between
/// neighbours.
///
/// All clips must share one [`AudioFormat`](super::AudioFormat); nothing is
/// resampled. Returns `Ok(None)` when there is nothing to join.
pub fn concatenate(clips: &[AudioClip], gap: Duration) -> Result<Option<AudioClip>> {
    let Some(first) = clips.first() else {
        return Ok(None);
    };
    let format = first.format();

    if let Some((index, clip)) = clips
        .iter()
        .enumerate()
        .find(|(_, c)| c.format() != format)
    {
        return Err(SamtaleError::FormatMismatch {
            expected: format.to_string(),
            found: clip.format().to_string(),
            index,
        });
    }

    let silence = AudioClip::silence(format, gap);
    let total = clips.iter().map(AudioClip::len).sum::<usize>()
        + silence.len() * (clips.len() - 1);

    let mut pcm = Vec::with_capacity(total);
    for (i, clip) in clips.iter().enumerate() {
        if i > 0 {
            pcm.extend_from_slice(silence.pcm());
        }
        pcm.extend_from_slice(clip.pcm());
    }

    debug!(
        "Concatenated {} clips into {} bytes ({})",
        clips.len(),
        pcm.len(),
        format
    );

    AudioClip::new(format, pcm).map(Some)
}
