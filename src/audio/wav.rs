//! WAV encoding and decoding via `hound`.

use super::{AudioClip, AudioFormat, BYTES_PER_SAMPLE};
use crate::error::{Result, SamtaleError};
use std::io::Cursor;

/// Encode a clip as a 16-bit PCM WAV file.
pub fn encode_wav(clip: &AudioClip) -> Result<Vec<u8>> {
    let format = clip.format();
    let spec = hound::WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: (BYTES_PER_SAMPLE * 8) as u16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut wav_data = Vec::with_capacity(clip.len() + 44);
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut wav_data), spec)?;
        for sample in clip.samples() {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }

    Ok(wav_data)
}

/// Decode a 16-bit integer PCM WAV file into a clip.
pub fn decode_wav(bytes: &[u8]) -> Result<AudioClip> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(SamtaleError::InvalidInput(format!(
            "Unsupported WAV sample format: {:?} {}-bit",
            spec.sample_format, spec.bits_per_sample
        )));
    }

    let mut pcm = Vec::with_capacity(reader.len() as usize * BYTES_PER_SAMPLE);
    for sample in reader.samples::<i16>() {
        pcm.extend_from_slice(&sample?.to_le_bytes());
    }

    AudioClip::new(AudioFormat::new(spec.sample_rate, spec.channels), pcm)
}
