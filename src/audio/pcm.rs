use anyhow::{bail, Context, Result};
use base64::Engine;

use super::{PCM_INPUT_RATE, PCM_OUTPUT_RATE};

/// Wire representation of one outbound audio chunk: base64 little-endian
/// 16-bit PCM plus a MIME-like tag carrying the sample rate. Immutable once
/// constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedChunk {
    pub data: String,
    pub mime_type: String,
}

/// A playable audio buffer reconstructed from a received PCM payload.
/// Mono float samples at the service's fixed output rate.
#[derive(Debug, Clone)]
pub struct DecodedBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedBuffer {
    /// Playback duration in seconds
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Encode float samples in [-1.0, 1.0] as a base64 PCM chunk for the wire.
///
/// Samples are clamped, then scaled asymmetrically (`s * 32768` for negative
/// values, `s * 32767` for positive) so the full signed 16-bit range is used
/// without overflow.
pub fn encode_chunk(samples: &[f32]) -> EncodedChunk {
    let mut bytes = Vec::with_capacity(samples.len() * 2);

    for &sample in samples {
        let s = sample.clamp(-1.0, 1.0);
        let value = if s < 0.0 {
            (s * 32768.0) as i16
        } else {
            (s * 32767.0) as i16
        };
        bytes.extend_from_slice(&value.to_le_bytes());
    }

    EncodedChunk {
        data: base64::engine::general_purpose::STANDARD.encode(&bytes),
        mime_type: format!("audio/pcm;rate={}", PCM_INPUT_RATE),
    }
}

/// Decode a base64 PCM payload received from the live service into a
/// playable buffer at the fixed 24kHz output rate.
///
/// A malformed payload is an error for this one chunk only; callers drop the
/// chunk and keep the session alive.
pub fn decode_buffer(data: &str) -> Result<DecodedBuffer> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .context("Invalid base64 in audio payload")?;

    if bytes.len() % 2 != 0 {
        bail!("PCM payload has odd byte length: {}", bytes.len());
    }

    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();

    Ok(DecodedBuffer {
        samples,
        sample_rate: PCM_OUTPUT_RATE,
    })
}
