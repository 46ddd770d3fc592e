pub mod capture;
pub mod file;
pub mod pcm;
pub mod resample;

pub use capture::{AudioFrame, CapturePipeline, MicrophoneSource, ScriptedMicrophone};
pub use file::WavMicrophone;
pub use pcm::{decode_buffer, encode_chunk, DecodedBuffer, EncodedChunk};
pub use resample::resample;

/// Sample rate the live service accepts for audio sent to it (16kHz mono PCM)
pub const PCM_INPUT_RATE: u32 = 16_000;

/// Sample rate of audio received back from the live service (24kHz mono PCM)
pub const PCM_OUTPUT_RATE: u32 = 24_000;

/// Samples per capture callback invocation. Smaller frames lower latency at
/// the cost of per-frame overhead.
pub const CAPTURE_FRAME_SAMPLES: usize = 4096;
