pub mod audio;
pub mod config;
pub mod content;
pub mod error;
pub mod playback;
pub mod progress;
pub mod session;
pub mod transport;

pub use audio::{
    decode_buffer, encode_chunk, resample, AudioFrame, CapturePipeline, DecodedBuffer,
    EncodedChunk, MicrophoneSource, ScriptedMicrophone, WavMicrophone, CAPTURE_FRAME_SAMPLES,
    PCM_INPUT_RATE, PCM_OUTPUT_RATE,
};
pub use config::Config;
pub use content::{fetch_with_retry, RetryPolicy, Scenario, Topic, UserLevel, VocabItem};
pub use error::SessionError;
pub use playback::{AudioSink, ManualSink, ManualSinkHandle, PlaybackScheduler, SourceId, TimerSink};
pub use progress::{Category, Level, ProgressSink, ProgressTracker};
pub use session::{
    AudioEnvironment, AudioSessionContext, PostSessionView, Role, SessionController, SessionState,
    TeardownReason, Transcript, TranscriptEntry, VisualizerState, VoicePreferences,
};
pub use transport::{
    GeminiLiveTransport, LiveSession, LiveTransport, ServerEvent, SessionEvent, SessionSetup,
};
