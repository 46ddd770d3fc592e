//! Duplex channel abstraction over the live voice service
//!
//! The session controller never talks to a websocket directly: a transport
//! hands it an outbound chunk sink and an inbound event stream, so the state
//! machine is substitutable with a fake in tests.

pub mod gemini;
pub mod messages;

use tokio::sync::mpsc;

use crate::audio::EncodedChunk;

pub use gemini::GeminiLiveTransport;

/// Parameters for opening one live session
#[derive(Debug, Clone)]
pub struct SessionSetup {
    /// Model identifier on the live endpoint
    pub model: String,
    /// Prebuilt voice name for synthesized speech
    pub voice_name: String,
    /// System instruction framing the roleplay
    pub system_instruction: String,
}

/// One inbound message from the remote service while connected.
/// All fields are optional on the wire; absent fields are simply unset.
#[derive(Debug, Clone, Default)]
pub struct ServerEvent {
    /// Transcript delta for the model's synthesized speech
    pub output_transcription: Option<String>,
    /// Transcript delta for the user's recognized speech
    pub input_transcription: Option<String>,
    /// Base64 PCM audio payload
    pub audio_data: Option<String>,
    /// The in-progress utterance should stop immediately
    pub interrupted: bool,
    /// The model finished its turn
    pub turn_complete: bool,
}

/// Lifecycle events delivered to the session controller
#[derive(Debug)]
pub enum SessionEvent {
    /// Remote acknowledged the session; the outbound channel is live
    Opened,
    Message(ServerEvent),
    /// Remote closed the connection normally
    Closed,
    /// Transport failure; fatal for this session
    Error(String),
}

/// A connected duplex session: a sink for outbound encoded chunks and a
/// stream of inbound events.
pub struct LiveSession {
    pub outbound: mpsc::Sender<EncodedChunk>,
    pub events: mpsc::Receiver<SessionEvent>,
}

/// Capacity of the outbound chunk channel. Bounded so a stalled network
/// back-pressures into frame drops instead of unbounded buffering.
pub const OUTBOUND_CHANNEL_CAPACITY: usize = 64;

#[async_trait::async_trait]
pub trait LiveTransport: Send + Sync {
    async fn connect(&self, setup: SessionSetup) -> anyhow::Result<LiveSession>;
}
