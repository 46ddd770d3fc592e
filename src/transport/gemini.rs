use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::messages::{
    Content, EmptyConfig, GenerationConfig, MediaChunk, PrebuiltVoiceConfig, RealtimeInput,
    RealtimeInputMessage, ServerMessage, Setup, SetupMessage, SpeechConfig, TextPart, VoiceConfig,
};
use super::{LiveSession, LiveTransport, SessionEvent, SessionSetup, OUTBOUND_CHANNEL_CAPACITY};

pub const DEFAULT_LIVE_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Websocket client for the Gemini live audio endpoint
pub struct GeminiLiveTransport {
    endpoint: String,
    api_key: String,
}

impl GeminiLiveTransport {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    fn setup_message(setup: &SessionSetup) -> SetupMessage {
        SetupMessage {
            setup: Setup {
                model: setup.model.clone(),
                generation_config: GenerationConfig {
                    response_modalities: vec!["AUDIO".to_string()],
                    speech_config: SpeechConfig {
                        voice_config: VoiceConfig {
                            prebuilt_voice_config: PrebuiltVoiceConfig {
                                voice_name: setup.voice_name.clone(),
                            },
                        },
                    },
                },
                system_instruction: Some(Content {
                    parts: vec![TextPart {
                        text: setup.system_instruction.clone(),
                    }],
                }),
                input_audio_transcription: EmptyConfig {},
                output_audio_transcription: EmptyConfig {},
            },
        }
    }
}

#[async_trait::async_trait]
impl LiveTransport for GeminiLiveTransport {
    async fn connect(&self, setup: SessionSetup) -> Result<LiveSession> {
        let url = format!("{}?key={}", self.endpoint, self.api_key);

        info!("Connecting live session (model {})", setup.model);

        let (ws, _response) = connect_async(&url)
            .await
            .context("Failed to connect to live endpoint")?;

        let (mut write, mut read) = ws.split();

        let setup_json = serde_json::to_string(&Self::setup_message(&setup))?;
        write
            .send(Message::Text(setup_json))
            .await
            .context("Failed to send session setup")?;

        let (outbound_tx, mut outbound_rx) =
            mpsc::channel::<crate::audio::EncodedChunk>(OUTBOUND_CHANNEL_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel(256);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    chunk = outbound_rx.recv() => {
                        let Some(chunk) = chunk else {
                            debug!("Outbound channel dropped, closing live session");
                            let _ = write.send(Message::Close(None)).await;
                            break;
                        };

                        let message = RealtimeInputMessage {
                            realtime_input: RealtimeInput {
                                media_chunks: vec![MediaChunk {
                                    mime_type: chunk.mime_type,
                                    data: chunk.data,
                                }],
                            },
                        };

                        let json = match serde_json::to_string(&message) {
                            Ok(json) => json,
                            Err(e) => {
                                warn!("Failed to serialize realtime input: {}", e);
                                continue;
                            }
                        };

                        if let Err(e) = write.send(Message::Text(json)).await {
                            let _ = events_tx.send(SessionEvent::Error(e.to_string())).await;
                            break;
                        }
                    }
                    incoming = read.next() => {
                        match incoming {
                            Some(Ok(Message::Text(text))) => {
                                forward_server_frame(text.as_bytes(), &events_tx).await;
                            }
                            Some(Ok(Message::Binary(bytes))) => {
                                forward_server_frame(&bytes, &events_tx).await;
                            }
                            Some(Ok(Message::Close(frame))) => {
                                debug!("Live session closed by remote: {:?}", frame);
                                let _ = events_tx.send(SessionEvent::Closed).await;
                                break;
                            }
                            Some(Ok(_)) => {} // ping/pong handled by the library
                            Some(Err(e)) => {
                                let _ = events_tx.send(SessionEvent::Error(e.to_string())).await;
                                break;
                            }
                            None => {
                                let _ = events_tx.send(SessionEvent::Closed).await;
                                break;
                            }
                        }
                    }
                }
            }

            debug!("Live session task finished");
        });

        Ok(LiveSession {
            outbound: outbound_tx,
            events: events_rx,
        })
    }
}

async fn forward_server_frame(payload: &[u8], events_tx: &mpsc::Sender<SessionEvent>) {
    let message: ServerMessage = match serde_json::from_slice(payload) {
        Ok(message) => message,
        Err(e) => {
            warn!("Unrecognized server frame: {}", e);
            return;
        }
    };

    if message.setup_complete.is_some() {
        info!("Live session opened");
        let _ = events_tx.send(SessionEvent::Opened).await;
    }

    if let Some(content) = message.server_content {
        let _ = events_tx.send(SessionEvent::Message(content.into())).await;
    }
}
