use anyhow::{bail, Result};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::audio::{AudioFrame, MicrophoneSource};
use crate::playback::{AudioSink, SourceId};

/// Factory for the per-session audio halves.
///
/// Each session gets a fresh microphone source and playback sink; the
/// environment decides what backs them (real device, WAV file, test
/// doubles).
pub trait AudioEnvironment: Send + Sync {
    fn create_microphone(&self) -> Result<Box<dyn MicrophoneSource>>;

    /// Create the playback sink. Natural source completions are reported on
    /// `ended_tx`.
    fn create_sink(&self, ended_tx: mpsc::UnboundedSender<SourceId>) -> Box<dyn AudioSink>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContextState {
    /// Created but not yet usable (platform audio may start suspended)
    Suspended,
    Running,
    Closed,
}

/// Explicit owner of one session's input audio resources.
///
/// Replaces global audio-context singletons: the lifecycle is
/// create → resume → close, and close is idempotent so teardown can attempt
/// release exactly once per path without double-free hazards.
pub struct AudioSessionContext {
    mic: Box<dyn MicrophoneSource>,
    state: ContextState,
}

impl AudioSessionContext {
    pub fn new(mic: Box<dyn MicrophoneSource>) -> Self {
        Self {
            mic,
            state: ContextState::Suspended,
        }
    }

    /// Resume the context before use. Contexts may start suspended until an
    /// explicit resume, mirroring platform autoplay policy.
    pub fn resume(&mut self) -> Result<()> {
        match self.state {
            ContextState::Suspended => {
                self.state = ContextState::Running;
                debug!("Audio context resumed");
                Ok(())
            }
            ContextState::Running => Ok(()),
            ContextState::Closed => bail!("Cannot resume a closed audio context"),
        }
    }

    /// Acquire the exclusive microphone stream
    pub async fn acquire_microphone(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.state != ContextState::Running {
            bail!("Audio context must be resumed before acquiring the microphone");
        }
        self.mic.start().await
    }

    /// Release the microphone and close the context. Idempotent.
    pub async fn close(&mut self) {
        if self.state == ContextState::Closed {
            return;
        }

        if self.mic.is_capturing() {
            if let Err(e) = self.mic.stop().await {
                warn!("Failed to stop microphone '{}': {}", self.mic.name(), e);
            }
        }

        self.state = ContextState::Closed;
        debug!("Audio context closed");
    }

    pub fn is_closed(&self) -> bool {
        self.state == ContextState::Closed
    }

    pub fn microphone_active(&self) -> bool {
        self.mic.is_capturing()
    }
}
