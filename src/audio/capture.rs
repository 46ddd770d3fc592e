use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::pcm::{encode_chunk, EncodedChunk};
use super::resample::resample;
use super::PCM_INPUT_RATE;

/// One callback's worth of mono float audio at the capture device's native
/// rate. Produced once per processing callback, consumed immediately.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Mono samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Native sample rate of the capture device in Hz
    pub sample_rate: u32,
}

/// Microphone capture source.
///
/// Implementations own an exclusive stream and deliver fixed-size frames
/// over a channel. Stopping must release the underlying stream; a leaked
/// stream leaves the OS "microphone in use" indicator lit.
#[async_trait::async_trait]
pub trait MicrophoneSource: Send {
    /// Acquire the stream and start delivering frames.
    ///
    /// Returns a channel receiver that will receive audio frames.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing and release the stream
    async fn stop(&mut self) -> Result<()>;

    /// Check if the source is currently capturing
    fn is_capturing(&self) -> bool;

    /// Source name for logging
    fn name(&self) -> &str;
}

/// Streams captured frames to the session's outbound channel.
///
/// For every frame: resample to the protocol input rate, encode to a PCM
/// chunk, hand off. The handoff uses `try_send` so the capture path never
/// stalls on network I/O; a full outbound channel drops the frame instead.
pub struct CapturePipeline {
    task: Option<JoinHandle<()>>,
}

impl CapturePipeline {
    /// Wire the capture callback into the session's outbound channel
    pub fn spawn(
        mut frames: mpsc::Receiver<AudioFrame>,
        outbound: mpsc::Sender<EncodedChunk>,
    ) -> Self {
        let task = tokio::spawn(async move {
            debug!("Capture pipeline started");

            while let Some(frame) = frames.recv().await {
                let resampled = resample(&frame.samples, frame.sample_rate, PCM_INPUT_RATE);
                let chunk = encode_chunk(&resampled);

                match outbound.try_send(chunk) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!("Outbound channel full, dropping capture frame");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        debug!("Outbound channel closed, stopping capture pipeline");
                        break;
                    }
                }
            }

            debug!("Capture pipeline stopped");
        });

        Self { task: Some(task) }
    }

    /// Stop forwarding frames. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Microphone source that plays back a fixed list of frames.
///
/// Used by tests and batch tooling where no real capture device exists. The
/// frame channel stays open until `stop` so the pipeline keeps running the
/// way it would against a live device.
pub struct ScriptedMicrophone {
    frames: Vec<AudioFrame>,
    tx: Option<mpsc::Sender<AudioFrame>>,
    capturing: bool,
}

impl ScriptedMicrophone {
    pub fn new(frames: Vec<AudioFrame>) -> Self {
        Self {
            frames,
            tx: None,
            capturing: false,
        }
    }
}

#[async_trait::async_trait]
impl MicrophoneSource for ScriptedMicrophone {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        let (tx, rx) = mpsc::channel(self.frames.len().max(1));

        for frame in self.frames.drain(..) {
            // Capacity covers every scripted frame, so this cannot fail
            let _ = tx.try_send(frame);
        }

        self.tx = Some(tx);
        self.capturing = true;
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        drop(self.tx.take());
        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
