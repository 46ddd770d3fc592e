use anyhow::{Context, Result};
use hound::WavReader;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::capture::{AudioFrame, MicrophoneSource};
use super::CAPTURE_FRAME_SAMPLES;

/// Microphone source backed by a WAV file.
///
/// Frames are delivered at the file's native rate in real time, one
/// `CAPTURE_FRAME_SAMPLES` frame per tick, so the rest of the pipeline sees
/// the same cadence a live device would produce. Stereo input is mixed down
/// to mono.
pub struct WavMicrophone {
    path: PathBuf,
    task: Option<JoinHandle<()>>,
    capturing: bool,
}

impl WavMicrophone {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            task: None,
            capturing: false,
        }
    }

    fn read_mono_samples(path: &Path) -> Result<(Vec<f32>, u32)> {
        let reader = WavReader::open(path)
            .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;

        let spec = reader.spec();
        let raw: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let samples: Vec<f32> = if spec.channels == 2 {
            raw.chunks_exact(2)
                .map(|pair| (pair[0] as f32 + pair[1] as f32) / 2.0 / 32768.0)
                .collect()
        } else {
            raw.iter().map(|&s| s as f32 / 32768.0).collect()
        };

        Ok((samples, spec.sample_rate))
    }
}

#[async_trait::async_trait]
impl MicrophoneSource for WavMicrophone {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        let (samples, sample_rate) = Self::read_mono_samples(&self.path)?;

        info!(
            "WAV microphone started: {} ({:.1}s at {}Hz)",
            self.path.display(),
            samples.len() as f64 / sample_rate as f64,
            sample_rate
        );

        let (tx, rx) = mpsc::channel(16);
        let frame_duration =
            std::time::Duration::from_secs_f64(CAPTURE_FRAME_SAMPLES as f64 / sample_rate as f64);

        let task = tokio::spawn(async move {
            for chunk in samples.chunks(CAPTURE_FRAME_SAMPLES) {
                let frame = AudioFrame {
                    samples: chunk.to_vec(),
                    sample_rate,
                };

                if tx.send(frame).await.is_err() {
                    warn!("Frame receiver dropped, stopping WAV playback");
                    return;
                }

                tokio::time::sleep(frame_duration).await;
            }
        });

        self.task = Some(task);
        self.capturing = true;
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}
