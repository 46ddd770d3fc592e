use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::audio::DecodedBuffer;

/// Handle for one scheduled playback source
pub type SourceId = u64;

/// Output half of the audio stack: an audio clock plus time-shifted source
/// playback.
///
/// Sinks report natural completion by sending the source id on the ended
/// channel they were constructed with; the session loop feeds those back to
/// the scheduler. A stopped source must not report completion.
pub trait AudioSink: Send {
    /// Current audio-clock time in seconds
    fn now(&self) -> f64;

    /// Begin playing `buffer` at clock time `at` (already >= now)
    fn start(&mut self, buffer: DecodedBuffer, at: f64) -> SourceId;

    /// Stop a source before it finishes
    fn stop(&mut self, id: SourceId);
}

/// Sink that tracks playback timing with the tokio clock.
///
/// Each source is a timer that fires when its slot on the timeline elapses.
/// Used by the CLI driver, where the decoded audio itself is handed to the
/// platform layer and only completion timing matters here.
pub struct TimerSink {
    origin: Instant,
    ended_tx: mpsc::UnboundedSender<SourceId>,
    next_id: SourceId,
    tasks: HashMap<SourceId, JoinHandle<()>>,
}

impl TimerSink {
    pub fn new(ended_tx: mpsc::UnboundedSender<SourceId>) -> Self {
        Self {
            origin: Instant::now(),
            ended_tx,
            next_id: 0,
            tasks: HashMap::new(),
        }
    }
}

impl AudioSink for TimerSink {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    fn start(&mut self, buffer: DecodedBuffer, at: f64) -> SourceId {
        let id = self.next_id;
        self.next_id += 1;

        let delay = (at - self.now()).max(0.0) + buffer.duration();
        let ended_tx = self.ended_tx.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs_f64(delay)).await;
            let _ = ended_tx.send(id);
        });

        self.tasks.insert(id, task);
        id
    }

    fn stop(&mut self, id: SourceId) {
        if let Some(task) = self.tasks.remove(&id) {
            task.abort();
        }
    }
}

impl Drop for TimerSink {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

#[derive(Default)]
struct ManualSinkState {
    now: f64,
    next_id: SourceId,
    started: Vec<(SourceId, f64, f64)>,
    stopped: Vec<SourceId>,
}

/// Sink with a hand-cranked clock for tests.
///
/// Records every start/stop; the paired [`ManualSinkHandle`] lets a test
/// advance the clock, inspect what played, and report completions.
pub struct ManualSink {
    state: Arc<Mutex<ManualSinkState>>,
    ended_tx: mpsc::UnboundedSender<SourceId>,
}

impl ManualSink {
    pub fn new(ended_tx: mpsc::UnboundedSender<SourceId>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualSinkState::default())),
            ended_tx,
        }
    }

    pub fn handle(&self) -> ManualSinkHandle {
        ManualSinkHandle {
            state: Arc::clone(&self.state),
            ended_tx: self.ended_tx.clone(),
        }
    }
}

impl AudioSink for ManualSink {
    fn now(&self) -> f64 {
        self.state.lock().unwrap().now
    }

    fn start(&mut self, buffer: DecodedBuffer, at: f64) -> SourceId {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        state.started.push((id, at, buffer.duration()));
        id
    }

    fn stop(&mut self, id: SourceId) {
        self.state.lock().unwrap().stopped.push(id);
    }
}

/// Inspection and control handle for a [`ManualSink`]
#[derive(Clone)]
pub struct ManualSinkHandle {
    state: Arc<Mutex<ManualSinkState>>,
    ended_tx: mpsc::UnboundedSender<SourceId>,
}

impl ManualSinkHandle {
    pub fn set_now(&self, now: f64) {
        self.state.lock().unwrap().now = now;
    }

    /// All sources started so far as `(id, start_time, duration)`
    pub fn started(&self) -> Vec<(SourceId, f64, f64)> {
        self.state.lock().unwrap().started.clone()
    }

    pub fn stopped(&self) -> Vec<SourceId> {
        self.state.lock().unwrap().stopped.clone()
    }

    /// Report a source's natural completion to the session loop
    pub fn complete(&self, id: SourceId) {
        let _ = self.ended_tx.send(id);
    }
}
