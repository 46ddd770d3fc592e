use std::collections::HashSet;
use tracing::debug;

use super::sink::{AudioSink, SourceId};
use crate::audio::DecodedBuffer;

/// Timing record for one scheduled buffer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledSource {
    pub id: SourceId,
    pub start_time: f64,
    pub duration: f64,
}

/// Serializes asynchronous buffer arrivals onto a gap-free timeline.
///
/// A single monotonic cursor holds the next start time. Each new buffer
/// starts at `max(cursor, now)` and advances the cursor by its duration at
/// schedule time, so ordering is fixed by arrival even when decode latency
/// varies. All in-flight sources are tracked for interruption.
pub struct PlaybackScheduler {
    sink: Box<dyn AudioSink>,
    next_start_time: f64,
    active: HashSet<SourceId>,
}

impl PlaybackScheduler {
    pub fn new(sink: Box<dyn AudioSink>) -> Self {
        Self {
            sink,
            next_start_time: 0.0,
            active: HashSet::new(),
        }
    }

    /// Schedule a buffer to play immediately after everything already queued
    pub fn schedule(&mut self, buffer: DecodedBuffer) -> ScheduledSource {
        let start_time = self.next_start_time.max(self.sink.now());
        let duration = buffer.duration();

        let id = self.sink.start(buffer, start_time);
        self.next_start_time = start_time + duration;
        self.active.insert(id);

        debug!(
            "Scheduled source {} at {:.3}s for {:.3}s ({} in flight)",
            id,
            start_time,
            duration,
            self.active.len()
        );

        ScheduledSource {
            id,
            start_time,
            duration,
        }
    }

    /// Handle a source finishing naturally.
    ///
    /// Returns true when this was the last in-flight source, i.e. playback
    /// went idle. The cursor is left alone so a chunk already in decode
    /// still lands back-to-back.
    pub fn on_source_ended(&mut self, id: SourceId) -> bool {
        self.active.remove(&id) && self.active.is_empty()
    }

    /// Flush on an interruption signal from the remote service.
    ///
    /// Every in-flight source stops and the cursor resets to zero so the
    /// next turn schedules from "now". Without the reset the interrupted
    /// turn's audio would still occupy the timeline and delay the next one.
    pub fn interrupt(&mut self) {
        debug!("Interrupting {} active sources", self.active.len());

        for id in self.active.drain() {
            self.sink.stop(id);
        }
        self.next_start_time = 0.0;
    }

    /// Stop everything on teardown. The cursor is irrelevant afterwards.
    pub fn stop_all(&mut self) {
        for id in self.active.drain() {
            self.sink.stop(id);
        }
    }

    pub fn cursor(&self) -> f64 {
        self.next_start_time
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_empty()
    }
}
