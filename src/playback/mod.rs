//! Gapless playback of streamed audio buffers
//!
//! Decoded buffers arrive as an unbounded, bursty stream with variable
//! decode latency. The scheduler serializes them onto a monotonic timeline
//! so playback is FIFO with no gaps or overlaps, and tracks every in-flight
//! source so an interruption can silence the lot at once.

pub mod scheduler;
pub mod sink;

pub use scheduler::{PlaybackScheduler, ScheduledSource};
pub use sink::{AudioSink, ManualSink, ManualSinkHandle, SourceId, TimerSink};
