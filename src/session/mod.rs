//! Live session lifecycle
//!
//! This module owns the state machine for one live voice session: connect,
//! stream, receive transcripts, handle interruption, handle errors, tear
//! down. Failure paths always converge to a state the learner can act on.

mod context;
mod controller;
mod transcript;

pub use context::{AudioEnvironment, AudioSessionContext};
pub use controller::{SessionController, RESTART_GRACE};
pub use transcript::{Role, Transcript, TranscriptEntry};

/// Lifecycle states of the session controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    ErrorRecovering,
    Closed,
}

/// Visualizer state observed by the UI layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualizerState {
    Idle,
    Listening,
    Speaking,
}

/// Where the UI lands after a session ends.
///
/// Error recovery keeps the learner on the preparation view with their
/// context intact instead of bouncing them back to scenario selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostSessionView {
    ScenarioList,
    Preparation,
}

/// Why a teardown is happening. Passed explicitly into the teardown routine
/// rather than read from a side-channel flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    UserRequested,
    ErrorRecovered,
    /// Old session being replaced by a new start request
    Restarting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceGender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accent {
    Us,
    Uk,
}

/// Tutor voice selection made before the session starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoicePreferences {
    pub gender: VoiceGender,
    pub accent: Accent,
}

impl Default for VoicePreferences {
    fn default() -> Self {
        Self {
            gender: VoiceGender::Male,
            accent: Accent::Us,
        }
    }
}

impl VoicePreferences {
    pub fn voice_name(&self) -> &'static str {
        match self.gender {
            VoiceGender::Male => "Puck",
            VoiceGender::Female => "Kore",
        }
    }
}
