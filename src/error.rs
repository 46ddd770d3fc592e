use std::fmt;

/// Failure categories for the voice tutoring core.
///
/// Device and transport failures are fatal to the session attempt and never
/// retried. Decode failures affect a single chunk. Content failures come out
/// of the bounded-retry text generation path and carry one message after
/// exhaustion.
#[derive(Debug)]
pub enum SessionError {
    /// Microphone unavailable or permission denied
    Device(String),

    /// Connect failure, mid-session error, or abnormal close
    Transport(String),

    /// Malformed inline audio payload (single chunk)
    Decode(String),

    /// Scenario/lesson text generation failed after retries
    Content(String),

    /// A start was attempted while another start is in flight
    AlreadyStarting,

    /// Start requested without a selected scenario and topic
    NoScenarioSelected,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Device(msg) => write!(f, "Microphone error: {}", msg),
            SessionError::Transport(msg) => write!(f, "Transport error: {}", msg),
            SessionError::Decode(msg) => write!(f, "Audio decode error: {}", msg),
            SessionError::Content(msg) => write!(f, "Content generation error: {}", msg),
            SessionError::AlreadyStarting => write!(f, "Session start already in flight"),
            SessionError::NoScenarioSelected => write!(f, "No scenario selected"),
        }
    }
}

impl std::error::Error for SessionError {}

impl SessionError {
    /// Message shown to the learner. The app's audience is Spanish-speaking,
    /// so user-facing strings are Spanish.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Device(_) => "No se pudo conectar. Verifica tu micr\u{f3}fono.".to_string(),
            SessionError::Transport(_) => "Conexi\u{f3}n perdida. Intenta de nuevo.".to_string(),
            SessionError::Decode(_) => "Error de audio.".to_string(),
            SessionError::Content(_) => {
                "Error generando lecciones. Por favor revisa tu conexi\u{f3}n.".to_string()
            }
            SessionError::AlreadyStarting => "Ya hay una clase inici\u{e1}ndose.".to_string(),
            SessionError::NoScenarioSelected => "Error: No topic selected.".to_string(),
        }
    }
}
