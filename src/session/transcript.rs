use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who produced a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One coalesced turn of the conversation transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: String,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only transcript list.
///
/// The service streams partial transcript text incrementally, so consecutive
/// deltas from the same role append to the trailing entry instead of
/// creating a new one.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a streamed delta into the transcript
    pub fn push_delta(&mut self, role: Role, text: &str) {
        if let Some(last) = self.entries.last_mut() {
            if last.role == role {
                last.text.push_str(text);
                return;
            }
        }

        self.entries.push(TranscriptEntry {
            id: Uuid::new_v4().to_string(),
            role,
            text: text.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
