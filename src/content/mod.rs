//! Lesson content types and the bounded-retry fetch policy
//!
//! Content generation is a plain request/response concern and deliberately
//! uses a simpler failure policy than the live audio session: a fixed small
//! retry count with a fixed delay, and a single error message on
//! exhaustion. A content failure never touches an in-progress session.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::SessionError;

/// A vocabulary item the learner drills before the call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabItem {
    pub word: String,
    pub translation: String,
}

/// A generated roleplay scenario for one topic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Short title in the learner's language
    pub title: String,
    pub description: String,
    /// Internal instruction for the roleplay agent, in English
    pub roleplay_context: String,
    pub vocabulary: Vec<VocabItem>,
}

/// A practice topic from the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub label: String,
    /// CEFR descriptor used only to parameterize prompts
    pub cefr_goal: String,
}

/// Learner level tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserLevel {
    PreA1,
    A1,
}

impl UserLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserLevel::PreA1 => "PRE_A1",
            UserLevel::A1 => "A1",
        }
    }
}

/// Retry policy for content generation calls
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Run a content generation operation under the bounded retry policy.
///
/// Retries `policy.attempts` times with a fixed delay between attempts;
/// exhaustion surfaces as one `SessionError::Content`.
pub async fn fetch_with_retry<T, F, Fut>(
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, SessionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut remaining = policy.attempts.max(1);

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                remaining -= 1;
                warn!("Content generation attempt failed: {}", e);

                if remaining == 0 {
                    return Err(SessionError::Content(e.to_string()));
                }

                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}

/// Build the system instruction framing one roleplay session
pub fn build_system_instruction(level: UserLevel, topic: &Topic, scenario: &Scenario) -> String {
    let vocab: Vec<&str> = scenario
        .vocabulary
        .iter()
        .map(|item| item.word.as_str())
        .collect();

    format!(
        "You are a friendly English tutor for a {} level student. \
         Topic: {}. CEFR goal: {}. Roleplay: {}. \
         Speak slowly, use short sentences, and favor this vocabulary: {}.",
        level.as_str(),
        topic.label,
        topic.cefr_goal,
        scenario.roleplay_context,
        vocab.join(", ")
    )
}
