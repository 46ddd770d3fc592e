//! Progress collaborator: append-only completion lists and experience points
//!
//! The audio core only ever calls `mark_complete`; it never reads or
//! mutates the structure directly. Repeat completions of the same id keep
//! accumulating points, matching the observed product behavior.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

/// Progress categories and their point values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Live,
    Reading,
    Vocab,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Live => "live",
            Category::Reading => "reading",
            Category::Vocab => "vocab",
        }
    }

    /// Experience points awarded per completion
    pub fn points(&self) -> u32 {
        match self {
            Category::Live => 15,
            Category::Reading => 10,
            Category::Vocab => 5,
        }
    }
}

/// Learner levels by cumulative points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Novice,
    Apprentice,
    BasicUser,
}

impl Level {
    pub fn for_points(points: u32) -> Self {
        if points >= 400 {
            Level::BasicUser
        } else if points >= 150 {
            Level::Apprentice
        } else {
            Level::Novice
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Level::Novice => "Novice",
            Level::Apprentice => "Apprentice",
            Level::BasicUser => "Basic User",
        }
    }
}

/// Completion recording seam the session controller calls into
pub trait ProgressSink: Send + Sync {
    fn mark_complete(&self, category: Category, id: &str) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProgressState {
    #[serde(default)]
    live: Vec<String>,
    #[serde(default)]
    reading: Vec<String>,
    #[serde(default)]
    vocab: Vec<String>,
}

impl ProgressState {
    fn list(&self, category: Category) -> &Vec<String> {
        match category {
            Category::Live => &self.live,
            Category::Reading => &self.reading,
            Category::Vocab => &self.vocab,
        }
    }

    fn list_mut(&mut self, category: Category) -> &mut Vec<String> {
        match category {
            Category::Live => &mut self.live,
            Category::Reading => &mut self.reading,
            Category::Vocab => &mut self.vocab,
        }
    }
}

/// JSON-file-backed progress store
pub struct ProgressTracker {
    path: PathBuf,
    state: Mutex<ProgressState>,
}

impl ProgressTracker {
    /// Open or create the store. A malformed file resets to empty progress
    /// rather than failing the app.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let state = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(state) => state,
                Err(e) => {
                    warn!("Progress file is malformed, resetting: {}", e);
                    ProgressState::default()
                }
            },
            Err(_) => ProgressState::default(),
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn completed_ids(&self, category: Category) -> Vec<String> {
        self.state.lock().unwrap().list(category).clone()
    }

    pub fn is_completed(&self, category: Category, id: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .list(category)
            .iter()
            .any(|completed| completed == id)
    }

    /// Cumulative experience points across all categories
    pub fn total_points(&self) -> u32 {
        let state = self.state.lock().unwrap();
        [Category::Live, Category::Reading, Category::Vocab]
            .iter()
            .map(|&category| state.list(category).len() as u32 * category.points())
            .sum()
    }

    pub fn level(&self) -> Level {
        Level::for_points(self.total_points())
    }

    fn save(&self, state: &ProgressState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create progress directory")?;
        }

        let raw = serde_json::to_string_pretty(state)?;
        std::fs::write(&self.path, raw).context("Failed to write progress file")?;
        Ok(())
    }
}

impl ProgressSink for ProgressTracker {
    fn mark_complete(&self, category: Category, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.list_mut(category).push(id.to_string());
        self.save(&state)?;

        info!(
            "Marked '{}' complete in {} (+{} XP)",
            id,
            category.as_str(),
            category.points()
        );
        Ok(())
    }
}
