//! Leaderboard rows.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Metric-specific part of a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Score {
    Skill { level: u32, experience: u64 },
    Activity { score: u64 },
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Player display name.
    pub name: String,
    /// 1-based rank on the leaderboard.
    pub rank: u64,
    pub score: Score,
}

impl Entry {
    pub fn skill(name: impl Into<String>, rank: u64, level: u32, experience: u64) -> Self {
        Self {
            name: name.into(),
            rank,
            score: Score::Skill { level, experience },
        }
    }

    pub fn activity(name: impl Into<String>, rank: u64, score: u64) -> Self {
        Self {
            name: name.into(),
            rank,
            score: Score::Activity { score },
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.score {
            Score::Skill { level, experience } => write!(
                f,
                "Rank {} -> {} at level {} with {} xp",
                self.rank, self.name, level, experience
            ),
            Score::Activity { score } => {
                write!(f, "Rank {} -> {} with score {}", self.rank, self.name, score)
            }
        }
    }
}
