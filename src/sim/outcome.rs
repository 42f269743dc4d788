//! Run status and scoring

use serde::{Deserialize, Serialize};

use crate::consts::TWO_STAR_FACTOR;

/// Playback state machine.
///
/// ```text
/// Idle -> Running <-> Paused -> Won | Lost | Failed
/// ```
/// Any state returns to `Idle` on reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Won,
    Lost,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Won | RunStatus::Lost | RunStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Idle => "IDLE",
            RunStatus::Running => "RUNNING",
            RunStatus::Paused => "PAUSED",
            RunStatus::Won => "WON",
            RunStatus::Lost => "LOST",
            RunStatus::Failed => "FAILED",
        }
    }
}

/// Result of a run; replaced on every status change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub status: RunStatus,
    pub stars: u8,
    pub block_count: u32,
    pub target: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_token: Option<String>,
}

impl RunOutcome {
    pub fn running(block_count: u32, target: u32) -> Self {
        Self {
            status: RunStatus::Running,
            stars: 0,
            block_count,
            target,
            proof_token: None,
        }
    }

    /// Same counts, new status. Stars and token are only kept for a win.
    pub fn with_status(&self, status: RunStatus) -> Self {
        Self {
            status,
            stars: 0,
            proof_token: None,
            ..self.clone()
        }
    }

    pub fn won(&self, proof_token: String) -> Self {
        Self {
            status: RunStatus::Won,
            stars: star_rating(self.block_count, self.target),
            proof_token: Some(proof_token),
            ..self.clone()
        }
    }
}

/// Two-star ceiling: `ceil(target * 1.5)`
pub fn two_star_limit(target: u32) -> u32 {
    (f64::from(target) * TWO_STAR_FACTOR).ceil() as u32
}

/// 3 stars at or under target, 2 up to the inclusive ceiling, else 1
pub fn star_rating(block_count: u32, target: u32) -> u8 {
    if block_count <= target {
        3
    } else if block_count <= two_star_limit(target) {
        2
    } else {
        1
    }
}
