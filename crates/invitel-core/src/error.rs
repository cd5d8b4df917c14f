use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::milestones::RewardId;

/// Registration fields that must be non-empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Email,
    Password,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Name => "name",
            Field::Email => "email",
            Field::Password => "password",
        })
    }
}

/// Canonical error type exposed by the core primitives.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A required registration field was empty.
    #[error("missing required field: {0}")]
    MissingField(Field),

    /// The reward is already in the redemption record.
    #[error("reward {0} has already been claimed")]
    AlreadyClaimed(RewardId),

    /// Not enough XP to redeem the reward.
    #[error("reward {reward} needs {target} XP, account has {xp}")]
    NotUnlocked { reward: RewardId, target: u64, xp: u64 },

    /// No catalog entry with this id.
    #[error("unknown reward {0}")]
    UnknownReward(RewardId),
}
