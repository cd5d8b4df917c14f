//! Read-only standings.
//!
//! Rows come from an external feed and are replaced wholesale; nothing here
//! mutates a single entry.

use serde::{Deserialize, Serialize};

use crate::rank::{RankTier, LEADERBOARD_LADDER};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Same,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub id: u32,
    pub name: String,
    pub points: u64,
    pub trend: Trend,
    pub avatar_seed: String,
    #[serde(default)]
    pub is_current_user: bool,
}

impl LeaderboardEntry {
    pub fn tier(&self) -> &'static RankTier {
        LEADERBOARD_LADDER.tier_for(self.points)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Placed {
    pub position: usize,
    #[serde(flatten)]
    pub entry: LeaderboardEntry,
    pub tier: &'static str,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Standings {
    rows: Vec<Placed>,
}

impl Standings {
    /// Orders by points, highest first. Ties keep feed order.
    pub fn from_entries(mut entries: Vec<LeaderboardEntry>) -> Self {
        entries.sort_by(|a, b| b.points.cmp(&a.points));
        let rows = entries
            .into_iter()
            .enumerate()
            .map(|(idx, entry)| Placed {
                position: idx + 1,
                tier: entry.tier().name,
                entry,
            })
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[Placed] {
        &self.rows
    }

    pub fn podium(&self) -> &[Placed] {
        &self.rows[..self.rows.len().min(3)]
    }

    pub fn rest(&self) -> &[Placed] {
        &self.rows[self.rows.len().min(3)..]
    }

    pub fn current_user(&self) -> Option<&Placed> {
        self.rows.iter().find(|row| row.entry.is_current_user)
    }
}

pub fn sample_board() -> Vec<LeaderboardEntry> {
    let rows: [(u32, &str, u64, Trend, &str, bool); 7] = [
        (1, "Arjun S.", 15_420, Trend::Up, "Arjun", false),
        (2, "Priya K.", 12_100, Trend::Up, "Priya", false),
        (3, "Sarah J.", 9_850, Trend::Same, "Sarah", false),
        (4, "Leo V.", 7_400, Trend::Up, "Leo", false),
        (5, "You (The North Star)", 2_450, Trend::Up, "You", true),
        (6, "Rahul M.", 1_200, Trend::Down, "Rahul", false),
        (7, "Nina W.", 850, Trend::Up, "Nina", false),
    ];
    rows.into_iter()
        .map(|(id, name, points, trend, seed, is_current_user)| LeaderboardEntry {
            id,
            name: name.into(),
            points,
            trend,
            avatar_seed: seed.into(),
            is_current_user,
        })
        .collect()
}
