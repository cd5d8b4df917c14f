//! Rank ladders.
//!
//! A ladder is a static, ascending list of tiers. Lookup always walks from
//! the top tier down so exactly one tier matches any input; the bottom tier
//! has threshold zero, which makes every lookup total.

use serde::Serialize;

/// One bracket of a rank ladder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RankTier {
    pub name: &'static str,
    pub color: &'static str,
    /// Impact multiplier in basis points (10_000 = 1.0x).
    pub multiplier_bps: u32,
    pub perk: &'static str,
    pub threshold: u64,
}

impl RankTier {
    pub fn multiplier(&self) -> f64 {
        self.multiplier_bps as f64 / 10_000.0
    }
}

/// Distance from a value to the next tier up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NextTier {
    pub tier: &'static RankTier,
    pub remaining: u64,
}

#[derive(Debug)]
pub struct RankLadder {
    tiers: &'static [RankTier],
}

impl RankLadder {
    /// `tiers` must be sorted by ascending threshold and start at zero.
    pub const fn new(tiers: &'static [RankTier]) -> Self {
        Self { tiers }
    }

    pub fn tiers(&self) -> &'static [RankTier] {
        self.tiers
    }

    pub fn level_of(&self, value: u64) -> usize {
        self.tiers
            .iter()
            .rposition(|tier| tier.threshold <= value)
            .unwrap_or(0)
    }

    pub fn tier_for(&self, value: u64) -> &'static RankTier {
        &self.tiers[self.level_of(value)]
    }

    pub fn next_tier(&self, value: u64) -> Option<NextTier> {
        let tier = self.tiers.get(self.level_of(value) + 1)?;
        Some(NextTier {
            tier,
            remaining: tier.threshold - value,
        })
    }
}

static PROFILE_TIERS: [RankTier; 4] = [
    RankTier {
        name: "SEED",
        color: "#EC4899",
        multiplier_bps: 10_000,
        perk: "Digital Badge",
        threshold: 0,
    },
    RankTier {
        name: "CATALYST",
        color: "#A855F7",
        multiplier_bps: 15_000,
        perk: "5% Partner Discount",
        threshold: 5,
    },
    RankTier {
        name: "GUARDIAN",
        color: "#22C55E",
        multiplier_bps: 20_000,
        perk: "Early Mission Access",
        threshold: 10,
    },
    RankTier {
        name: "LEGEND",
        color: "#FFD600",
        multiplier_bps: 25_000,
        perk: "Physical Metal Card",
        threshold: 20,
    },
];

static LEADERBOARD_TIERS: [RankTier; 4] = [
    RankTier {
        name: "NOVA",
        color: "#94A3B8",
        multiplier_bps: 10_000,
        perk: "Community Badge",
        threshold: 0,
    },
    RankTier {
        name: "SUPERNOVA",
        color: "#F97316",
        multiplier_bps: 12_500,
        perk: "Profile Flair",
        threshold: 2_000,
    },
    RankTier {
        name: "GALAXY",
        color: "#8B5CF6",
        multiplier_bps: 15_000,
        perk: "Priority Mission Slots",
        threshold: 8_000,
    },
    RankTier {
        name: "AMBASSADOR",
        color: "#FFD600",
        multiplier_bps: 20_000,
        perk: "Ambassador Summit Invite",
        threshold: 15_000,
    },
];

/// Profile ranks, keyed by friends invited.
pub static PROFILE_LADDER: RankLadder = RankLadder::new(&PROFILE_TIERS);

/// Leaderboard ranks, keyed by points.
pub static LEADERBOARD_LADDER: RankLadder = RankLadder::new(&LEADERBOARD_TIERS);

pub fn rank_for(friends_invited: u64) -> &'static RankTier {
    PROFILE_LADDER.tier_for(friends_invited)
}
