//! Milestone rewards keyed by accumulated XP.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RewardId(pub u32);

impl fmt::Display for RewardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RewardKind {
    QrCode,
    PointsGrant { bonus_xp: u64 },
    Certificate,
    LockedPhysical,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RewardDefinition {
    pub id: RewardId,
    pub title: &'static str,
    pub target: u64,
    pub kind: RewardKind,
    pub description: &'static str,
    pub color: &'static str,
}

/// The reward catalog, in ascending target order.
pub static CATALOG: [RewardDefinition; 5] = [
    RewardDefinition {
        id: RewardId(1),
        title: "Starbucks Coffee Voucher",
        target: 200,
        kind: RewardKind::QrCode,
        description: "A free coffee to fuel your next networking session.",
        color: "#fde047",
    },
    RewardDefinition {
        id: RewardId(2),
        title: "500 Bonus XP Drop",
        target: 500,
        kind: RewardKind::PointsGrant { bonus_xp: 500 },
        description: "Instantly boost your rank with a raw XP injection!",
        color: "#86efac",
    },
    RewardDefinition {
        id: RewardId(3),
        title: "VIP Event Pass",
        target: 1_000,
        kind: RewardKind::QrCode,
        description: "Exclusive access to the annual charity gala. Scan at the door.",
        color: "#93c5fd",
    },
    RewardDefinition {
        id: RewardId(4),
        title: "LinkedIn Impact Certificate",
        target: 2_000,
        kind: RewardKind::Certificate,
        description: "A verified credential recognizing your environmental and societal contributions.",
        color: "#60a5fa",
    },
    RewardDefinition {
        id: RewardId(5),
        title: "Exclusive Impact Hoodie",
        target: 3_500,
        kind: RewardKind::LockedPhysical,
        description: "Premium physical merchandise shipped directly to you.",
        color: "#f9a8d4",
    },
];

pub fn find(catalog: &[RewardDefinition], id: RewardId) -> Result<&RewardDefinition, CoreError> {
    catalog
        .iter()
        .find(|reward| reward.id == id)
        .ok_or(CoreError::UnknownReward(id))
}

/// Reward ids an account has claimed. Ids are only ever added.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RedemptionRecord(BTreeSet<RewardId>);

impl RedemptionRecord {
    pub fn contains(&self, id: RewardId) -> bool {
        self.0.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = RewardId> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn insert(&mut self, id: RewardId) -> bool {
        self.0.insert(id)
    }
}

impl FromIterator<RewardId> for RedemptionRecord {
    fn from_iter<I: IntoIterator<Item = RewardId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneProgress {
    pub xp: u64,
    pub redeemed: RedemptionRecord,
}

impl MilestoneProgress {
    pub fn new(xp: u64) -> Self {
        Self {
            xp,
            redeemed: RedemptionRecord::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardStatus {
    Locked,
    Unlocked,
    Claimed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RewardView<'a> {
    pub reward: &'a RewardDefinition,
    pub status: RewardStatus,
    pub xp_needed: u64,
}

pub fn status_of(reward: &RewardDefinition, xp: u64, redeemed: &RedemptionRecord) -> RewardStatus {
    if redeemed.contains(reward.id) {
        RewardStatus::Claimed
    } else if xp >= reward.target {
        RewardStatus::Unlocked
    } else {
        RewardStatus::Locked
    }
}

/// Status of every reward, in catalog order.
pub fn reward_status<'a>(
    catalog: &'a [RewardDefinition],
    xp: u64,
    redeemed: &RedemptionRecord,
) -> Vec<RewardView<'a>> {
    catalog
        .iter()
        .map(|reward| RewardView {
            reward,
            status: status_of(reward, xp, redeemed),
            xp_needed: reward.target.saturating_sub(xp),
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    pub reward: RewardId,
    pub kind: RewardKind,
    pub xp_before: u64,
    pub xp_after: u64,
}

impl Redemption {
    /// Payload encoded into the scannable voucher for QR rewards.
    pub fn voucher(&self, holder: &str) -> Option<String> {
        match self.kind {
            RewardKind::QrCode => Some(format!("INVITEL_{}_{}", self.reward.0, holder)),
            _ => None,
        }
    }
}

/// Claims `reward`. On error `progress` is left untouched.
pub fn redeem(
    reward: &RewardDefinition,
    progress: &mut MilestoneProgress,
) -> Result<Redemption, CoreError> {
    if progress.redeemed.contains(reward.id) {
        return Err(CoreError::AlreadyClaimed(reward.id));
    }
    if progress.xp < reward.target {
        return Err(CoreError::NotUnlocked {
            reward: reward.id,
            target: reward.target,
            xp: progress.xp,
        });
    }

    let xp_before = progress.xp;
    progress.redeemed.insert(reward.id);
    if let RewardKind::PointsGrant { bonus_xp } = reward.kind {
        progress.xp = progress.xp.saturating_add(bonus_xp);
    }
    Ok(Redemption {
        reward: reward.id,
        kind: reward.kind,
        xp_before,
        xp_after: progress.xp,
    })
}
