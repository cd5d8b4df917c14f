//! User accounts and referral codes.

use std::fmt;

use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::milestones::{
    self, MilestoneProgress, Redemption, RedemptionRecord, RewardDefinition, CATALOG,
};
use crate::rank::{self, RankTier};
use crate::{CoreError, Field};

/// Estimated NGO ad spend saved per invited friend.
pub const AD_SPEND_PER_FRIEND: u64 = 450;

/// Donation amount covered by one verified receipt.
pub const DONATION_PER_RECEIPT: u64 = 500;

pub const NEW_ACCOUNT_LOCATION: &str = "Global Data";

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Stable id derived from the (case-insensitive) email address.
    pub fn from_email(email: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"acct");
        hasher.update(email.trim().to_lowercase().as_bytes());
        let digest: [u8; 32] = hasher.finalize().into();
        Self(hex::encode(&digest[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferralCode(String);

impl ReferralCode {
    /// `NAME-42`: up to four alphanumerics of the name plus a two-digit suffix.
    pub fn generate<R: Rng + ?Sized>(name: &str, rng: &mut R) -> Self {
        let mut prefix: String = name
            .chars()
            .filter(|c| c.is_alphanumeric())
            .take(4)
            .collect::<String>()
            .to_uppercase();
        if prefix.is_empty() {
            prefix.push_str("USER");
        }
        let suffix: u8 = rng.gen_range(10..=99);
        Self(format!("{prefix}-{suffix}"))
    }

    /// Normalizes user input. Blank input is no code at all.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_uppercase()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferralCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Signup form input.
#[derive(Clone, Debug, Default)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl NewAccount {
    pub fn validate(&self) -> Result<(), CoreError> {
        let fields = [
            (Field::Name, &self.name),
            (Field::Email, &self.email),
            (Field::Password, &self.password),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(CoreError::MissingField(field));
            }
        }
        Ok(())
    }
}

/// Flat account record; missing fields take the demo profile's values on load.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserAccount {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    pub joined_on: NaiveDate,
    pub location: String,
    pub referral_code: ReferralCode,
    pub friends_invited: u64,
    pub total_donations: u64,
    pub xp: u64,
    pub redeemed: RedemptionRecord,
}

impl Default for UserAccount {
    fn default() -> Self {
        let email = "marcus.v@hero.io";
        Self {
            id: AccountId::from_email(email),
            name: "MARCUS V.".into(),
            email: email.into(),
            joined_on: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap_or(NaiveDate::MIN),
            location: "Mumbai, IN".into(),
            referral_code: ReferralCode("MARC-26".into()),
            friends_invited: 8,
            total_donations: 12_500,
            xp: 2_450,
            redeemed: RedemptionRecord::default(),
        }
    }
}

impl UserAccount {
    /// Fresh account for a validated signup.
    pub fn open(input: &NewAccount, referral_code: ReferralCode, joined_on: NaiveDate) -> Self {
        let email = input.email.trim();
        Self {
            id: AccountId::from_email(email),
            name: input.name.trim().to_string(),
            email: email.to_string(),
            joined_on,
            location: NEW_ACCOUNT_LOCATION.into(),
            referral_code,
            friends_invited: 0,
            total_donations: 0,
            xp: 0,
            redeemed: RedemptionRecord::default(),
        }
    }

    pub fn rank(&self) -> &'static RankTier {
        rank::rank_for(self.friends_invited)
    }

    pub fn joined_label(&self) -> String {
        self.joined_on.format("%b %Y").to_string().to_uppercase()
    }

    pub fn ad_spend_saved(&self) -> u64 {
        self.friends_invited.saturating_mul(AD_SPEND_PER_FRIEND)
    }

    pub fn verified_receipts(&self) -> u64 {
        self.total_donations / DONATION_PER_RECEIPT
    }

    /// Claimed rewards, resolved against the catalog. Ids the catalog no
    /// longer knows are skipped.
    pub fn vault(&self) -> Vec<&'static RewardDefinition> {
        self.redeemed
            .iter()
            .filter_map(|id| milestones::find(&CATALOG, id).ok())
            .collect()
    }

    pub fn credit_referral(&mut self, friends: u64, xp: u64) {
        self.friends_invited = self.friends_invited.saturating_add(friends);
        self.xp = self.xp.saturating_add(xp);
    }

    pub fn progress(&self) -> MilestoneProgress {
        MilestoneProgress {
            xp: self.xp,
            redeemed: self.redeemed.clone(),
        }
    }

    pub fn redeem(&mut self, reward: &RewardDefinition) -> Result<Redemption, CoreError> {
        let mut progress = self.progress();
        let redemption = milestones::redeem(reward, &mut progress)?;
        self.xp = progress.xp;
        self.redeemed = progress.redeemed;
        Ok(redemption)
    }
}
