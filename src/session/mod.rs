//! The active profile and how it lines up with the ledger.
//!
//! The stored profile is a cache. When the ledger knows the account, the
//! ledger copy wins, since referral credits only ever land there. Profiles the
//! ledger has never seen (the demo profile, say) are handled locally.

use invitel_core::account::UserAccount;
use invitel_core::milestones::{Redemption, RewardDefinition};
use invitel_core::CoreError;
use serde::Serialize;
use tracing::{debug, info};

use crate::ledger::{AccountService, LedgerError};
use crate::store::{SnapshotStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Rejected(#[from] CoreError),
}

/// Where a redemption was recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Settlement {
    Ledger,
    Local,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Claim {
    pub account: UserAccount,
    pub redemption: Redemption,
    pub settled: Settlement,
}

pub struct Session<'a, S: AccountService> {
    profiles: &'a dyn SnapshotStore,
    service: &'a S,
}

impl<'a, S: AccountService> Session<'a, S> {
    pub fn new(profiles: &'a dyn SnapshotStore, service: &'a S) -> Self {
        Self { profiles, service }
    }

    /// Stored profile, refreshed from the ledger when the ledger knows it.
    pub fn active_profile(&self) -> Result<UserAccount, SessionError> {
        let stored = self.profiles.load_or_default()?;
        match self.service.fetch(&stored.id) {
            Some(fresh) => {
                debug!(account = %fresh.id, "profile refreshed from ledger");
                Ok(fresh)
            }
            None => Ok(stored),
        }
    }

    /// Claims `reward` for the active profile and saves the updated profile.
    pub fn redeem(&self, reward: &RewardDefinition) -> Result<Claim, SessionError> {
        let stored = self.profiles.load_or_default()?;
        let claim = if self.service.fetch(&stored.id).is_some() {
            let redemption = self.service.redeem(&stored.id, reward.id)?;
            let account =
                self.service
                    .fetch(&stored.id)
                    .ok_or_else(|| LedgerError::UnknownAccount {
                        account: stored.id.clone(),
                    })?;
            Claim {
                account,
                redemption,
                settled: Settlement::Ledger,
            }
        } else {
            let mut account = stored;
            let redemption = account.redeem(reward)?;
            Claim {
                account,
                redemption,
                settled: Settlement::Local,
            }
        };

        self.profiles.save(&claim.account)?;
        info!(
            account = %claim.account.id,
            reward = %reward.id,
            xp = claim.account.xp,
            settled = ?claim.settled,
            "reward redeemed"
        );
        Ok(claim)
    }
}
