//! Self-registration with an optional referral code.
//!
//! Creating the new account is the only step that can fail. Crediting the
//! referrer is best effort: a code that resolves to nobody, or any other
//! failure on the referrer's side, is logged and dropped.

use chrono::NaiveDate;
use invitel_core::account::{AccountId, NewAccount, ReferralCode, UserAccount};
use invitel_core::CoreError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ledger::{AccountService, LedgerError, ReferralCredit};

pub const REFERRAL_BONUS_XP: u64 = 500;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferralConfig {
    pub bonus_xp: u64,
    pub friends_per_referral: u64,
    /// Fresh suffixes to try when a generated code is already taken.
    pub max_code_attempts: u32,
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self {
            bonus_xp: REFERRAL_BONUS_XP,
            friends_per_referral: 1,
            max_code_attempts: 8,
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReferralOutcome {
    NotRequested,
    Credited { referrer: AccountId },
    Ignored { code: ReferralCode },
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Registration {
    pub account: UserAccount,
    pub referral: ReferralOutcome,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("invalid signup: {0}")]
    Invalid(#[from] CoreError),
    #[error("no free referral code after {attempts} attempts")]
    CodeSpaceExhausted { attempts: u32 },
    #[error("account service rejected signup: {0}")]
    Service(#[from] LedgerError),
}

pub struct Registrar<'a, S: AccountService> {
    config: &'a ReferralConfig,
    service: &'a S,
}

impl<'a, S: AccountService> Registrar<'a, S> {
    pub fn new(config: &'a ReferralConfig, service: &'a S) -> Self {
        Self { config, service }
    }

    pub fn register<R: Rng + ?Sized>(
        &self,
        input: &NewAccount,
        referral_code: Option<&str>,
        rng: &mut R,
        today: NaiveDate,
    ) -> Result<Registration, RegistrationError> {
        input.validate()?;

        let account = self.create_with_fresh_code(input, rng, today)?;
        info!(
            account = %account.id,
            code = %account.referral_code,
            "registered new account"
        );

        let referral = match referral_code.and_then(ReferralCode::parse) {
            None => ReferralOutcome::NotRequested,
            Some(code) => self.credit_referrer(code, &account),
        };

        Ok(Registration { account, referral })
    }

    fn create_with_fresh_code<R: Rng + ?Sized>(
        &self,
        input: &NewAccount,
        rng: &mut R,
        today: NaiveDate,
    ) -> Result<UserAccount, RegistrationError> {
        let attempts = self.config.max_code_attempts.max(1);
        for _ in 0..attempts {
            let code = ReferralCode::generate(&input.name, rng);
            let account = UserAccount::open(input, code, today);
            match self.service.create_account(account.clone()) {
                Ok(_) => return Ok(account),
                Err(LedgerError::DuplicateReferralCode { code }) => {
                    warn!(%code, "generated referral code already taken, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(RegistrationError::CodeSpaceExhausted { attempts })
    }

    fn credit_referrer(&self, code: ReferralCode, invitee: &UserAccount) -> ReferralOutcome {
        if code == invitee.referral_code {
            warn!(%code, "self-referral ignored");
            return ReferralOutcome::Ignored { code };
        }
        let credit = ReferralCredit {
            code: code.clone(),
            friends: self.config.friends_per_referral,
            xp: self.config.bonus_xp,
        };
        match self.service.credit_referral(&credit) {
            Ok(referrer) => {
                info!(
                    %referrer,
                    %code,
                    xp = credit.xp,
                    friends = credit.friends,
                    "credited referrer"
                );
                ReferralOutcome::Credited { referrer }
            }
            Err(err) => {
                warn!(%code, error = %err, "referral credit dropped");
                ReferralOutcome::Ignored { code }
            }
        }
    }
}
