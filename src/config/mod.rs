use std::path::PathBuf;

use clap::Args;

use crate::referral::{ReferralConfig, REFERRAL_BONUS_XP};
use crate::store::{JsonFileStore, LedgerFile};

/// Settings shared by every subcommand. Flags win over environment variables.
#[derive(Args, Clone, Debug)]
pub struct Config {
    /// Directory holding userProfile.json and ledger.json
    #[arg(long, env = "INVITEL_DATA_DIR", default_value = ".invitel", global = true)]
    pub data_dir: PathBuf,

    /// XP credited to a referrer per successful signup
    #[arg(
        long,
        env = "INVITEL_REFERRAL_BONUS_XP",
        default_value_t = REFERRAL_BONUS_XP,
        global = true
    )]
    pub referral_bonus_xp: u64,

    /// Log filter, e.g. "info" or "invitel=debug"
    #[arg(long = "log", env = "RUST_LOG", default_value = "info", global = true)]
    pub log_filter: String,
}

impl Config {
    pub fn referral(&self) -> ReferralConfig {
        ReferralConfig {
            bonus_xp: self.referral_bonus_xp,
            ..ReferralConfig::default()
        }
    }

    pub fn profile_store(&self) -> JsonFileStore {
        JsonFileStore::new(&self.data_dir)
    }

    pub fn ledger_file(&self) -> LedgerFile {
        LedgerFile::new(&self.data_dir)
    }
}
