use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use invitel::ledger::{AccountService, SharedLedger};
use invitel::referral::{ReferralConfig, ReferralOutcome, Registrar};
use invitel::store::{JsonFileStore, LedgerFile, SnapshotStore};
use invitel_core::account::NewAccount;
use invitel_core::milestones::{reward_status, RewardId, RewardStatus, CATALOG};
use invitel_core::rank::rank_for;
use invitel_core::CoreError;
use rand::{rngs::StdRng, RngCore, SeedableRng};

fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("invitel-flow-{:016x}", rand::thread_rng().next_u64()))
}

fn signup(name: &str, email: &str) -> NewAccount {
    NewAccount {
        name: name.into(),
        email: email.into(),
        password: "correct horse".into(),
    }
}

#[test]
fn five_referrals_promote_referrer_across_restarts() {
    let dir = scratch_dir();
    let config = ReferralConfig::default();
    let today = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
    let mut rng = StdRng::seed_from_u64(11);

    let ledger = SharedLedger::new(LedgerFile::new(&dir).load().unwrap());
    let host = Registrar::new(&config, &ledger)
        .register(&signup("Marcus", "marcus@hero.io"), None, &mut rng, today)
        .unwrap()
        .account;
    LedgerFile::new(&dir).save(&ledger.snapshot()).unwrap();
    assert_eq!(host.rank().name, "SEED");

    for idx in 0..5 {
        // Each signup reloads the ledger from disk, as separate CLI runs would.
        let ledger = SharedLedger::new(LedgerFile::new(&dir).load().unwrap());
        let reg = Registrar::new(&config, &ledger)
            .register(
                &signup("Friend", &format!("friend{idx}@hero.io")),
                Some(host.referral_code.as_str()),
                &mut rng,
                today,
            )
            .unwrap();
        assert!(matches!(reg.referral, ReferralOutcome::Credited { .. }));
        LedgerFile::new(&dir).save(&ledger.snapshot()).unwrap();
    }

    let ledger = SharedLedger::new(LedgerFile::new(&dir).load().unwrap());
    let host = ledger.fetch(&host.id).unwrap();
    assert_eq!(host.friends_invited, 5);
    assert_eq!(host.xp, 2_500);
    assert_eq!(host.rank(), rank_for(5));
    assert_eq!(host.rank().name, "CATALYST");

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn bonus_drop_unlocks_next_tier_of_rewards() {
    let dir = scratch_dir();
    let store = JsonFileStore::new(&dir);
    let mut profile = store.load_or_default().unwrap();
    assert_eq!(profile.xp, 2_450);

    let before = reward_status(&CATALOG, profile.xp, &profile.redeemed);
    assert_eq!(before[1].status, RewardStatus::Unlocked);
    assert_eq!(before[3].status, RewardStatus::Unlocked);
    assert_eq!(before[4].status, RewardStatus::Locked);

    profile.redeem(&CATALOG[1]).unwrap();
    store.save(&profile).unwrap();

    let reloaded = store.load().unwrap().unwrap();
    assert_eq!(reloaded.xp, 2_950);
    let after = reward_status(&CATALOG, reloaded.xp, &reloaded.redeemed);
    assert_eq!(after[1].status, RewardStatus::Claimed);
    assert_eq!(after[3].status, RewardStatus::Unlocked);
    assert_eq!(after[4].xp_needed, 550);

    let mut again = reloaded.clone();
    assert_eq!(
        again.redeem(&CATALOG[1]).unwrap_err(),
        CoreError::AlreadyClaimed(RewardId(2))
    );
    assert_eq!(again, reloaded);

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn stale_referral_code_still_registers() {
    let ledger = SharedLedger::default();
    let config = ReferralConfig::default();
    let reg = Registrar::new(&config, &ledger)
        .register(
            &signup("Nina W.", "nina@example.com"),
            Some("MARC-26"),
            &mut StdRng::seed_from_u64(3),
            NaiveDate::from_ymd_opt(2026, 4, 9).unwrap(),
        )
        .unwrap();
    assert!(matches!(reg.referral, ReferralOutcome::Ignored { .. }));
    assert_eq!(reg.account.name, "Nina W.");
    assert_eq!(reg.account.email, "nina@example.com");
    assert_eq!(reg.account.location, "Global Data");
    assert!(reg.account.referral_code.as_str().starts_with("NINA-"));
    assert_eq!(ledger.snapshot().accounts.len(), 1);
}
