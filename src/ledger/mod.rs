use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, PoisonError};

use invitel_core::account::{AccountId, ReferralCode, UserAccount};
use invitel_core::milestones::{self, Redemption, RewardId, CATALOG};
use invitel_core::CoreError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub type Timestamp = u64;
pub type ReceiptId = [u8; 32];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("account {account} already exists")]
    DuplicateAccount { account: AccountId },
    #[error("referral code {code} is already taken")]
    DuplicateReferralCode { code: ReferralCode },
    #[error("no account uses referral code {code}")]
    ReferralNotFound { code: ReferralCode },
    #[error("unknown account {account}")]
    UnknownAccount { account: AccountId },
    #[error(transparent)]
    Rejected(#[from] CoreError),
    #[error("duplicate receipt detected")]
    DuplicateReceipt,
    #[error("snapshot state root does not match its accounts")]
    RootMismatch,
}

/// Credit owed to the account behind `code` for one successful signup.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferralCredit {
    pub code: ReferralCode,
    pub friends: u64,
    pub xp: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SnapshotMetadata {
    pub height: u64,
    pub timestamp: Timestamp,
    #[serde(with = "hex_receipt")]
    pub previous_receipt: Option<ReceiptId>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub meta: SnapshotMetadata,
    pub accounts: BTreeMap<AccountId, UserAccount>,
    pub events: Vec<LedgerEvent>,
    #[serde(with = "hex_root")]
    pub state_root: [u8; 32],
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    AccountRegistered {
        account: AccountId,
        referral_code: ReferralCode,
    },
    ReferralCredited {
        referrer: AccountId,
        code: ReferralCode,
        friends: u64,
        xp: u64,
    },
    RewardRedeemed {
        account: AccountId,
        redemption: Redemption,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerMutation {
    Register { account: UserAccount },
    CreditReferral(ReferralCredit),
    Redeem { account: AccountId, reward: RewardId },
}

#[derive(Clone, Default)]
struct Book {
    accounts: BTreeMap<AccountId, UserAccount>,
    codes: BTreeMap<ReferralCode, AccountId>,
}

impl Book {
    fn from_accounts(accounts: BTreeMap<AccountId, UserAccount>) -> Self {
        let codes = accounts
            .values()
            .map(|account| (account.referral_code.clone(), account.id.clone()))
            .collect();
        Self { accounts, codes }
    }

    fn account_mut(&mut self, id: &AccountId) -> Result<&mut UserAccount, LedgerError> {
        self.accounts
            .get_mut(id)
            .ok_or_else(|| LedgerError::UnknownAccount {
                account: id.clone(),
            })
    }

    fn register(&mut self, account: &UserAccount) -> Result<LedgerEvent, LedgerError> {
        if self.accounts.contains_key(&account.id) {
            return Err(LedgerError::DuplicateAccount {
                account: account.id.clone(),
            });
        }
        if self.codes.contains_key(&account.referral_code) {
            return Err(LedgerError::DuplicateReferralCode {
                code: account.referral_code.clone(),
            });
        }
        self.codes
            .insert(account.referral_code.clone(), account.id.clone());
        self.accounts.insert(account.id.clone(), account.clone());
        Ok(LedgerEvent::AccountRegistered {
            account: account.id.clone(),
            referral_code: account.referral_code.clone(),
        })
    }

    fn credit(&mut self, credit: &ReferralCredit) -> Result<(AccountId, LedgerEvent), LedgerError> {
        let referrer = self
            .codes
            .get(&credit.code)
            .cloned()
            .ok_or_else(|| LedgerError::ReferralNotFound {
                code: credit.code.clone(),
            })?;
        self.account_mut(&referrer)?
            .credit_referral(credit.friends, credit.xp);
        let event = LedgerEvent::ReferralCredited {
            referrer: referrer.clone(),
            code: credit.code.clone(),
            friends: credit.friends,
            xp: credit.xp,
        };
        Ok((referrer, event))
    }

    fn redeem(
        &mut self,
        id: &AccountId,
        reward: RewardId,
    ) -> Result<(Redemption, LedgerEvent), LedgerError> {
        let reward = milestones::find(&CATALOG, reward)?;
        let redemption = self.account_mut(id)?.redeem(reward)?;
        let event = LedgerEvent::RewardRedeemed {
            account: id.clone(),
            redemption,
        };
        Ok((redemption, event))
    }

    fn apply(&mut self, mutation: &LedgerMutation) -> Result<LedgerEvent, LedgerError> {
        match mutation {
            LedgerMutation::Register { account } => self.register(account),
            LedgerMutation::CreditReferral(credit) => Ok(self.credit(credit)?.1),
            LedgerMutation::Redeem { account, reward } => Ok(self.redeem(account, *reward)?.1),
        }
    }
}

/// Most recent events kept in memory and in snapshots.
pub const EVENT_LOG_LIMIT: usize = 64;

#[derive(Default)]
pub struct LedgerState {
    pub meta: SnapshotMetadata,
    book: Book,
    events: Vec<LedgerEvent>,
    applied_receipts: BTreeSet<ReceiptId>,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds state from a snapshot, refusing one whose root was tampered with.
    pub fn restore(snapshot: LedgerSnapshot) -> Result<Self, LedgerError> {
        if compute_state_root(&snapshot.accounts) != snapshot.state_root {
            return Err(LedgerError::RootMismatch);
        }
        let mut applied_receipts = BTreeSet::new();
        if let Some(receipt) = snapshot.meta.previous_receipt {
            applied_receipts.insert(receipt);
        }
        let mut state = Self {
            meta: snapshot.meta,
            book: Book::from_accounts(snapshot.accounts),
            events: Vec::new(),
            applied_receipts,
        };
        state.record(snapshot.events);
        Ok(state)
    }

    /// The newest events, oldest first, at most [`EVENT_LOG_LIMIT`] of them.
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn account(&self, id: &AccountId) -> Option<&UserAccount> {
        self.book.accounts.get(id)
    }

    pub fn find_by_code(&self, code: &ReferralCode) -> Option<&AccountId> {
        self.book.codes.get(code)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &UserAccount> {
        self.book.accounts.values()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            meta: self.meta.clone(),
            accounts: self.book.accounts.clone(),
            events: self.events.clone(),
            state_root: compute_state_root(&self.book.accounts),
        }
    }

    /// Applies the whole batch or nothing. Returns the events it produced.
    pub fn apply_mutations(
        &mut self,
        mutations: &[LedgerMutation],
        receipt_id: ReceiptId,
        timestamp: Timestamp,
    ) -> Result<Vec<LedgerEvent>, LedgerError> {
        self.transact(receipt_id, timestamp, |book| {
            let events = mutations
                .iter()
                .map(|mutation| book.apply(mutation))
                .collect::<Result<Vec<_>, _>>()?;
            Ok((events.clone(), events))
        })
    }

    /// Runs `op` against a staged copy of the book and keeps the result only
    /// if it succeeds.
    fn transact<T>(
        &mut self,
        receipt_id: ReceiptId,
        timestamp: Timestamp,
        op: impl FnOnce(&mut Book) -> Result<(T, Vec<LedgerEvent>), LedgerError>,
    ) -> Result<T, LedgerError> {
        if self.applied_receipts.contains(&receipt_id) {
            return Err(LedgerError::DuplicateReceipt);
        }

        let mut staged = self.book.clone();
        let (output, events) = op(&mut staged)?;

        self.book = staged;
        self.record(events);
        self.meta.height += 1;
        self.meta.timestamp = timestamp;
        self.meta.previous_receipt = Some(receipt_id);
        self.applied_receipts.insert(receipt_id);
        Ok(output)
    }

    fn record(&mut self, events: Vec<LedgerEvent>) {
        self.events.extend(events);
        let overflow = self.events.len().saturating_sub(EVENT_LOG_LIMIT);
        self.events.drain(..overflow);
    }
}

/// Request/response boundary to whoever owns the accounts.
pub trait AccountService {
    fn create_account(&self, account: UserAccount) -> Result<AccountId, LedgerError>;

    /// Returns the referrer that was credited.
    fn credit_referral(&self, credit: &ReferralCredit) -> Result<AccountId, LedgerError>;

    fn fetch(&self, id: &AccountId) -> Option<UserAccount>;

    fn find_by_code(&self, code: &ReferralCode) -> Option<AccountId>;

    fn redeem(&self, id: &AccountId, reward: RewardId) -> Result<Redemption, LedgerError>;
}

/// A ledger behind a mutex; every call is one read-modify-write transaction.
#[derive(Default)]
pub struct SharedLedger {
    state: Mutex<LedgerState>,
}

impl SharedLedger {
    pub fn new(state: LedgerState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.lock().snapshot()
    }

    pub fn into_inner(self) -> LedgerState {
        self.state.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn commit<T>(
        &self,
        op: impl FnOnce(&mut Book) -> Result<(T, LedgerEvent), LedgerError>,
    ) -> Result<T, LedgerError> {
        let mut state = self.lock();
        let receipt = receipt_for(state.meta.height + 1);
        state.transact(receipt, now(), |book| {
            let (output, event) = op(book)?;
            Ok((output, vec![event]))
        })
    }
}

impl AccountService for SharedLedger {
    fn create_account(&self, account: UserAccount) -> Result<AccountId, LedgerError> {
        self.commit(|book| Ok((account.id.clone(), book.register(&account)?)))
    }

    fn credit_referral(&self, credit: &ReferralCredit) -> Result<AccountId, LedgerError> {
        self.commit(|book| book.credit(credit))
    }

    fn fetch(&self, id: &AccountId) -> Option<UserAccount> {
        self.lock().account(id).cloned()
    }

    fn find_by_code(&self, code: &ReferralCode) -> Option<AccountId> {
        self.lock().find_by_code(code).cloned()
    }

    fn redeem(&self, id: &AccountId, reward: RewardId) -> Result<Redemption, LedgerError> {
        self.commit(|book| book.redeem(id, reward))
    }
}

fn receipt_for(height: u64) -> ReceiptId {
    let mut hasher = Sha256::new();
    hasher.update(b"receipt");
    hasher.update(height.to_le_bytes());
    hasher.finalize().into()
}

fn now() -> Timestamp {
    chrono::Utc::now().timestamp().max(0) as Timestamp
}

fn compute_state_root(accounts: &BTreeMap<AccountId, UserAccount>) -> [u8; 32] {
    let leaves = accounts
        .values()
        .map(|account| {
            let mut hasher = Sha256::new();
            hasher.update(b"acct");
            hasher.update(account.id.as_str().as_bytes());
            hasher.update(account.referral_code.as_str().as_bytes());
            hasher.update(account.friends_invited.to_le_bytes());
            hasher.update(account.total_donations.to_le_bytes());
            hasher.update(account.xp.to_le_bytes());
            for reward in account.redeemed.iter() {
                hasher.update(reward.0.to_le_bytes());
            }
            hasher.finalize().into()
        })
        .collect();
    build_merkle(leaves)
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"invitel-ledger-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity((leaves.len() + 1) / 2);
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            hasher.update(chunk.get(1).unwrap_or(&chunk[0]));
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}

mod hex_root {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| D::Error::custom("expected 32 bytes"))
    }
}

mod hex_receipt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<[u8; 32]>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => super::hex_root::serialize(bytes, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<[u8; 32]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Wrapped(#[serde(with = "super::hex_root")] [u8; 32]);

        let wrapped: Option<Wrapped> = Option::deserialize(deserializer)?;
        Ok(wrapped.map(|Wrapped(bytes)| bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    use chrono::NaiveDate;
    use invitel_core::account::NewAccount;

    fn account(name: &str, code: &str) -> UserAccount {
        let input = NewAccount {
            name: name.into(),
            email: format!("{}@example.com", name.to_lowercase()),
            password: "pw".into(),
        };
        UserAccount::open(
            &input,
            ReferralCode::parse(code).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
        )
    }

    fn credit(code: &str) -> LedgerMutation {
        LedgerMutation::CreditReferral(ReferralCredit {
            code: ReferralCode::parse(code).unwrap(),
            friends: 1,
            xp: 500,
        })
    }

    #[test]
    fn state_root_is_deterministic() {
        let mut ledger = LedgerState::new();
        ledger
            .apply_mutations(
                &[
                    LedgerMutation::Register {
                        account: account("Alice", "ALIC-10"),
                    },
                    LedgerMutation::Register {
                        account: account("Bob", "BOB-11"),
                    },
                ],
                [1u8; 32],
                1,
            )
            .unwrap();
        assert_eq!(ledger.snapshot().state_root, ledger.snapshot().state_root);
        assert_ne!(ledger.snapshot().state_root, LedgerState::new().snapshot().state_root);
    }

    #[test]
    fn referral_credit_updates_referrer_only() {
        let mut ledger = LedgerState::new();
        let alice = account("Alice", "ALIC-10");
        let bob = account("Bob", "BOB-11");
        let events = ledger
            .apply_mutations(
                &[
                    LedgerMutation::Register {
                        account: alice.clone(),
                    },
                    LedgerMutation::Register {
                        account: bob.clone(),
                    },
                    credit("alic-10"),
                ],
                [1u8; 32],
                1,
            )
            .unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(ledger.account(&alice.id).unwrap().friends_invited, 1);
        assert_eq!(ledger.account(&alice.id).unwrap().xp, 500);
        assert_eq!(ledger.account(&bob.id).unwrap().xp, 0);
        assert_eq!(ledger.meta.height, 1);
    }

    #[test]
    fn failed_batch_leaves_state_untouched() {
        let mut ledger = LedgerState::new();
        let alice = account("Alice", "ALIC-10");
        ledger
            .apply_mutations(&[LedgerMutation::Register { account: alice.clone() }], [1u8; 32], 1)
            .unwrap();
        let root = ledger.snapshot().state_root;

        let err = ledger
            .apply_mutations(&[credit("ALIC-10"), credit("NOPE-00")], [2u8; 32], 2)
            .unwrap_err();
        assert!(matches!(err, LedgerError::ReferralNotFound { .. }));
        assert_eq!(ledger.account(&alice.id).unwrap().xp, 0);
        assert_eq!(ledger.snapshot().state_root, root);
        assert_eq!(ledger.events().len(), 1);
        assert_eq!(ledger.meta.height, 1);
    }

    #[test]
    fn duplicate_code_and_receipt_are_rejected() {
        let mut ledger = LedgerState::new();
        ledger
            .apply_mutations(
                &[LedgerMutation::Register {
                    account: account("Alice", "ALIC-10"),
                }],
                [1u8; 32],
                1,
            )
            .unwrap();
        let err = ledger
            .apply_mutations(
                &[LedgerMutation::Register {
                    account: account("Alicia", "ALIC-10"),
                }],
                [2u8; 32],
                2,
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateReferralCode { .. }));
        let err = ledger.apply_mutations(&[], [1u8; 32], 3).unwrap_err();
        assert_eq!(err, LedgerError::DuplicateReceipt);
    }

    #[test]
    fn restore_checks_root() {
        let ledger = SharedLedger::default();
        ledger.create_account(account("Alice", "ALIC-10")).unwrap();
        let snapshot = ledger.snapshot();

        let restored = LedgerState::restore(snapshot.clone()).unwrap();
        assert_eq!(restored.snapshot(), snapshot);

        let mut tampered = snapshot;
        for account in tampered.accounts.values_mut() {
            account.xp += 10_000;
        }
        assert!(matches!(
            LedgerState::restore(tampered),
            Err(LedgerError::RootMismatch)
        ));
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let ledger = SharedLedger::default();
        ledger.create_account(account("Alice", "ALIC-10")).unwrap();
        let snapshot = ledger.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let decoded: LedgerSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn service_redeem_goes_through_ledger() {
        let ledger = SharedLedger::default();
        let alice = account("Alice", "ALIC-10");
        ledger.create_account(alice.clone()).unwrap();
        let code = ReferralCode::parse("ALIC-10").unwrap();
        let credit = ReferralCredit {
            code,
            friends: 1,
            xp: 500,
        };
        ledger.credit_referral(&credit).unwrap();

        let redemption = ledger.redeem(&alice.id, RewardId(2)).unwrap();
        assert_eq!(redemption.xp_after, 1_000);
        let err = ledger.redeem(&alice.id, RewardId(2)).unwrap_err();
        assert_eq!(err, LedgerError::Rejected(CoreError::AlreadyClaimed(RewardId(2))));
        assert_eq!(ledger.fetch(&alice.id).unwrap().xp, 1_000);
    }

    #[test]
    fn service_calls_report_their_own_failures() {
        let ledger = SharedLedger::default();
        let ghost = ReferralCredit {
            code: ReferralCode::parse("GHOST-99").unwrap(),
            friends: 1,
            xp: 500,
        };
        assert_eq!(
            ledger.credit_referral(&ghost).unwrap_err(),
            LedgerError::ReferralNotFound { code: ghost.code }
        );

        let alice = account("Alice", "ALIC-10");
        assert_eq!(
            ledger.redeem(&alice.id, RewardId(1)).unwrap_err(),
            LedgerError::UnknownAccount {
                account: alice.id.clone()
            }
        );
        assert_eq!(ledger.snapshot().meta.height, 0);
        assert!(ledger.snapshot().events.is_empty());
    }

    #[test]
    fn event_log_keeps_only_the_newest_entries() {
        let ledger = SharedLedger::default();
        ledger.create_account(account("Alice", "ALIC-10")).unwrap();
        let credit = ReferralCredit {
            code: ReferralCode::parse("ALIC-10").unwrap(),
            friends: 1,
            xp: 500,
        };
        for _ in 0..EVENT_LOG_LIMIT + 10 {
            ledger.credit_referral(&credit).unwrap();
        }

        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.events.len(), EVENT_LOG_LIMIT);
        assert!(snapshot
            .events
            .iter()
            .all(|event| matches!(event, LedgerEvent::ReferralCredited { .. })));
        assert_eq!(snapshot.meta.height, EVENT_LOG_LIMIT as u64 + 11);

        let mut oversized = snapshot.clone();
        oversized.events.extend(snapshot.events.iter().cloned());
        let restored = LedgerState::restore(oversized).unwrap();
        assert_eq!(restored.events(), snapshot.events.as_slice());
    }

    #[test]
    fn concurrent_credits_are_not_lost() {
        let ledger = Arc::new(SharedLedger::default());
        let alice = account("Alice", "ALIC-10");
        ledger.create_account(alice.clone()).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || {
                    for _ in 0..25 {
                        ledger
                            .credit_referral(&ReferralCredit {
                                code: ReferralCode::parse("ALIC-10").unwrap(),
                                friends: 1,
                                xp: 500,
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let alice = ledger.fetch(&alice.id).unwrap();
        assert_eq!(alice.friends_invited, 200);
        assert_eq!(alice.xp, 100_000);
    }
}
