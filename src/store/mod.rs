//! Snapshot persistence.
//!
//! The active profile lives under one key, `userProfile`. Loading yields
//! `None` on first run; callers fall back to [`UserAccount::default`]. Fields
//! missing from a stored record are merged from that default by serde.

use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use invitel_core::account::UserAccount;
use tracing::debug;

use crate::ledger::{LedgerError, LedgerSnapshot, LedgerState};

pub const PROFILE_KEY: &str = "userProfile";
pub const LEDGER_FILE: &str = "ledger.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("snapshot i/o failed at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("snapshot is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub trait SnapshotStore {
    fn load(&self) -> Result<Option<UserAccount>, StoreError>;
    fn save(&self, account: &UserAccount) -> Result<(), StoreError>;

    fn load_or_default(&self) -> Result<UserAccount, StoreError> {
        Ok(self.load()?.unwrap_or_default())
    }
}

/// Keeps the serialized record in memory, so merge-on-load behaves like the file store.
#[derive(Default)]
pub struct MemoryStore {
    slot: RefCell<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(json: impl Into<String>) -> Self {
        Self {
            slot: RefCell::new(Some(json.into())),
        }
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<Option<UserAccount>, StoreError> {
        match self.slot.borrow().as_deref() {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }

    fn save(&self, account: &UserAccount) -> Result<(), StoreError> {
        *self.slot.borrow_mut() = Some(serde_json::to_string(account)?);
        Ok(())
    }
}

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{PROFILE_KEY}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> Result<Option<UserAccount>, StoreError> {
        let Some(bytes) = read_optional(&self.path)? else {
            debug!(path = %self.path.display(), "no stored profile");
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn save(&self, account: &UserAccount) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(account)?;
        write_atomic(&self.path, &json)?;
        debug!(path = %self.path.display(), account = %account.id, "saved profile");
        Ok(())
    }
}

/// The whole account ledger, kept next to the profile snapshot.
pub struct LedgerFile {
    path: PathBuf,
}

impl LedgerFile {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(LEDGER_FILE),
        }
    }

    pub fn load(&self) -> Result<LedgerState, StoreError> {
        match read_optional(&self.path)? {
            Some(bytes) => {
                let snapshot: LedgerSnapshot = serde_json::from_slice(&bytes)?;
                Ok(LedgerState::restore(snapshot)?)
            }
            None => Ok(LedgerState::new()),
        }
    }

    pub fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(snapshot)?;
        write_atomic(&self.path, &json)?;
        debug!(
            path = %self.path.display(),
            height = snapshot.meta.height,
            "saved ledger"
        );
        Ok(())
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)
}
