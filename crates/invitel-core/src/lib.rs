//! Core primitives for the Invitel referral network.
//!
//! This crate exposes the pure building blocks that the stateful layers
//! (ledger, registration, CLI) are assembled from:
//!
//! * [`account`] - user accounts, referral codes and the signup input.
//! * [`rank`] - static rank ladders and threshold lookup.
//! * [`milestones`] - the reward catalog, reward status and redemption.
//! * [`leaderboard`] - read-only standings built from point snapshots.
//!
//! Nothing here performs I/O; every mutation happens on values owned by the
//! caller.

pub mod account;
pub mod leaderboard;
pub mod milestones;
pub mod rank;

mod error;

pub use error::{CoreError, Field};
