//! Invitel: referral ranks, milestone rewards and signup.
//!
//! The pure rules live in [`invitel_core`]. This crate adds the stateful
//! pieces around them:
//!
//! * [`ledger`] - the multi-account store and the [`ledger::AccountService`]
//!   boundary, with all-or-nothing mutation batches.
//! * [`referral`] - registration and best-effort referrer credit.
//! * [`store`] - the single-profile snapshot and the ledger file.
//! * [`session`] - the active profile, reconciled with the ledger.
//! * [`config`] - runtime settings shared by the CLI.

pub mod config;
pub mod ledger;
pub mod referral;
pub mod session;
pub mod store;

pub use invitel_core;
