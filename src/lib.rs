//! `simledger` — the transactional-ledger core of a virtual-phone-number
//! reselling service.
//!
//! Tracks prepaid user balances in integer minor units, keeps an
//! append-only transaction log as the source of truth, and drives the
//! reserve → provision → commit-or-compensate saga around an unreliable
//! asynchronous provisioning provider. Rendering, menus and the concrete
//! vendor HTTP clients live outside this crate behind the traits in
//! [`domain::ports`].

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
