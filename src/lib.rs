//! Append-only, hash-linked ledger with a pluggable proof-of-work admission rule.
//!
//! Blocks are built by the caller on top of [`Ledger::last_hash`], mined until
//! the ledger's [`Admission`] rule accepts their SHA-256 hash, then appended.
//! [`Ledger::check_valid`] re-derives every hash to detect tampering.

pub mod blockchain;
pub mod config;

pub use blockchain::{
    AcceptAll, Admission, AppendError, Block, BlockError, ChainError, Ledger, MineError,
    MineLimit, Payload, SharedLedger, StartsWithZeros,
};
pub use config::Config;
