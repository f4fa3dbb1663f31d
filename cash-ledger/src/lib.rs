//! Cash Ledger
//!
//! Peer-to-peer cash ledger: per-user accounts, deposits, withdrawals and
//! transfers, payment requests, and time-boxed escrow for protected payments.
//!
//! # Architecture
//!
//! - **Signed transactions**: every mutation is an Ed25519-signed instruction
//! - **Derived addresses**: record keys are hashes of identities and sequence numbers
//! - **Fail-fast locking**: a transaction locks its whole write set or fails with `AccountInUse`
//! - **Atomic commits**: all writes of a transaction land in one RocksDB `WriteBatch`
//!
//! # Invariants
//!
//! - Value conservation: Σ(balances) + Σ(escrowed) == Σ(deposits) - Σ(withdrawals)
//! - Supply conservation: every minted unit sits in one wallet, account, request or escrow
//! - No record's native balance ever drops under its storage deposit
//! - An escrow leaves `Holding` exactly once

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod accounts;
pub mod auth;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod escrow;
pub mod instruction;
pub mod ledger;
pub mod locks;
pub mod metrics;
pub mod processor;
pub mod request;
pub mod storage;
pub mod sweeper;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use crypto::KeyPair;
pub use error::{Error, ErrorKind, Failure, Result};
pub use instruction::{Instruction, Outcome, Receipt, SignedTransaction, Transaction, TxId};
pub use ledger::{Audit, Ledger};
pub use storage::Storage;
pub use sweeper::{spawn_sweeper, SweeperHandle};
pub use types::{
    Account, EscrowEntry, EscrowStatus, Identity, PaymentRequest, ResolvedEscrow, Signature,
    StorageKey,
};
