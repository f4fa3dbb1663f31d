//! Error types for the ledger

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Zero amount, or an amount the instruction cannot accept
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Debited party cannot cover the amount
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Checked arithmetic on a bookkeeping field overflowed or underflowed
    #[error("Arithmetic overflow: {0}")]
    Overflow(String),

    /// Signature or ownership check failed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Derived storage key already occupied
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Account, request or escrow missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation attempted on a resolved record or outside its window
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A conflicting transaction holds one of the accounts
    #[error("Account in use: {0}")]
    AccountInUse(String),

    /// Friend list reached its configured capacity
    #[error("Friend list full: {0}")]
    FriendListFull(String),

    /// Malformed instruction (self-transfer, self-friend, ...)
    #[error("Invalid instruction: {0}")]
    InvalidInstruction(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Sweeper mailbox or reply channel closed
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Serializable classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidAmount(_) => ErrorKind::InvalidAmount,
            Error::InsufficientFunds(_) => ErrorKind::InsufficientFunds,
            Error::Overflow(_) => ErrorKind::Overflow,
            Error::Unauthorized(_) => ErrorKind::Unauthorized,
            Error::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::InvalidState(_) => ErrorKind::InvalidState,
            Error::AccountInUse(_) => ErrorKind::AccountInUse,
            Error::FriendListFull(_) => ErrorKind::FriendListFull,
            Error::InvalidInstruction(_) => ErrorKind::InvalidInstruction,
            Error::Storage(_)
            | Error::Serialization(_)
            | Error::Config(_)
            | Error::Concurrency(_)
            | Error::Metrics(_)
            | Error::Io(_) => ErrorKind::Internal,
        }
    }

    /// Whether resubmitting the same transaction later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::AccountInUse(_) | Error::Concurrency(_))
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

/// Error taxonomy surfaced to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// See [`Error::InvalidAmount`]
    InvalidAmount,
    /// See [`Error::InsufficientFunds`]
    InsufficientFunds,
    /// See [`Error::Overflow`]
    Overflow,
    /// See [`Error::Unauthorized`]
    Unauthorized,
    /// See [`Error::AlreadyExists`]
    AlreadyExists,
    /// See [`Error::NotFound`]
    NotFound,
    /// See [`Error::InvalidState`]
    InvalidState,
    /// See [`Error::AccountInUse`]
    AccountInUse,
    /// See [`Error::FriendListFull`]
    FriendListFull,
    /// See [`Error::InvalidInstruction`]
    InvalidInstruction,
    /// Storage, serialization and other node-side faults
    Internal,
}

impl ErrorKind {
    /// Snake case label
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidAmount => "invalid_amount",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::Overflow => "overflow",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::AccountInUse => "account_in_use",
            ErrorKind::FriendListFull => "friend_list_full",
            ErrorKind::InvalidInstruction => "invalid_instruction",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Structured failure returned to submitting clients
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct Failure {
    /// Failure class
    pub kind: ErrorKind,
    /// Human readable detail
    pub message: String,
}

impl Failure {
    /// Whether the client may resubmit unchanged
    pub fn is_retryable(&self) -> bool {
        self.kind == ErrorKind::AccountInUse
    }
}

impl From<&Error> for Failure {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<Error> for Failure {
    fn from(err: Error) -> Self {
        Failure::from(&err)
    }
}
