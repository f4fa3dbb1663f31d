//! Error types for the client

use cash_ledger::Failure;
use thiserror::Error;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// The ledger rejected the transaction
    #[error("Rejected by ledger: {0}")]
    Rejected(Failure),

    /// Handle did not resolve to an identity
    #[error("Name not found: {0}")]
    NameNotFound(String),

    /// Handle already registered to another identity
    #[error("Name taken: {0}")]
    NameTaken(String),

    /// Malformed payment link
    #[error("Invalid payment link: {0}")]
    InvalidLink(String),

    /// Ledger committed an outcome the call did not expect
    #[error("Unexpected outcome: {0}")]
    UnexpectedOutcome(String),

    /// Local ledger error (signing, encoding)
    #[error(transparent)]
    Ledger(#[from] cash_ledger::Error),
}

impl ClientError {
    /// Ledger failure, if the ledger rejected the call
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            ClientError::Rejected(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<Failure> for ClientError {
    fn from(failure: Failure) -> Self {
        ClientError::Rejected(failure)
    }
}
