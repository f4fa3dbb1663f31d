//! Program surface: instructions, signed transactions and receipts
//!
//! Every mutating operation reaches the ledger as a [`SignedTransaction`].
//! The signature covers the bincode encoding of the [`Transaction`], whose
//! SHA-256 digest is the transaction id used for idempotent resubmission.

use crate::crypto::{hash_bytes, verify_signature, KeyPair};
use crate::types::{EscrowEntry, EscrowStatus, Identity, PaymentRequest, Signature, StorageKey};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ledger instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Create the account of `owner`; the signer pays the storage deposit
    InitializeAccount {
        /// Future account owner
        owner: Identity,
    },

    /// Move value from the signer's wallet into `owner`'s account
    Deposit {
        /// Credited account owner
        owner: Identity,
        /// Amount
        amount: u64,
    },

    /// Move value from `owner`'s account to the owner's wallet
    Withdraw {
        /// Debited account owner
        owner: Identity,
        /// Amount
        amount: u64,
    },

    /// Move value between two ledger accounts
    Transfer {
        /// Debited account owner
        from: Identity,
        /// Credited account owner
        to: Identity,
        /// Amount
        amount: u64,
    },

    /// Add `friend` to `owner`'s friend list
    AddFriend {
        /// Modified account owner
        owner: Identity,
        /// Peer to add
        friend: Identity,
    },

    /// Remove `friend` from `owner`'s friend list
    RemoveFriend {
        /// Modified account owner
        owner: Identity,
        /// Peer to remove
        friend: Identity,
    },

    /// Ask `recipient` for `amount`; the signer is the requester
    CreateRequest {
        /// Party expected to pay
        recipient: Identity,
        /// Amount
        amount: u64,
    },

    /// Pay an outstanding request (recipient only)
    AcceptRequest {
        /// Request key
        request: StorageKey,
    },

    /// Drop an outstanding request without moving funds
    DeclineRequest {
        /// Request key
        request: StorageKey,
    },

    /// Hold `amount` from `from`'s account in escrow for `to`
    SendProtected {
        /// Funding account owner
        from: Identity,
        /// Beneficiary
        to: Identity,
        /// Amount
        amount: u64,
    },

    /// Return escrowed funds to the sender (sender only, inside the window)
    RevokeEscrow {
        /// Escrow key
        escrow: StorageKey,
    },

    /// Forward escrowed funds to the recipient (anyone, after the window)
    ReleaseEscrow {
        /// Escrow key
        escrow: StorageKey,
    },
}

impl Instruction {
    /// Short name used in logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            Instruction::InitializeAccount { .. } => "initialize_account",
            Instruction::Deposit { .. } => "deposit",
            Instruction::Withdraw { .. } => "withdraw",
            Instruction::Transfer { .. } => "transfer",
            Instruction::AddFriend { .. } => "add_friend",
            Instruction::RemoveFriend { .. } => "remove_friend",
            Instruction::CreateRequest { .. } => "create_request",
            Instruction::AcceptRequest { .. } => "accept_request",
            Instruction::DeclineRequest { .. } => "decline_request",
            Instruction::SendProtected { .. } => "send_protected",
            Instruction::RevokeEscrow { .. } => "revoke_escrow",
            Instruction::ReleaseEscrow { .. } => "release_escrow",
        }
    }
}

/// Unsigned transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Signing identity
    pub signer: Identity,

    /// Client chosen value distinguishing otherwise identical transactions
    pub nonce: u64,

    /// Operation
    pub instruction: Instruction,
}

impl Transaction {
    /// Create new transaction
    pub fn new(signer: Identity, nonce: u64, instruction: Instruction) -> Self {
        Self {
            signer,
            nonce,
            instruction,
        }
    }

    /// Create canonical bytes for signing
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Transaction id
    pub fn id(&self) -> Result<TxId> {
        Ok(TxId(hash_bytes(&self.canonical_bytes()?)))
    }

    /// Sign with `keypair`
    ///
    /// The key is not checked against `signer`; a mismatch is rejected by
    /// the ledger.
    pub fn sign(self, keypair: &KeyPair) -> Result<SignedTransaction> {
        let signature = keypair.sign(&self.canonical_bytes()?);
        Ok(SignedTransaction {
            transaction: self,
            signature,
        })
    }
}

/// Transaction plus the signer's signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// Signed payload
    pub transaction: Transaction,
    /// Ed25519 signature over the canonical bytes
    pub signature: Signature,
}

impl SignedTransaction {
    /// Transaction id
    pub fn id(&self) -> Result<TxId> {
        self.transaction.id()
    }

    /// Signing identity
    pub fn signer(&self) -> Identity {
        self.transaction.signer
    }

    /// Verify the signature against the declared signer
    pub fn verify(&self) -> Result<bool> {
        let message = self.transaction.canonical_bytes()?;
        Ok(verify_signature(
            &message,
            &self.signature,
            &self.transaction.signer,
        ))
    }
}

/// SHA-256 of a transaction's canonical bytes
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxId([u8; 32]);

impl TxId {
    /// Wrap an existing digest
    pub const fn from_digest(digest: [u8; 32]) -> Self {
        Self(digest)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({})", &hex::encode(self.0)[..8])
    }
}

/// Resulting state of a committed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Account created
    AccountInitialized {
        /// Owner
        owner: Identity,
        /// Derived key
        account: StorageKey,
        /// Storage deposit
        rent_reserve: u64,
    },

    /// Deposit applied
    Deposited {
        /// Owner
        owner: Identity,
        /// Balance after
        balance: u64,
    },

    /// Withdrawal applied
    Withdrawn {
        /// Owner
        owner: Identity,
        /// Balance after
        balance: u64,
    },

    /// Transfer applied
    Transferred {
        /// Debited owner
        from: Identity,
        /// Credited owner
        to: Identity,
        /// Amount moved
        amount: u64,
        /// Debited balance after
        from_balance: u64,
        /// Credited balance after
        to_balance: u64,
    },

    /// Friend list changed (or confirmed unchanged)
    FriendsUpdated {
        /// Owner
        owner: Identity,
        /// Friend list after
        friends: Vec<Identity>,
    },

    /// Request opened
    RequestCreated {
        /// New request
        request: PaymentRequest,
    },

    /// Request paid and closed
    RequestAccepted {
        /// Closed request
        request: StorageKey,
        /// Amount paid
        amount: u64,
        /// Requester balance after
        sender_balance: u64,
        /// Payer balance after
        recipient_balance: u64,
    },

    /// Request closed without payment
    RequestDeclined {
        /// Closed request
        request: StorageKey,
    },

    /// Escrow opened
    EscrowCreated {
        /// New escrow
        escrow: EscrowEntry,
    },

    /// Escrow released or revoked and closed
    EscrowResolved {
        /// Closed escrow
        escrow: StorageKey,
        /// Terminal status
        status: EscrowStatus,
        /// Amount paid out
        amount: u64,
        /// Account credited with the amount
        credited: Identity,
    },
}

/// Record of a committed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Transaction id
    pub tx_id: TxId,
    /// Signing identity
    pub signer: Identity,
    /// Resulting state
    pub outcome: Outcome,
    /// Commit timestamp
    pub committed_at: DateTime<Utc>,
}
