//! Core types for the ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Checked arithmetic on every balance field
//! - Storage locations derived from identities, never chosen by clients

use crate::crypto::derive_key;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Principal identity (Ed25519 public key)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity([u8; 32]);

impl Identity {
    /// Create from raw public key bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw public key bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex form
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Identity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| Error::InvalidInstruction(format!("Invalid identity {}: {}", s, e)))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::InvalidInstruction(format!("Identity {} is not 32 bytes", s)))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", &self.to_hex()[..8])
    }
}

/// Storage address of a ledger record
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorageKey([u8; 32]);

impl StorageKey {
    const ACCOUNT_TAG: &'static [u8] = b"account";
    const WALLET_TAG: &'static [u8] = b"wallet";
    const REQUEST_TAG: &'static [u8] = b"request";
    const ESCROW_TAG: &'static [u8] = b"escrow";
    const SUPPLY_TAG: &'static [u8] = b"supply";

    /// Ledger account of `owner`
    pub fn account(owner: &Identity) -> Self {
        Self(derive_key(Self::ACCOUNT_TAG, &[owner.as_bytes()]))
    }

    /// External wallet of `identity`
    pub fn wallet(identity: &Identity) -> Self {
        Self(derive_key(Self::WALLET_TAG, &[identity.as_bytes()]))
    }

    /// Payment request number `seq` opened by `requester`
    pub fn request(requester: &Identity, seq: u64) -> Self {
        Self(derive_key(
            Self::REQUEST_TAG,
            &[requester.as_bytes(), &seq.to_le_bytes()],
        ))
    }

    /// Escrow number `seq` funded by `sender`
    pub fn escrow(sender: &Identity, seq: u64) -> Self {
        Self(derive_key(
            Self::ESCROW_TAG,
            &[sender.as_bytes(), &seq.to_le_bytes()],
        ))
    }

    /// Ledger-wide supply counter
    pub fn supply() -> Self {
        Self(derive_key(Self::SUPPLY_TAG, &[]))
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageKey({})", &hex::encode(self.0)[..8])
    }
}

/// Ledger account of one owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Controlling principal
    pub owner: Identity,

    /// Spendable balance held by the program for the owner
    pub balance: u64,

    /// Storage deposit locked at initialization
    pub rent_reserve: u64,

    /// Peers, insertion ordered and deduplicated
    pub friends: Vec<Identity>,

    /// Payment requests opened by this owner and not yet resolved
    pub open_requests: u32,

    /// Sequence number for the next payment request
    pub next_request_seq: u64,

    /// Sequence number for the next escrow
    pub next_escrow_seq: u64,

    /// Cumulative deposits into this account
    pub total_deposited: u64,

    /// Cumulative withdrawals out of this account
    pub total_withdrawn: u64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Fixed allocation excluding the friend list
    pub const BASE_SPACE: usize = 32 + 8 * 7 + 4 + 12;

    /// Create an empty account
    pub fn new(owner: Identity, rent_reserve: u64, created_at: DateTime<Utc>) -> Self {
        Self {
            owner,
            balance: 0,
            rent_reserve,
            friends: Vec::new(),
            open_requests: 0,
            next_request_seq: 0,
            next_escrow_seq: 0,
            total_deposited: 0,
            total_withdrawn: 0,
            created_at,
        }
    }

    /// Bytes allocated for an account with room for `max_friends`
    pub fn space(max_friends: usize) -> usize {
        Self::BASE_SPACE + 32 * max_friends
    }

    /// Storage key derived from the owner
    pub fn key(&self) -> StorageKey {
        StorageKey::account(&self.owner)
    }

    /// Native value held by the record: deposit plus balance
    pub fn native_balance(&self) -> Result<u64> {
        self.rent_reserve.checked_add(self.balance).ok_or_else(|| {
            Error::Overflow(format!("native balance of account {}", self.owner))
        })
    }

    /// Add to the spendable balance
    pub fn credit(&mut self, amount: u64) -> Result<()> {
        let balance = self
            .balance
            .checked_add(amount)
            .filter(|balance| self.rent_reserve.checked_add(*balance).is_some())
            .ok_or_else(|| {
                Error::Overflow(format!("crediting {} to account {}", amount, self.owner))
            })?;
        self.balance = balance;
        Ok(())
    }

    /// Remove from the spendable balance
    pub fn debit(&mut self, amount: u64) -> Result<()> {
        if amount > self.balance {
            return Err(Error::InsufficientFunds(format!(
                "account {} holds {}, needs {}",
                self.owner, self.balance, amount
            )));
        }
        self.balance -= amount;
        Ok(())
    }

    /// Whether `peer` is already a friend
    pub fn has_friend(&self, peer: &Identity) -> bool {
        self.friends.contains(peer)
    }
}

/// External native balance of an identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// Holder
    pub owner: Identity,
    /// Native balance
    pub balance: u64,
}

impl Wallet {
    /// Empty wallet
    pub fn empty(owner: Identity) -> Self {
        Self { owner, balance: 0 }
    }

    /// Add native value
    pub fn credit(&mut self, amount: u64) -> Result<()> {
        self.balance = self.balance.checked_add(amount).ok_or_else(|| {
            Error::Overflow(format!("crediting {} to wallet {}", amount, self.owner))
        })?;
        Ok(())
    }

    /// Remove native value
    pub fn debit(&mut self, amount: u64) -> Result<()> {
        if amount > self.balance {
            return Err(Error::InsufficientFunds(format!(
                "wallet {} holds {}, needs {}",
                self.owner, self.balance, amount
            )));
        }
        self.balance -= amount;
        Ok(())
    }
}

/// Outstanding ask for funds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Storage key (requester, seq)
    pub key: StorageKey,

    /// Requester sequence number
    pub seq: u64,

    /// Requester; receives the funds when accepted
    pub sender: Identity,

    /// Party expected to fund the request
    pub recipient: Identity,

    /// Requested amount
    pub amount: u64,

    /// Storage deposit paid by the requester
    pub rent_reserve: u64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl PaymentRequest {
    /// Bytes allocated per request
    pub const SPACE: usize = 32 + 8 + 32 + 32 + 8 + 8 + 12;
}

/// Escrow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EscrowStatus {
    /// Funds held, awaiting revoke or release
    Holding = 1,
    /// Funds forwarded to the recipient (terminal)
    Released = 2,
    /// Funds returned to the sender (terminal)
    Revoked = 3,
}

impl EscrowStatus {
    /// Check if status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, EscrowStatus::Released | EscrowStatus::Revoked)
    }
}

/// Protected payment held by the program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowEntry {
    /// Storage key (sender, seq)
    pub key: StorageKey,

    /// Sender sequence number
    pub seq: u64,

    /// Funding party; may revoke inside the window
    pub sender: Identity,

    /// Beneficiary after release
    pub recipient: Identity,

    /// Held amount
    pub amount: u64,

    /// Storage deposit paid by the sender
    pub rent_reserve: u64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Earliest release; revocation allowed strictly before
    pub release_time: DateTime<Utc>,

    /// Current status
    pub status: EscrowStatus,
}

impl EscrowEntry {
    /// Bytes allocated per escrow
    pub const SPACE: usize = 32 + 8 + 32 + 32 + 8 + 8 + 12 + 12 + 1;

    /// Native value held by the record
    pub fn native_balance(&self) -> Result<u64> {
        self.rent_reserve
            .checked_add(self.amount)
            .ok_or_else(|| Error::Overflow(format!("native balance of escrow {}", self.key)))
    }

    /// Whether the hold window has elapsed at `now`
    pub fn is_mature(&self, now: DateTime<Utc>) -> bool {
        now >= self.release_time
    }
}

/// Tombstone left after an escrow closes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEscrow {
    /// Closed escrow key
    pub key: StorageKey,
    /// Terminal status
    pub status: EscrowStatus,
    /// Amount paid out
    pub amount: u64,
    /// Signer that triggered the transition
    pub resolved_by: Identity,
    /// Transition timestamp
    pub resolved_at: DateTime<Utc>,
}

/// Digital signature (Ed25519)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Signature bytes (64 bytes)
    #[serde(with = "serde_bytes")]
    bytes: [u8; 64],
}

impl Signature {
    /// Create from bytes
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self { bytes }
    }

    /// Get bytes
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(byte: u8) -> Identity {
        Identity::new([byte; 32])
    }

    #[test]
    fn test_identity_hex_round_trip() {
        let id = identity(0xab);
        let parsed: Identity = id.to_hex().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("zz".parse::<Identity>().is_err());
        assert!("abcd".parse::<Identity>().is_err());
    }

    #[test]
    fn test_account_key_is_per_owner() {
        assert_eq!(StorageKey::account(&identity(1)), StorageKey::account(&identity(1)));
        assert_ne!(StorageKey::account(&identity(1)), StorageKey::account(&identity(2)));
        assert_ne!(StorageKey::request(&identity(1), 0), StorageKey::request(&identity(1), 1));
    }

    #[test]
    fn test_account_credit_overflow() {
        let mut account = Account::new(identity(1), 10, Utc::now());
        account.credit(u64::MAX - 10).unwrap();

        let err = account.credit(1).unwrap_err();
        assert!(matches!(err, Error::Overflow(_)));
        assert_eq!(account.balance, u64::MAX - 10);
    }

    #[test]
    fn test_account_debit_insufficient() {
        let mut account = Account::new(identity(1), 10, Utc::now());
        account.credit(50).unwrap();

        assert!(matches!(account.debit(51), Err(Error::InsufficientFunds(_))));
        assert_eq!(account.balance, 50);

        account.debit(50).unwrap();
        assert_eq!(account.balance, 0);
        assert_eq!(account.native_balance().unwrap(), 10);
    }

    #[test]
    fn test_escrow_status_terminal() {
        assert!(!EscrowStatus::Holding.is_terminal());
        assert!(EscrowStatus::Released.is_terminal());
        assert!(EscrowStatus::Revoked.is_terminal());
    }
}
