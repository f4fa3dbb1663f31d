//! Transaction execution context and instruction dispatch
//!
//! Operations never write to storage directly. They load records through a
//! [`TxContext`], mutate private copies and stage them back. The staged
//! [`ChangeSet`] is committed in one batch by the ledger only if the whole
//! operation succeeded, so a failing check anywhere leaves storage untouched.

use crate::config::Config;
use crate::instruction::{Instruction, Outcome, Transaction};
use crate::storage::{ChangeSet, Storage};
use crate::types::{
    Account, EscrowEntry, EscrowStatus, Identity, PaymentRequest, ResolvedEscrow, StorageKey,
    Wallet,
};
use crate::{accounts, engine, escrow, request, Error, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Staging area for one transaction
#[derive(Debug)]
pub struct TxContext<'a> {
    storage: &'a Storage,
    config: &'a Config,
    signer: Identity,
    now: DateTime<Utc>,
    changes: ChangeSet,
}

impl<'a> TxContext<'a> {
    /// Create context for `signer` at `now`
    pub fn new(
        storage: &'a Storage,
        config: &'a Config,
        signer: Identity,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            storage,
            config,
            signer,
            now,
            changes: ChangeSet::default(),
        }
    }

    /// Identity that signed the transaction
    pub fn signer(&self) -> Identity {
        self.signer
    }

    /// Transaction time
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Ledger configuration
    pub fn config(&self) -> &Config {
        self.config
    }

    // Accounts

    /// Account of `owner`, if initialized
    pub fn try_account(&self, owner: &Identity) -> Result<Option<Account>> {
        let key = StorageKey::account(owner);
        if let Some(account) = self.changes.accounts.get(&key) {
            return Ok(Some(account.clone()));
        }
        self.storage.get_account(&key)
    }

    /// Account of `owner`
    pub fn account(&self, owner: &Identity) -> Result<Account> {
        self.try_account(owner)?
            .ok_or_else(|| Error::NotFound(format!("account of {}", owner)))
    }

    /// Stage account write
    pub fn put_account(&mut self, account: Account) {
        self.changes.accounts.insert(account.key(), account);
    }

    // Wallets

    /// Wallet of `identity`; missing wallets are empty
    pub fn wallet(&self, identity: &Identity) -> Result<Wallet> {
        let key = StorageKey::wallet(identity);
        if let Some(wallet) = self.changes.wallets.get(&key) {
            return Ok(wallet.clone());
        }
        Ok(self
            .storage
            .get_wallet(&key)?
            .unwrap_or_else(|| Wallet::empty(*identity)))
    }

    /// Stage wallet write
    pub fn put_wallet(&mut self, wallet: Wallet) {
        self.changes
            .wallets
            .insert(StorageKey::wallet(&wallet.owner), wallet);
    }

    /// Charge the storage deposit for a `space` byte record to `payer`
    pub fn charge_rent(&mut self, payer: &Identity, space: usize) -> Result<u64> {
        let rent = self.config.rent.minimum_for(space);
        let mut wallet = self.wallet(payer)?;
        wallet.debit(rent)?;
        self.put_wallet(wallet);
        Ok(rent)
    }

    /// Return a closed record's storage deposit to `to`
    pub fn refund_rent(&mut self, to: &Identity, amount: u64) -> Result<()> {
        let mut wallet = self.wallet(to)?;
        wallet.credit(amount)?;
        self.put_wallet(wallet);
        Ok(())
    }

    // Payment requests

    /// Whether `key` holds an open request
    pub fn request_exists(&self, key: &StorageKey) -> Result<bool> {
        if let Some(staged) = self.changes.requests.get(key) {
            return Ok(staged.is_some());
        }
        Ok(self.storage.get_request(key)?.is_some())
    }

    /// Open request at `key`
    pub fn request(&self, key: &StorageKey) -> Result<PaymentRequest> {
        let found = match self.changes.requests.get(key) {
            Some(staged) => staged.clone(),
            None => self.storage.get_request(key)?,
        };
        found.ok_or_else(|| Error::NotFound(format!("payment request {}", key)))
    }

    /// Stage request write
    pub fn put_request(&mut self, request: PaymentRequest) {
        self.changes.requests.insert(request.key, Some(request));
    }

    /// Stage request deletion
    pub fn close_request(&mut self, key: StorageKey) {
        self.changes.requests.insert(key, None);
    }

    // Escrows

    /// Holding escrow at `key`
    pub fn escrow(&self, key: &StorageKey) -> Result<EscrowEntry> {
        match self.changes.escrows.get(key) {
            Some(Some(escrow)) => Ok(escrow.clone()),
            Some(None) => Err(already_resolved(key)),
            None => load_escrow(self.storage, key),
        }
    }

    /// Stage escrow write
    pub fn put_escrow(&mut self, escrow: EscrowEntry) {
        self.changes.escrows.insert(escrow.key, Some(escrow));
    }

    /// Stage escrow deletion and its tombstone
    pub fn close_escrow(&mut self, escrow: &EscrowEntry, status: EscrowStatus) {
        self.changes.escrows.insert(escrow.key, None);
        self.changes.resolved.insert(
            escrow.key,
            ResolvedEscrow {
                key: escrow.key,
                status,
                amount: escrow.amount,
                resolved_by: self.signer,
                resolved_at: self.now,
            },
        );
    }

    /// Staged writes
    pub fn into_changes(self) -> ChangeSet {
        self.changes
    }
}

/// Holding escrow from storage, distinguishing closed from unknown keys
pub fn load_escrow(storage: &Storage, key: &StorageKey) -> Result<EscrowEntry> {
    if let Some(escrow) = storage.get_escrow(key)? {
        return Ok(escrow);
    }
    if storage.get_resolved(key)?.is_some() {
        return Err(already_resolved(key));
    }
    Err(Error::NotFound(format!("escrow {}", key)))
}

fn already_resolved(key: &StorageKey) -> Error {
    Error::InvalidState(format!("escrow {} already resolved", key))
}

/// Storage keys `tx` may write
///
/// Request and escrow instructions read their record to learn the parties;
/// the record key itself is part of the set, so the parties cannot change
/// once the locks are held.
pub fn write_set(storage: &Storage, tx: &Transaction) -> Result<BTreeSet<StorageKey>> {
    let signer = tx.signer;
    let mut keys = BTreeSet::new();

    match &tx.instruction {
        Instruction::InitializeAccount { owner } => {
            keys.insert(StorageKey::account(owner));
            keys.insert(StorageKey::wallet(&signer));
        }
        Instruction::Deposit { owner, .. } => {
            keys.insert(StorageKey::account(owner));
            keys.insert(StorageKey::wallet(&signer));
        }
        Instruction::Withdraw { owner, .. } => {
            keys.insert(StorageKey::account(owner));
            keys.insert(StorageKey::wallet(owner));
        }
        Instruction::Transfer { from, to, .. } => {
            keys.insert(StorageKey::account(from));
            keys.insert(StorageKey::account(to));
        }
        Instruction::AddFriend { owner, .. } | Instruction::RemoveFriend { owner, .. } => {
            keys.insert(StorageKey::account(owner));
        }
        Instruction::CreateRequest { .. } => {
            keys.insert(StorageKey::account(&signer));
            keys.insert(StorageKey::wallet(&signer));
        }
        Instruction::AcceptRequest { request } => {
            let record = storage
                .get_request(request)?
                .ok_or_else(|| Error::NotFound(format!("payment request {}", request)))?;
            keys.insert(*request);
            keys.insert(StorageKey::account(&record.sender));
            keys.insert(StorageKey::account(&record.recipient));
            keys.insert(StorageKey::wallet(&signer));
        }
        Instruction::DeclineRequest { request } => {
            let record = storage
                .get_request(request)?
                .ok_or_else(|| Error::NotFound(format!("payment request {}", request)))?;
            keys.insert(*request);
            keys.insert(StorageKey::account(&record.sender));
            keys.insert(StorageKey::wallet(&signer));
        }
        Instruction::SendProtected { from, .. } => {
            keys.insert(StorageKey::account(from));
            keys.insert(StorageKey::wallet(&signer));
        }
        Instruction::RevokeEscrow { escrow } => {
            let record = load_escrow(storage, escrow)?;
            keys.insert(*escrow);
            keys.insert(StorageKey::account(&record.sender));
            keys.insert(StorageKey::wallet(&signer));
        }
        Instruction::ReleaseEscrow { escrow } => {
            let record = load_escrow(storage, escrow)?;
            keys.insert(*escrow);
            keys.insert(StorageKey::account(&record.recipient));
            keys.insert(StorageKey::wallet(&signer));
        }
    }

    Ok(keys)
}

/// Run `instruction` against the context
pub fn execute(ctx: &mut TxContext<'_>, instruction: &Instruction) -> Result<Outcome> {
    match instruction {
        Instruction::InitializeAccount { owner } => accounts::initialize_account(ctx, *owner),
        Instruction::Deposit { owner, amount } => engine::deposit(ctx, *owner, *amount),
        Instruction::Withdraw { owner, amount } => engine::withdraw(ctx, *owner, *amount),
        Instruction::Transfer { from, to, amount } => engine::transfer(ctx, *from, *to, *amount),
        Instruction::AddFriend { owner, friend } => accounts::add_friend(ctx, *owner, *friend),
        Instruction::RemoveFriend { owner, friend } => {
            accounts::remove_friend(ctx, *owner, *friend)
        }
        Instruction::CreateRequest { recipient, amount } => {
            request::create_request(ctx, *recipient, *amount)
        }
        Instruction::AcceptRequest { request } => request::accept_request(ctx, *request),
        Instruction::DeclineRequest { request } => request::decline_request(ctx, *request),
        Instruction::SendProtected { from, to, amount } => {
            escrow::send_protected(ctx, *from, *to, *amount)
        }
        Instruction::RevokeEscrow { escrow } => escrow::revoke_escrow(ctx, *escrow),
        Instruction::ReleaseEscrow { escrow } => escrow::release_escrow(ctx, *escrow),
    }
}

/// Reject zero amounts
pub fn ensure_positive(amount: u64, action: &str) -> Result<()> {
    if amount == 0 {
        return Err(Error::InvalidAmount(format!("{} amount must be positive", action)));
    }
    Ok(())
}
