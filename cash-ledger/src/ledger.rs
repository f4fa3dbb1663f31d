//! Main ledger orchestration layer
//!
//! This module ties together storage, locks, the authorization gate and the
//! instruction processor into one entry point, [`Ledger::submit`].
//!
//! # Example
//!
//! ```no_run
//! use cash_ledger::{Config, Instruction, KeyPair, Ledger, Transaction};
//!
//! fn main() -> cash_ledger::Result<()> {
//!     let ledger = Ledger::open(Config::default())?;
//!     let alice = KeyPair::generate();
//!
//!     ledger.fund_wallet(alice.identity(), 1_000_000_000)?;
//!     let tx = Transaction::new(
//!         alice.identity(),
//!         0,
//!         Instruction::InitializeAccount { owner: alice.identity() },
//!     )
//!     .sign(&alice)?;
//!     let receipt = ledger.submit(&tx)?;
//!     println!("committed {}", receipt.tx_id);
//!     Ok(())
//! }
//! ```

use crate::{
    auth,
    clock::{Clock, SystemClock},
    crypto::hash_bytes,
    instruction::{Receipt, SignedTransaction, TxId},
    locks::AccountLocks,
    metrics::Metrics,
    processor::{self, TxContext},
    storage::{ChangeSet, Storage, StorageStats},
    types::{Account, EscrowEntry, Identity, PaymentRequest, ResolvedEscrow, StorageKey, Wallet},
    Config, Error, Result,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

/// Main ledger interface
///
/// Cheap to clone; clones share storage, locks and metrics.
#[derive(Clone, Debug)]
pub struct Ledger {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    storage: Storage,
    locks: Arc<AccountLocks>,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
    config: Config,
}

impl Ledger {
    /// Open ledger with configuration
    pub fn open(config: Config) -> Result<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    /// Open ledger with an explicit time source
    pub fn open_with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let storage = Storage::open(&config)?;
        let metrics = Metrics::new()?;

        tracing::info!(
            service = %config.service_name,
            data_dir = ?config.data_dir,
            "Ledger opened"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                storage,
                locks: AccountLocks::new(),
                clock,
                metrics,
                config,
            }),
        })
    }

    /// Verify, execute and commit a signed transaction
    ///
    /// Resubmitting a committed transaction returns its stored receipt.
    pub fn submit(&self, signed: &SignedTransaction) -> Result<Receipt> {
        let started = Instant::now();
        let instruction = signed.transaction.instruction.name();
        let result = self.process(signed);

        match &result {
            Ok(receipt) => {
                self.inner
                    .metrics
                    .record_commit(instruction, started.elapsed().as_secs_f64());
                tracing::debug!(tx_id = %receipt.tx_id, instruction, "Transaction committed");
            }
            Err(e) => {
                self.inner.metrics.record_rejection(e.kind());
                match e {
                    Error::Storage(_) | Error::Io(_) => {
                        tracing::error!(
                            instruction,
                            signer = %signed.signer(),
                            error = %e,
                            "Transaction failed"
                        )
                    }
                    _ => {
                        tracing::warn!(
                            instruction,
                            signer = %signed.signer(),
                            error = %e,
                            "Transaction rejected"
                        )
                    }
                }
            }
        }

        result
    }

    fn process(&self, signed: &SignedTransaction) -> Result<Receipt> {
        auth::verify_transaction(signed)?;

        let tx_id = signed.id()?;
        if let Some(receipt) = self.inner.storage.get_receipt(&tx_id)? {
            tracing::debug!(tx_id = %tx_id, "Duplicate submission");
            return Ok(receipt);
        }

        let tx = &signed.transaction;
        let keys = processor::write_set(&self.inner.storage, tx)?;
        let _guard = self.inner.locks.try_lock(&keys, tx_id)?;

        // The first submission may have committed while we computed the write set
        if let Some(receipt) = self.inner.storage.get_receipt(&tx_id)? {
            tracing::debug!(tx_id = %tx_id, "Duplicate submission");
            return Ok(receipt);
        }

        let now = self.inner.clock.now();
        let mut ctx = TxContext::new(&self.inner.storage, &self.inner.config, tx.signer, now);
        let outcome = processor::execute(&mut ctx, &tx.instruction)?;

        let receipt = Receipt {
            tx_id,
            signer: tx.signer,
            outcome,
            committed_at: now,
        };
        let mut changes = ctx.into_changes();
        changes.receipt = Some(receipt.clone());
        self.inner.storage.commit(&changes)?;

        Ok(receipt)
    }

    /// Mint native value into `identity`'s wallet
    ///
    /// Stands in for the world outside the ledger; every minted unit is
    /// added to the recorded supply.
    pub fn fund_wallet(&self, identity: Identity, amount: u64) -> Result<u64> {
        processor::ensure_positive(amount, "fund")?;

        let wallet_key = StorageKey::wallet(&identity);
        let keys: BTreeSet<_> = [wallet_key, StorageKey::supply()].into_iter().collect();
        let mut seed = Vec::with_capacity(48);
        seed.extend_from_slice(b"fund");
        seed.extend_from_slice(identity.as_bytes());
        seed.extend_from_slice(&amount.to_le_bytes());
        let holder = TxId::from_digest(hash_bytes(&seed));
        let _guard = self.inner.locks.try_lock(&keys, holder)?;

        let mut wallet = self
            .inner
            .storage
            .get_wallet(&wallet_key)?
            .unwrap_or_else(|| Wallet::empty(identity));
        wallet.credit(amount)?;
        let supply = self
            .inner
            .storage
            .get_supply()?
            .checked_add(amount)
            .ok_or_else(|| Error::Overflow("total supply".to_string()))?;

        let balance = wallet.balance;
        let mut changes = ChangeSet::default();
        changes.wallets.insert(wallet_key, wallet);
        changes.supply = Some(supply);
        self.inner.storage.commit(&changes)?;

        tracing::info!(identity = %identity, amount, balance, supply, "Wallet funded");
        Ok(balance)
    }

    // Reads

    /// Account of `owner`
    pub fn account(&self, owner: &Identity) -> Result<Account> {
        self.inner
            .storage
            .get_account(&StorageKey::account(owner))?
            .ok_or_else(|| Error::NotFound(format!("account of {}", owner)))
    }

    /// External native balance of `identity`
    pub fn wallet_balance(&self, identity: &Identity) -> Result<u64> {
        Ok(self
            .inner
            .storage
            .get_wallet(&StorageKey::wallet(identity))?
            .map(|wallet| wallet.balance)
            .unwrap_or(0))
    }

    /// Open payment request at `key`
    pub fn request(&self, key: &StorageKey) -> Result<PaymentRequest> {
        self.inner
            .storage
            .get_request(key)?
            .ok_or_else(|| Error::NotFound(format!("payment request {}", key)))
    }

    /// Open requests raised by `requester`, oldest first
    pub fn requests_by(&self, requester: &Identity) -> Result<Vec<PaymentRequest>> {
        let mut requests: Vec<_> = self
            .inner
            .storage
            .requests()?
            .into_iter()
            .filter(|request| &request.sender == requester)
            .collect();
        requests.sort_by_key(|request| request.seq);
        Ok(requests)
    }

    /// Open requests addressed to `recipient`, oldest first
    pub fn requests_for(&self, recipient: &Identity) -> Result<Vec<PaymentRequest>> {
        let mut requests: Vec<_> = self
            .inner
            .storage
            .requests()?
            .into_iter()
            .filter(|request| &request.recipient == recipient)
            .collect();
        requests.sort_by_key(|request| request.created_at);
        Ok(requests)
    }

    /// Holding escrow at `key`
    pub fn escrow(&self, key: &StorageKey) -> Result<EscrowEntry> {
        processor::load_escrow(&self.inner.storage, key)
    }

    /// Holding escrows funded by `sender`, oldest first
    pub fn escrows_by(&self, sender: &Identity) -> Result<Vec<EscrowEntry>> {
        let mut escrows: Vec<_> = self
            .inner
            .storage
            .escrows()?
            .into_iter()
            .filter(|escrow| &escrow.sender == sender)
            .collect();
        escrows.sort_by_key(|escrow| escrow.seq);
        Ok(escrows)
    }

    /// Tombstone of a closed escrow
    pub fn resolved_escrow(&self, key: &StorageKey) -> Result<Option<ResolvedEscrow>> {
        self.inner.storage.get_resolved(key)
    }

    /// Holding escrows matured at `now`, earliest first, at most `limit`
    pub fn escrows_pending_release(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<EscrowEntry>> {
        let mut matured: Vec<_> = self
            .inner
            .storage
            .escrows()?
            .into_iter()
            .filter(|escrow| escrow.is_mature(now))
            .collect();
        matured.sort_by_key(|escrow| escrow.release_time);
        matured.truncate(limit);
        Ok(matured)
    }

    /// Receipt of a committed transaction
    pub fn receipt(&self, tx_id: &TxId) -> Result<Option<Receipt>> {
        self.inner.storage.get_receipt(tx_id)
    }

    /// Totals over one consistent snapshot
    pub fn audit(&self) -> Result<Audit> {
        let snapshot = self.inner.storage.snapshot()?;
        let mut audit = Audit {
            accounts: snapshot.accounts.len(),
            supply: u128::from(snapshot.supply),
            ..Audit::default()
        };

        for account in &snapshot.accounts {
            audit.account_balances += u128::from(account.balance);
            audit.rent_reserves += u128::from(account.rent_reserve);
            audit.total_deposited += u128::from(account.total_deposited);
            audit.total_withdrawn += u128::from(account.total_withdrawn);
        }
        for wallet in &snapshot.wallets {
            audit.wallet_balances += u128::from(wallet.balance);
        }
        for request in &snapshot.requests {
            audit.rent_reserves += u128::from(request.rent_reserve);
        }
        for escrow in &snapshot.escrows {
            audit.escrowed += u128::from(escrow.amount);
            audit.rent_reserves += u128::from(escrow.rent_reserve);
        }

        Ok(audit)
    }

    /// Storage statistics
    pub fn stats(&self) -> Result<StorageStats> {
        self.inner.storage.get_stats()
    }

    /// Current ledger time
    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }
}

/// Ledger-wide totals
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Audit {
    /// Number of accounts
    pub accounts: usize,
    /// Sum of account balances
    pub account_balances: u128,
    /// Sum of amounts held in escrow
    pub escrowed: u128,
    /// Sum of storage deposits of accounts, requests and escrows
    pub rent_reserves: u128,
    /// Sum of wallet balances
    pub wallet_balances: u128,
    /// Sum of per-account deposit totals
    pub total_deposited: u128,
    /// Sum of per-account withdrawal totals
    pub total_withdrawn: u128,
    /// Total minted into wallets
    pub supply: u128,
}

impl Audit {
    /// Value inside the program equals deposits minus withdrawals
    pub fn balances_conserved(&self) -> bool {
        self.total_deposited >= self.total_withdrawn
            && self.account_balances + self.escrowed == self.total_deposited - self.total_withdrawn
    }

    /// Every minted unit sits in exactly one wallet, account, request or escrow
    pub fn supply_conserved(&self) -> bool {
        self.wallet_balances + self.account_balances + self.escrowed + self.rent_reserves
            == self.supply
    }

    /// Both conservation checks hold
    pub fn is_balanced(&self) -> bool {
        self.balances_conserved() && self.supply_conserved()
    }
}
