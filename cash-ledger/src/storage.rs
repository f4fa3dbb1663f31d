//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `accounts` - Ledger accounts (key: derived account key)
//! - `wallets` - External native balances (key: derived wallet key)
//! - `requests` - Open payment requests (key: derived request key)
//! - `escrows` - Holding escrows (key: derived escrow key)
//! - `resolved` - Tombstones of closed escrows (key: escrow key)
//! - `receipts` - Committed transactions (key: tx id)
//! - `meta` - Singletons (total supply)
//!
//! Every mutation goes through [`Storage::commit`], which writes one
//! [`ChangeSet`] as a single `WriteBatch`.

use crate::{
    error::{Error, Result},
    instruction::{Receipt, TxId},
    types::{Account, EscrowEntry, PaymentRequest, ResolvedEscrow, StorageKey, Wallet},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, Snapshot, WriteBatch,
    WriteOptions, DB,
};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

/// Column family names
const CF_ACCOUNTS: &str = "accounts";
const CF_WALLETS: &str = "wallets";
const CF_REQUESTS: &str = "requests";
const CF_ESCROWS: &str = "escrows";
const CF_RESOLVED: &str = "resolved";
const CF_RECEIPTS: &str = "receipts";
const CF_META: &str = "meta";

const META_SUPPLY: &[u8] = b"supply";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: DB,
    sync_writes: bool,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.db.path())
            .field("sync_writes", &self.sync_writes)
            .finish()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_WALLETS, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_REQUESTS, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_ESCROWS, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_RESOLVED, Self::cf_options_history()),
            ColumnFamilyDescriptor::new(CF_RECEIPTS, Self::cf_options_history()),
            ColumnFamilyDescriptor::new(CF_META, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened RocksDB");

        Ok(Self {
            db,
            sync_writes: config.rocksdb.sync_writes,
        })
    }

    // Column family options

    fn cf_options_records() -> Options {
        let mut opts = Options::default();
        // Hot point lookups on every transaction
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_options_history() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    // Helper: get column family handle

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn get<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf_handle(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf_handle(cf_name)?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            records.push(bincode::deserialize(&value)?);
        }
        Ok(records)
    }

    fn scan_snapshot<T: DeserializeOwned>(
        snapshot: &Snapshot<'_>,
        cf: &ColumnFamily,
    ) -> Result<Vec<T>> {
        let mut records = Vec::new();
        for item in snapshot.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            records.push(bincode::deserialize(&value)?);
        }
        Ok(records)
    }

    // Point reads

    /// Get account by key
    pub fn get_account(&self, key: &StorageKey) -> Result<Option<Account>> {
        self.get(CF_ACCOUNTS, key.as_bytes())
    }

    /// Get wallet by key
    pub fn get_wallet(&self, key: &StorageKey) -> Result<Option<Wallet>> {
        self.get(CF_WALLETS, key.as_bytes())
    }

    /// Get open payment request by key
    pub fn get_request(&self, key: &StorageKey) -> Result<Option<PaymentRequest>> {
        self.get(CF_REQUESTS, key.as_bytes())
    }

    /// Get holding escrow by key
    pub fn get_escrow(&self, key: &StorageKey) -> Result<Option<EscrowEntry>> {
        self.get(CF_ESCROWS, key.as_bytes())
    }

    /// Get tombstone of a closed escrow
    pub fn get_resolved(&self, key: &StorageKey) -> Result<Option<ResolvedEscrow>> {
        self.get(CF_RESOLVED, key.as_bytes())
    }

    /// Get receipt of a committed transaction
    pub fn get_receipt(&self, tx_id: &TxId) -> Result<Option<Receipt>> {
        self.get(CF_RECEIPTS, tx_id.as_bytes())
    }

    /// Total native value ever minted into wallets
    pub fn get_supply(&self) -> Result<u64> {
        Ok(self.get(CF_META, META_SUPPLY)?.unwrap_or(0))
    }

    // Scans

    /// All open payment requests
    pub fn requests(&self) -> Result<Vec<PaymentRequest>> {
        self.scan(CF_REQUESTS)
    }

    /// All holding escrows
    pub fn escrows(&self) -> Result<Vec<EscrowEntry>> {
        self.scan(CF_ESCROWS)
    }

    /// Consistent view of every balance-bearing record
    pub fn snapshot(&self) -> Result<LedgerSnapshot> {
        let snapshot = self.db.snapshot();

        let accounts = Self::scan_snapshot(&snapshot, self.cf_handle(CF_ACCOUNTS)?)?;
        let wallets = Self::scan_snapshot(&snapshot, self.cf_handle(CF_WALLETS)?)?;
        let requests = Self::scan_snapshot(&snapshot, self.cf_handle(CF_REQUESTS)?)?;
        let escrows = Self::scan_snapshot(&snapshot, self.cf_handle(CF_ESCROWS)?)?;

        let supply = match snapshot.get_cf(self.cf_handle(CF_META)?, META_SUPPLY)? {
            Some(value) => bincode::deserialize(&value)?,
            None => 0,
        };

        Ok(LedgerSnapshot {
            accounts,
            wallets,
            requests,
            escrows,
            supply,
        })
    }

    // Batch operations (atomic)

    /// Write a change set in one atomic batch
    pub fn commit(&self, changes: &ChangeSet) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        for (key, account) in &changes.accounts {
            batch.put_cf(cf_accounts, key.as_bytes(), bincode::serialize(account)?);
        }

        let cf_wallets = self.cf_handle(CF_WALLETS)?;
        for (key, wallet) in &changes.wallets {
            batch.put_cf(cf_wallets, key.as_bytes(), bincode::serialize(wallet)?);
        }

        let cf_requests = self.cf_handle(CF_REQUESTS)?;
        for (key, request) in &changes.requests {
            match request {
                Some(request) => {
                    batch.put_cf(cf_requests, key.as_bytes(), bincode::serialize(request)?)
                }
                None => batch.delete_cf(cf_requests, key.as_bytes()),
            }
        }

        let cf_escrows = self.cf_handle(CF_ESCROWS)?;
        for (key, escrow) in &changes.escrows {
            match escrow {
                Some(escrow) => {
                    batch.put_cf(cf_escrows, key.as_bytes(), bincode::serialize(escrow)?)
                }
                None => batch.delete_cf(cf_escrows, key.as_bytes()),
            }
        }

        let cf_resolved = self.cf_handle(CF_RESOLVED)?;
        for (key, tombstone) in &changes.resolved {
            batch.put_cf(cf_resolved, key.as_bytes(), bincode::serialize(tombstone)?);
        }

        if let Some(receipt) = &changes.receipt {
            let cf_receipts = self.cf_handle(CF_RECEIPTS)?;
            batch.put_cf(
                cf_receipts,
                receipt.tx_id.as_bytes(),
                bincode::serialize(receipt)?,
            );
        }

        if let Some(supply) = changes.supply {
            let cf_meta = self.cf_handle(CF_META)?;
            batch.put_cf(cf_meta, META_SUPPLY, bincode::serialize(&supply)?);
        }

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.sync_writes);
        self.db.write_opt(batch, &write_opts)?;

        Ok(())
    }

    // Statistics

    /// Get storage statistics
    pub fn get_stats(&self) -> Result<StorageStats> {
        Ok(StorageStats {
            accounts: self.approximate_count(CF_ACCOUNTS)?,
            open_requests: self.approximate_count(CF_REQUESTS)?,
            holding_escrows: self.approximate_count(CF_ESCROWS)?,
            receipts: self.approximate_count(CF_RECEIPTS)?,
        })
    }

    fn approximate_count(&self, cf_name: &str) -> Result<u64> {
        let cf = self.cf_handle(cf_name)?;
        let prop = self
            .db
            .property_int_value_cf(cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0);

        Ok(prop)
    }
}

/// Staged writes of one transaction
#[derive(Debug, Default, Clone)]
pub struct ChangeSet {
    /// Accounts to put
    pub accounts: BTreeMap<StorageKey, Account>,
    /// Wallets to put
    pub wallets: BTreeMap<StorageKey, Wallet>,
    /// Requests to put (`Some`) or delete (`None`)
    pub requests: BTreeMap<StorageKey, Option<PaymentRequest>>,
    /// Escrows to put (`Some`) or delete (`None`)
    pub escrows: BTreeMap<StorageKey, Option<EscrowEntry>>,
    /// Tombstones to write
    pub resolved: BTreeMap<StorageKey, ResolvedEscrow>,
    /// Receipt of the committing transaction
    pub receipt: Option<Receipt>,
    /// New total supply
    pub supply: Option<u64>,
}

/// Every balance-bearing record read from one snapshot
#[derive(Debug, Clone, Default)]
pub struct LedgerSnapshot {
    /// Ledger accounts
    pub accounts: Vec<Account>,
    /// Wallets
    pub wallets: Vec<Wallet>,
    /// Open payment requests
    pub requests: Vec<PaymentRequest>,
    /// Holding escrows
    pub escrows: Vec<EscrowEntry>,
    /// Total minted
    pub supply: u64,
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    /// Approximate number of accounts
    pub accounts: u64,
    /// Approximate number of open requests
    pub open_requests: u64,
    /// Approximate number of holding escrows
    pub holding_escrows: u64,
    /// Approximate number of receipts
    pub receipts: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EscrowStatus, Identity};
    use chrono::Utc;
    use tempfile::TempDir;

    fn test_config() -> (Config, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        config.rocksdb.sync_writes = false;
        (config, temp_dir)
    }

    fn test_account(byte: u8) -> Account {
        let mut account = Account::new(Identity::new([byte; 32]), 100, Utc::now());
        account.balance = 500;
        account
    }

    fn test_escrow(sender: Identity) -> EscrowEntry {
        let now = Utc::now();
        EscrowEntry {
            key: StorageKey::escrow(&sender, 0),
            seq: 0,
            sender,
            recipient: Identity::new([7u8; 32]),
            amount: 50,
            rent_reserve: 10,
            created_at: now,
            release_time: now,
            status: EscrowStatus::Holding,
        }
    }

    #[test]
    fn test_storage_open() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();
        assert!(storage.db.cf_handle(CF_ACCOUNTS).is_some());
        assert!(storage.db.cf_handle(CF_RECEIPTS).is_some());
        assert_eq!(storage.get_supply().unwrap(), 0);
    }

    #[test]
    fn test_commit_and_get_account() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let account = test_account(1);
        let mut changes = ChangeSet::default();
        changes.accounts.insert(account.key(), account.clone());
        changes.supply = Some(600);
        storage.commit(&changes).unwrap();

        let retrieved = storage.get_account(&account.key()).unwrap().unwrap();
        assert_eq!(retrieved, account);
        assert_eq!(storage.get_supply().unwrap(), 600);
        assert!(storage
            .get_account(&StorageKey::account(&Identity::new([2u8; 32])))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_commit_deletes_escrow_and_writes_tombstone() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let escrow = test_escrow(Identity::new([1u8; 32]));
        let mut open = ChangeSet::default();
        open.escrows.insert(escrow.key, Some(escrow.clone()));
        storage.commit(&open).unwrap();
        assert_eq!(storage.escrows().unwrap().len(), 1);

        let mut close = ChangeSet::default();
        close.escrows.insert(escrow.key, None);
        close.resolved.insert(
            escrow.key,
            ResolvedEscrow {
                key: escrow.key,
                status: EscrowStatus::Revoked,
                amount: escrow.amount,
                resolved_by: escrow.sender,
                resolved_at: Utc::now(),
            },
        );
        storage.commit(&close).unwrap();

        assert!(storage.get_escrow(&escrow.key).unwrap().is_none());
        let tombstone = storage.get_resolved(&escrow.key).unwrap().unwrap();
        assert_eq!(tombstone.status, EscrowStatus::Revoked);
    }

    #[test]
    fn test_snapshot_collects_all_records() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let mut changes = ChangeSet::default();
        for byte in 1..=3 {
            let account = test_account(byte);
            changes.accounts.insert(account.key(), account);
        }
        let owner = Identity::new([9u8; 32]);
        changes.wallets.insert(
            StorageKey::wallet(&owner),
            Wallet {
                owner,
                balance: 42,
            },
        );
        storage.commit(&changes).unwrap();

        let snapshot = storage.snapshot().unwrap();
        assert_eq!(snapshot.accounts.len(), 3);
        assert_eq!(snapshot.wallets.len(), 1);
        assert!(snapshot.requests.is_empty());
        assert_eq!(snapshot.supply, 0);
    }
}
