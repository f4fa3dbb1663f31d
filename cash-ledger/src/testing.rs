//! Unit test fixtures

use crate::config::Config;
use crate::processor::TxContext;
use crate::storage::{ChangeSet, Storage};
use crate::types::{Account, Identity, StorageKey, Wallet};
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

pub(crate) fn identity(byte: u8) -> Identity {
    Identity::new([byte; 32])
}

/// Storage in a temp dir with cheap rent and a fixed clock
pub(crate) struct Fixture {
    pub storage: Storage,
    pub config: Config,
    pub now: DateTime<Utc>,
    _temp: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp.path().to_path_buf();
        config.rocksdb.sync_writes = false;
        config.rent.overhead_bytes = 0;
        config.rent.per_byte = 1;
        config.accounts.max_friends = 2;
        config.escrow.hold_secs = 60;

        let storage = Storage::open(&config).unwrap();
        Self {
            storage,
            config,
            now: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            _temp: temp,
        }
    }

    pub fn ctx(&self, signer: Identity) -> TxContext<'_> {
        TxContext::new(&self.storage, &self.config, signer, self.now)
    }

    pub fn apply(&self, ctx: TxContext<'_>) {
        self.storage.commit(&ctx.into_changes()).unwrap();
    }

    pub fn fund(&self, owner: Identity, balance: u64) {
        let mut changes = ChangeSet::default();
        changes
            .wallets
            .insert(StorageKey::wallet(&owner), Wallet { owner, balance });
        self.storage.commit(&changes).unwrap();
    }

    pub fn open_account(&self, owner: Identity, balance: u64) -> Account {
        let rent = self
            .config
            .rent
            .minimum_for(Account::space(self.config.accounts.max_friends));
        let mut account = Account::new(owner, rent, self.now);
        account.balance = balance;
        account.total_deposited = balance;

        let mut changes = ChangeSet::default();
        changes.accounts.insert(account.key(), account.clone());
        self.storage.commit(&changes).unwrap();
        account
    }

    pub fn account(&self, owner: &Identity) -> Account {
        self.storage
            .get_account(&StorageKey::account(owner))
            .unwrap()
            .unwrap()
    }

    pub fn wallet_balance(&self, owner: &Identity) -> u64 {
        self.storage
            .get_wallet(&StorageKey::wallet(owner))
            .unwrap()
            .map(|wallet| wallet.balance)
            .unwrap_or(0)
    }
}
