//! Per-record write locks
//!
//! A transaction declares every storage key it may write and takes all of
//! them before executing. Keys held by another transaction make the
//! acquisition fail immediately with [`Error::AccountInUse`]; nothing waits.
//! Transactions with disjoint key sets proceed in parallel.

use crate::instruction::TxId;
use crate::types::StorageKey;
use crate::{Error, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Table of held record locks
#[derive(Debug, Default)]
pub struct AccountLocks {
    held: DashMap<StorageKey, TxId>,
}

impl AccountLocks {
    /// Create empty table
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Take every key in `keys` for `holder`, or none of them
    pub fn try_lock(
        self: &Arc<Self>,
        keys: &BTreeSet<StorageKey>,
        holder: TxId,
    ) -> Result<LockGuard> {
        let mut acquired = Vec::with_capacity(keys.len());

        for key in keys {
            match self.held.entry(*key) {
                Entry::Vacant(slot) => {
                    slot.insert(holder);
                    acquired.push(*key);
                }
                Entry::Occupied(slot) => {
                    let owner = *slot.get();
                    drop(slot);
                    for key in &acquired {
                        self.held.remove(key);
                    }
                    tracing::debug!(key = %key, holder = %owner, "Lock conflict");
                    return Err(Error::AccountInUse(format!(
                        "record {} locked by transaction {}",
                        key, owner
                    )));
                }
            }
        }

        Ok(LockGuard {
            locks: Arc::clone(self),
            keys: acquired,
        })
    }

    /// Number of keys currently held
    pub fn held(&self) -> usize {
        self.held.len()
    }
}

/// Releases its keys on drop
#[derive(Debug)]
pub struct LockGuard {
    locks: Arc<AccountLocks>,
    keys: Vec<StorageKey>,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        for key in &self.keys {
            self.locks.held.remove(key);
        }
    }
}
