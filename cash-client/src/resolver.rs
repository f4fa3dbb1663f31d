//! Human-readable handle resolution
//!
//! The ledger only knows identities. Handles such as `alice.cash` are
//! resolved before anything is signed, so an unknown handle never reaches
//! the ledger.

use crate::error::{ClientError, Result};
use async_trait::async_trait;
use cash_ledger::Identity;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Maps handles to identities and back
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Identity registered for `name`
    async fn resolve(&self, name: &str) -> Result<Identity>;

    /// Handle registered for `identity`, if any
    async fn reverse(&self, identity: &Identity) -> Result<Option<String>>;
}

/// In-memory handle directory
#[derive(Debug, Default)]
pub struct Directory {
    by_name: DashMap<String, Identity>,
    by_identity: DashMap<Identity, String>,
}

impl Directory {
    /// Create empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` for `identity`
    ///
    /// Re-registering the same pair is accepted; a name held by another
    /// identity is not.
    pub fn register(&self, name: &str, identity: Identity) -> Result<()> {
        let name = normalize(name)?;
        match self.by_name.entry(name.clone()) {
            Entry::Occupied(slot) => {
                if *slot.get() != identity {
                    return Err(ClientError::NameTaken(name));
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(identity);
                self.by_identity.insert(identity, name.clone());
                tracing::debug!(name = %name, identity = %identity, "Handle registered");
            }
        }
        Ok(())
    }

    /// Number of registered handles
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether no handle is registered
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[async_trait]
impl IdentityResolver for Directory {
    async fn resolve(&self, name: &str) -> Result<Identity> {
        let key = normalize(name)?;
        self.by_name
            .get(&key)
            .map(|entry| *entry.value())
            .ok_or(ClientError::NameNotFound(key))
    }

    async fn reverse(&self, identity: &Identity) -> Result<Option<String>> {
        Ok(self
            .by_identity
            .get(identity)
            .map(|entry| entry.value().clone()))
    }
}

/// Trim, drop a leading `@` and lowercase
fn normalize(name: &str) -> Result<String> {
    let name = name.trim();
    let name = name.strip_prefix('@').unwrap_or(name);
    if name.is_empty() {
        return Err(ClientError::NameNotFound(String::new()));
    }
    Ok(name.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_and_reverse() {
        let directory = Directory::new();
        let alice = Identity::new([1u8; 32]);
        directory.register("Alice.cash", alice).unwrap();

        assert_eq!(directory.resolve("alice.cash").await.unwrap(), alice);
        assert_eq!(directory.resolve("@ALICE.cash ").await.unwrap(), alice);
        assert_eq!(
            directory.reverse(&alice).await.unwrap(),
            Some("alice.cash".to_string())
        );
    }

    #[tokio::test]
    async fn test_unknown_name() {
        let directory = Directory::new();
        let err = directory.resolve("nobody.cash").await.unwrap_err();
        assert!(matches!(err, ClientError::NameNotFound(name) if name == "nobody.cash"));
        assert_eq!(directory.reverse(&Identity::new([9u8; 32])).await.unwrap(), None);
    }

    #[test]
    fn test_name_taken() {
        let directory = Directory::new();
        let alice = Identity::new([1u8; 32]);
        directory.register("alice", alice).unwrap();
        directory.register("alice", alice).unwrap();

        let err = directory
            .register("ALICE", Identity::new([2u8; 32]))
            .unwrap_err();
        assert!(matches!(err, ClientError::NameTaken(_)));
        assert_eq!(directory.len(), 1);
    }
}
