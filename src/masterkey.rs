//! The master key: a 256-bit AEAD key with process lifetime, held in an
//! injected key-value store under a single opaque literal key. Never
//! auto-generated — absence is `NoMasterKey`, surfaced to the caller
//! rather than silently papered over.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::crypto::{b64_url_decode, b64_url_encode, SymmetricKey};
use crate::error::{Error, Result};

/// The storage key the master key is filed under in the external store.
pub const MASTER_KEY_STORAGE_KEY: &str = "gravity-master-key";

/// The external key-value store collaborator. Implemented by the host
/// application (a local secure-storage layer); this crate only reads and
/// writes the single `gravity-master-key` entry.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: String);
    async fn delete(&self, key: &str);
}

/// In-memory `KeyValueStore`, used by tests.
#[derive(Default)]
pub struct InMemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    async fn set(&self, key: &str, value: String) {
        self.entries.write().insert(key.to_string(), value);
    }

    async fn delete(&self, key: &str) {
        self.entries.write().remove(key);
    }
}

/// `get_master_key`/`set_master_key`/`reset_master_key` against an
/// injected `KeyValueStore`.
pub async fn get_master_key(store: &dyn KeyValueStore) -> Result<SymmetricKey> {
    let raw = store
        .get(MASTER_KEY_STORAGE_KEY)
        .await
        .ok_or(Error::NoMasterKey)?;
    let bytes = b64_url_decode(&raw)?;
    let bytes: [u8; crate::crypto::KEY_SIZE] =
        bytes.try_into().map_err(|_| Error::NoMasterKey)?;
    Ok(SymmetricKey::from_bytes(bytes))
}

pub async fn set_master_key(store: &dyn KeyValueStore, key: &SymmetricKey) -> Result<()> {
    let encoded = b64_url_encode(key.as_bytes());
    store.set(MASTER_KEY_STORAGE_KEY, encoded).await;
    Ok(())
}

/// Generate a fresh 256-bit key, persist it, and return it. The only
/// spec-sanctioned way to bootstrap `M` — there is no auto-generation on
/// a first `get_master_key`.
pub async fn reset_master_key(store: &dyn KeyValueStore) -> Result<SymmetricKey> {
    let key = SymmetricKey::generate();
    set_master_key(store, &key).await?;
    Ok(key)
}
