//! Persistent storage traits for the long-term key pair and the most
//! recent share/group descriptor pair, plus an in-memory implementation
//! for tests and the `beacon-testkit` harness. The storage engine itself
//! (database, filesystem) is an external collaborator.

use async_trait::async_trait;
use beacon_core::Result;
use beacon_crypto::LongTermKeyPair;
use tokio::sync::Mutex;

use crate::group::GroupDescriptor;

/// The persisted outcome of a completed DKG/reshare: a share plus the
/// group descriptor it belongs to, saved atomically.
#[derive(Clone)]
pub struct SharePersistence {
    pub share: Vec<u8>,
    pub group: GroupDescriptor,
}

/// Long-term identity key storage. Created externally once; never
/// rotated by this crate.
#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn load(&self) -> Result<LongTermKeyPair>;
}

/// Most-recent share and group descriptor storage.
#[async_trait]
pub trait ShareStore: Send + Sync {
    /// Atomically replace the persisted share and group descriptor.
    async fn put(&self, persistence: SharePersistence) -> Result<()>;
    async fn get(&self) -> Result<Option<SharePersistence>>;
}

/// In-memory `KeyStore` backed by a fixed keypair, for tests.
pub struct MemoryKeyStore {
    key_pair: LongTermKeyPair,
}

impl MemoryKeyStore {
    pub fn new(key_pair: LongTermKeyPair) -> Self {
        Self { key_pair }
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn load(&self) -> Result<LongTermKeyPair> {
        Ok(self.key_pair.clone())
    }
}

/// In-memory `ShareStore`, for tests and the `beacon-testkit` harness.
#[derive(Default)]
pub struct MemoryShareStore {
    slot: Mutex<Option<SharePersistence>>,
}

impl MemoryShareStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ShareStore for MemoryShareStore {
    async fn put(&self, persistence: SharePersistence) -> Result<()> {
        *self.slot.lock().await = Some(persistence);
        Ok(())
    }

    async fn get(&self) -> Result<Option<SharePersistence>> {
        Ok(self.slot.lock().await.clone())
    }
}

/// Convenience accessor used by status endpoints (C8): whether any DKG
/// has ever completed on this node.
pub async fn has_completed_dkg(store: &dyn ShareStore) -> Result<bool> {
    Ok(store.get().await?.is_some())
}
