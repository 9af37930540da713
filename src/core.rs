//! `GravityCore` ties every component together behind one handle: it
//! bundles the external collaborators, derives the participant's own
//! canonical public key once, and re-exposes each component's
//! operations as methods so a caller doesn't need to thread `fs`,
//! `master_key`, and `self_cpk` through every call site itself.
//!
//! Every public operation suspends on the two readiness barriers before
//! touching the profile tree: the filesystem node being ready, and the
//! crypto library being initialized. Both are one-shot and idempotent —
//! firing one twice, or waiting on an already-fired one, is a no-op.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell as SyncOnceCell;
use tokio::sync::Notify;
use tracing::info;

use crate::contacts::{get_contacts, upsert_contact, ContactRecord, Contacts};
use crate::crypto::SymmetricKey;
use crate::error::{Error, Result};
use crate::fs::{ContentAddressedFs, TreeNode};
use crate::groups::{
    create_group, get_group_info, get_group_key, list_groups, set_nicknames, GroupInfo,
};
use crate::keys::{to_canonical_public_key, CanonicalPublicKey};
use crate::masterkey::{get_master_key, reset_master_key, set_master_key, KeyValueStore};
use crate::node_identity::NodeIdentity;
use crate::publisher::{get_my_profile_hash, get_profile_hash, NameResolver};
use crate::subscribers::{add_subscriber, test_decrypt_all_subscribers, SUBSCRIBERS_DIR};

/// A one-shot, idempotent readiness signal. Firing it after waiters are
/// already parked wakes them; firing it before anyone waits makes every
/// subsequent wait return immediately.
struct Barrier {
    fired: AtomicBool,
    notify: Notify,
}

impl Barrier {
    fn new() -> Self {
        Self {
            fired: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    fn fire(&self) {
        if !self.fired.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    async fn wait(&self) {
        if self.fired.load(Ordering::SeqCst) {
            return;
        }
        let notified = self.notify.notified();
        if self.fired.load(Ordering::SeqCst) {
            return;
        }
        notified.await;
    }
}

/// The external collaborators and optional extras a `GravityCore`
/// instance is built from.
pub struct GravityConfig {
    pub fs: Arc<dyn ContentAddressedFs>,
    pub identity: Arc<dyn NodeIdentity>,
    pub store: Arc<dyn KeyValueStore>,
    pub name_resolver: Option<Arc<dyn NameResolver>>,
    pub fallback_profile_hash: Option<String>,
}

/// Coordinates every component against one set of collaborators.
pub struct GravityCore {
    config: GravityConfig,
    self_cpk: CanonicalPublicKey,
    fs_ready: Barrier,
    crypto_ready: Barrier,
}

impl GravityCore {
    /// Derives and caches `self_cpk` from `config.identity` up front.
    pub async fn new(config: GravityConfig) -> Result<Self> {
        let keys = config.identity.id().await;
        let self_cpk = to_canonical_public_key(&keys.public_key)?;
        Ok(Self {
            config,
            self_cpk,
            fs_ready: Barrier::new(),
            crypto_ready: Barrier::new(),
        })
    }

    pub fn self_cpk(&self) -> &CanonicalPublicKey {
        &self.self_cpk
    }

    /// Signal that the filesystem node is ready. Idempotent.
    pub fn mark_fs_ready(&self) {
        self.fs_ready.fire();
    }

    /// Signal that the crypto library is initialized. Idempotent.
    pub fn mark_crypto_ready(&self) {
        self.crypto_ready.fire();
    }

    /// Suspends until both barriers have fired.
    pub async fn ready(&self) {
        self.fs_ready.wait().await;
        self.crypto_ready.wait().await;
    }

    fn fs(&self) -> &dyn ContentAddressedFs {
        self.config.fs.as_ref()
    }

    async fn master_key(&self) -> Result<SymmetricKey> {
        get_master_key(self.config.store.as_ref()).await
    }

    // -- master key ---------------------------------------------------

    pub async fn get_master_key(&self) -> Result<SymmetricKey> {
        self.ready().await;
        self.master_key().await
    }

    pub async fn set_master_key(&self, key: &SymmetricKey) -> Result<()> {
        self.ready().await;
        set_master_key(self.config.store.as_ref(), key).await
    }

    pub async fn reset_master_key(&self) -> Result<SymmetricKey> {
        self.ready().await;
        reset_master_key(self.config.store.as_ref()).await
    }

    // -- contacts -------------------------------------------------------

    pub async fn get_contacts(&self) -> Result<Contacts> {
        self.ready().await;
        let master_key = self.master_key().await?;
        get_contacts(self.fs(), &master_key).await
    }

    pub async fn upsert_contact(&self, cpk: &str, update: ContactRecord) -> Result<()> {
        self.ready().await;
        let master_key = self.master_key().await?;
        upsert_contact(self.fs(), &master_key, cpk, update).await
    }

    // -- subscriber handshake -------------------------------------------

    pub async fn add_subscriber(&self, peer_key_bytes: &[u8]) -> Result<()> {
        self.ready().await;
        let master_key = self.master_key().await?;
        add_subscriber(self.fs(), &master_key, peer_key_bytes).await
    }

    /// Trial-decrypt every entry under `subscribers_path`, normally a
    /// peer's own `/subscribers` listing rather than this node's own.
    pub async fn test_decrypt_all_subscribers(&self, subscribers_path: &str) -> Result<SymmetricKey> {
        self.ready().await;
        test_decrypt_all_subscribers(self.fs(), self.config.identity.as_ref(), subscribers_path).await
    }

    /// Trial-decrypt this node's own `/subscribers` listing.
    pub async fn test_decrypt_own_subscribers(&self) -> Result<SymmetricKey> {
        self.test_decrypt_all_subscribers(SUBSCRIBERS_DIR).await
    }

    // -- groups -----------------------------------------------------------

    pub async fn create_group(
        &self,
        members: &[CanonicalPublicKey],
        group_id: Option<String>,
    ) -> Result<String> {
        self.ready().await;
        let master_key = self.master_key().await?;
        create_group(self.fs(), &master_key, &self.self_cpk, members, group_id).await
    }

    pub async fn get_group_key(&self, group_b64: &str) -> Result<SymmetricKey> {
        self.ready().await;
        let master_key = self.master_key().await?;
        get_group_key(self.fs(), &master_key, group_b64).await
    }

    pub async fn get_group_info(&self, group_b64: &str) -> Result<GroupInfo> {
        self.ready().await;
        let group_key = self.get_group_key(group_b64).await?;
        get_group_info(self.fs(), &group_key, group_b64).await
    }

    pub async fn set_nicknames(
        &self,
        group_b64: &str,
        nicknames: HashMap<CanonicalPublicKey, String>,
    ) -> Result<()> {
        self.ready().await;
        let master_key = self.master_key().await?;
        set_nicknames(self.fs(), &master_key, &self.self_cpk, group_b64, nicknames).await
    }

    pub async fn list_groups(&self) -> Result<Vec<String>> {
        self.ready().await;
        list_groups(self.fs()).await
    }

    // -- profile publishing ------------------------------------------------

    pub async fn get_my_profile_hash(&self) -> Result<String> {
        self.ready().await;
        get_my_profile_hash(self.fs()).await
    }

    pub async fn get_profile_hash(&self, cpk_pem: &str) -> Result<Option<String>> {
        self.ready().await;
        match &self.config.name_resolver {
            Some(resolver) => {
                get_profile_hash(
                    resolver.as_ref(),
                    cpk_pem,
                    self.config.fallback_profile_hash.as_deref(),
                )
                .await
            }
            None => Ok(self.config.fallback_profile_hash.clone()),
        }
    }

    pub async fn load_profile_tree(&self, path: &str) -> Result<TreeNode> {
        self.ready().await;
        self.fs().load_tree(path).await
    }
}

/// Process-wide singleton, installed once via `initialize`.
static CORE_INSTANCE: SyncOnceCell<Arc<GravityCore>> = SyncOnceCell::new();

impl GravityCore {
    /// Build a `GravityCore` from `config` and install it as the process
    /// singleton. Called once at application startup; a second call
    /// fails with `AlreadyInitialized`.
    pub async fn initialize(config: GravityConfig) -> Result<()> {
        let core = GravityCore::new(config).await?;
        CORE_INSTANCE
            .set(Arc::new(core))
            .map_err(|_| Error::AlreadyInitialized)?;
        info!("gravity core initialized");
        Ok(())
    }

    /// Fetch the process singleton installed by `initialize`.
    pub fn instance() -> Result<Arc<GravityCore>> {
        CORE_INSTANCE.get().cloned().ok_or(Error::NotInitialized)
    }

    /// True once `initialize` has installed the singleton.
    pub fn is_initialized() -> bool {
        CORE_INSTANCE.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;
    use crate::masterkey::InMemoryKeyValueStore;
    use crate::testutil::StaticIdentity;

    fn test_config() -> GravityConfig {
        GravityConfig {
            fs: Arc::new(InMemoryFs::new()),
            identity: Arc::new(StaticIdentity::generate()),
            store: Arc::new(InMemoryKeyValueStore::new()),
            name_resolver: None,
            fallback_profile_hash: None,
        }
    }

    #[tokio::test]
    async fn barrier_wait_returns_immediately_once_fired() {
        let barrier = Barrier::new();
        barrier.fire();
        barrier.wait().await;
    }

    #[test]
    fn barrier_wakes_a_waiter() {
        use tokio_test::{assert_pending, assert_ready};

        let barrier = Barrier::new();
        let mut waiter = tokio_test::task::spawn(barrier.wait());
        assert_pending!(waiter.poll());
        barrier.fire();
        assert!(waiter.is_woken());
        assert_ready!(waiter.poll());
    }

    #[tokio::test]
    async fn master_key_round_trips_through_core() {
        let core = GravityCore::new(test_config()).await.unwrap();
        core.mark_fs_ready();
        core.mark_crypto_ready();
        let key = SymmetricKey::generate();
        core.set_master_key(&key).await.unwrap();
        let fetched = core.get_master_key().await.unwrap();
        assert_eq!(fetched.as_bytes(), key.as_bytes());
    }

    #[tokio::test]
    async fn create_group_and_recover_group_key_through_core() {
        let core = GravityCore::new(test_config()).await.unwrap();
        core.mark_fs_ready();
        core.mark_crypto_ready();
        core.set_master_key(&SymmetricKey::generate()).await.unwrap();

        let peer_identity = StaticIdentity::generate();
        let peer_cpk = to_canonical_public_key(peer_identity.public_key_pem().as_bytes()).unwrap();
        core.upsert_contact(
            peer_cpk.as_pem(),
            ContactRecord {
                my_secret: Some(crate::crypto::b64_url_encode(
                    SymmetricKey::generate().as_bytes(),
                )),
                extra: Default::default(),
            },
        )
        .await
        .unwrap();

        let group_b64 = core.create_group(&[peer_cpk], None).await.unwrap();
        let info = core.get_group_info(&group_b64).await.unwrap();
        assert_eq!(info.members.len(), 2);
    }
}
