//! The persisted, priority-ordered credential store.
//!
//! The store is the single writer of the saved-network record.  It keeps a
//! lazily-loaded in-memory copy of the [`CredentialSet`] and re-persists it –
//! serialize, recompute the integrity tag, write, commit – on every mutation
//! before the mutation is considered committed.
//!
//! # Corruption policy
//!
//! A record that is missing or fails any structural/integrity check loads as
//! an *empty* store: the device must stay bootable with damaged flash, and a
//! half-trusted credential is worse than none.  The two conditions are
//! distinguished for diagnostics via [`LoadOutcome`] but behave identically.
//!
//! # Write-failure policy
//!
//! A failed persist keeps the in-memory mutation (the device keeps operating
//! with it for this boot), leaves the previous committed record intact for
//! the next load, and surfaces the error to the caller.

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, info, warn};

use wifimgr_core::blob::{decode_store, encode_store};
use wifimgr_core::domain::credential::{Credential, CredentialError, CredentialSet};

/// Namespace under which the saved-network record is stored.
pub const STORE_NAMESPACE: &str = "wifi";

/// Key of the saved-network record within [`STORE_NAMESPACE`].
pub const STORE_KEY: &str = "networks";

/// Error type for the raw key-value storage primitive.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The namespace or key does not exist.
    #[error("key {namespace}/{key} not found")]
    NotFound { namespace: String, key: String },

    /// The underlying storage engine failed.
    #[error("storage I/O failure on {namespace}/{key}: {source}")]
    Io {
        namespace: String,
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Namespaced blob storage, the node's only durability primitive.
///
/// Modelled on a flash key-value engine: no multi-key atomicity is assumed,
/// which is why the credential record is a single blob with its own tag.
#[cfg_attr(test, mockall::automock)]
pub trait KvStore: Send + Sync {
    /// Reads the blob stored under `namespace`/`key`.
    fn get(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Writes the blob stored under `namespace`/`key`.
    fn set(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Makes preceding writes durable.
    fn commit(&self) -> Result<(), StorageError>;

    /// Removes `namespace`/`key`.  Removing an absent key is not an error.
    fn erase_key(&self, namespace: &str, key: &str) -> Result<(), StorageError>;
}

/// Error type for credential store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The submitted SSID or passphrase is out of range.
    #[error(transparent)]
    Invalid(#[from] CredentialError),

    /// No saved network with the given SSID.
    #[error("no saved network named {0:?}")]
    NotFound(String),

    /// The storage backend failed; the in-memory state may be ahead of the
    /// persisted record.
    #[error("storage backend failure: {0}")]
    Backend(#[from] StorageError),
}

/// How the most recent load of the persisted record went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Nothing has been loaded yet.
    NotLoaded,
    /// A valid record was decoded.
    Loaded,
    /// No record existed; started empty.
    Missing,
    /// A record existed but failed a structural or integrity check; started
    /// empty.
    Corrupt,
}

struct StoreInner {
    cache: Option<CredentialSet>,
    last_load: LoadOutcome,
}

/// The credential store: cached [`CredentialSet`] over a [`KvStore`] blob.
///
/// Shared between the scheduler (read/promote) and the provisioning surface
/// (read/add/remove); a single mutex serializes all access, and readers get
/// consistent snapshots.
pub struct CredentialStore {
    kv: Arc<dyn KvStore>,
    inner: Mutex<StoreInner>,
}

impl CredentialStore {
    /// Creates a store over the given storage primitive.  Nothing is read
    /// until the first operation needs the record.
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            inner: Mutex::new(StoreInner {
                cache: None,
                last_load: LoadOutcome::NotLoaded,
            }),
        }
    }

    /// Read-only snapshot of the saved networks in priority order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backing storage fails with
    /// anything other than "record absent".
    pub fn list(&self) -> Result<Vec<Credential>, StoreError> {
        let mut inner = self.lock();
        let set = self.loaded(&mut inner)?;
        Ok(set.entries().to_vec())
    }

    /// Inserts or replaces a credential, hands it top priority, and
    /// persists the record.  Returns the resulting snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for out-of-range fields and
    /// [`StoreError::Backend`] if the persist fails (the in-memory mutation
    /// is kept; see the module docs).
    pub fn upsert(&self, ssid: &str, passphrase: &str) -> Result<Vec<Credential>, StoreError> {
        let mut inner = self.lock();
        let set = self.loaded(&mut inner)?;
        set.upsert(ssid, passphrase)?;
        info!(%ssid, networks = set.len(), "saved network stored");
        let snapshot = set.entries().to_vec();
        self.persist(set)?;
        Ok(snapshot)
    }

    /// Deletes the entry with the given SSID and re-persists.  Returns
    /// whether anything was removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the persist or erase fails.
    pub fn remove(&self, ssid: &str) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let set = self.loaded(&mut inner)?;
        if !set.remove(ssid) {
            debug!(%ssid, "remove requested for unknown network");
            return Ok(false);
        }
        info!(%ssid, networks = set.len(), "saved network removed");
        if set.is_empty() {
            self.kv.erase_key(STORE_NAMESPACE, STORE_KEY)?;
            self.kv.commit()?;
        } else {
            self.persist(set)?;
        }
        Ok(true)
    }

    /// Raises the named network to top priority and persists.  Called by
    /// the scheduler when a network delivered an address.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the SSID is not stored, or
    /// [`StoreError::Backend`] if the persist fails.
    pub fn promote(&self, ssid: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let set = self.loaded(&mut inner)?;
        if !set.promote(ssid) {
            return Err(StoreError::NotFound(ssid.to_string()));
        }
        debug!(%ssid, "network promoted to top priority");
        self.persist(set)
    }

    /// Diagnosis of the most recent load attempt.
    pub fn last_load(&self) -> LoadOutcome {
        self.lock().last_load
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        self.inner.lock().expect("credential store mutex poisoned")
    }

    /// Loads the record on first use; later calls return the cache.
    fn loaded<'a>(
        &self,
        inner: &'a mut StoreInner,
    ) -> Result<&'a mut CredentialSet, StoreError> {
        if inner.cache.is_none() {
            let (set, outcome) = match self.kv.get(STORE_NAMESPACE, STORE_KEY) {
                Ok(bytes) => match decode_store(&bytes) {
                    Ok(set) => {
                        info!(networks = set.len(), "saved-network record loaded");
                        (set, LoadOutcome::Loaded)
                    }
                    Err(e) => {
                        warn!("saved-network record corrupt, starting empty: {e}");
                        (CredentialSet::new(), LoadOutcome::Corrupt)
                    }
                },
                Err(StorageError::NotFound { .. }) => {
                    debug!("no saved-network record yet");
                    (CredentialSet::new(), LoadOutcome::Missing)
                }
                Err(e) => return Err(e.into()),
            };
            inner.cache = Some(set);
            inner.last_load = outcome;
        }
        Ok(inner.cache.as_mut().expect("cache populated above"))
    }

    /// Serializes the set, recomputes the tag, writes, and commits.
    fn persist(&self, set: &CredentialSet) -> Result<(), StoreError> {
        let bytes = encode_store(set);
        self.kv.set(STORE_NAMESPACE, STORE_KEY, &bytes)?;
        self.kv.commit()?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
