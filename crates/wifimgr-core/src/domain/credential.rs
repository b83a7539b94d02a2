//! Saved-network credentials and the priority ordering between them.
//!
//! The node remembers a small, fixed number of networks.  Each entry carries
//! two ordering fields:
//!
//! - `success_rank` – a monotonically increasing counter raised every time a
//!   connection through this entry succeeds (and when the entry is freshly
//!   submitted).  Higher rank = tried earlier.  This is the primary key.
//! - `slot_priority` – the insertion ordinal, used only to break rank ties so
//!   that never-yet-connected entries are tried in the order they were added.
//!
//! The SSID bytes are the identity of an entry: re-submitting a credential
//! with an SSID that is already stored replaces the stored payload instead of
//! creating a duplicate.

use serde::Serialize;
use thiserror::Error;

/// Maximum SSID length in bytes (IEEE 802.11 limit).
pub const SSID_MAX_LEN: usize = 32;

/// Maximum passphrase length in bytes (WPA2-PSK limit).
pub const PASSPHRASE_MAX_LEN: usize = 64;

/// Maximum number of saved networks.  Kept deliberately small: the store is
/// a failover list, not a site survey.
pub const MAX_SAVED_NETWORKS: usize = 3;

/// Error type for credential validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    /// The SSID is empty or longer than [`SSID_MAX_LEN`] bytes.
    #[error("ssid must be 1..={SSID_MAX_LEN} bytes, got {0}")]
    InvalidSsid(usize),

    /// The passphrase is longer than [`PASSPHRASE_MAX_LEN`] bytes.
    #[error("passphrase must be at most {PASSPHRASE_MAX_LEN} bytes, got {0}")]
    PassphraseTooLong(usize),
}

/// A single saved network: name, secret, and ranking metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credential {
    /// Network name, at most [`SSID_MAX_LEN`] bytes.  Identity key.
    pub ssid: String,
    /// Pre-shared key, at most [`PASSPHRASE_MAX_LEN`] bytes.  May be empty
    /// for open networks.
    pub passphrase: String,
    /// Success counter; the primary sort key, highest first.
    pub success_rank: u32,
    /// Insertion-order tie-breaker; lower is preferred when ranks are equal.
    pub slot_priority: u32,
    /// Entry validity marker carried in the persisted record.
    pub valid: bool,
}

impl Credential {
    /// Creates a validated credential with rank and priority zeroed.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] if the SSID is empty or over-long, or the
    /// passphrase exceeds its limit.
    pub fn new(ssid: &str, passphrase: &str) -> Result<Self, CredentialError> {
        if ssid.is_empty() || ssid.len() > SSID_MAX_LEN {
            return Err(CredentialError::InvalidSsid(ssid.len()));
        }
        if passphrase.len() > PASSPHRASE_MAX_LEN {
            return Err(CredentialError::PassphraseTooLong(passphrase.len()));
        }
        Ok(Self {
            ssid: ssid.to_string(),
            passphrase: passphrase.to_string(),
            success_rank: 0,
            slot_priority: 0,
            valid: true,
        })
    }
}

/// A bounded, always-sorted sequence of saved networks.
///
/// The set is kept sorted after every mutation, so index 0 is always the
/// next network a connection rotation should try first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialSet {
    entries: Vec<Credential>,
}

impl CredentialSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from already-validated entries (used by the blob decoder)
    /// and sorts them.
    pub fn from_entries(entries: Vec<Credential>) -> Self {
        let mut set = Self { entries };
        set.sort();
        set
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read-only view of the entries in priority order.
    pub fn entries(&self) -> &[Credential] {
        &self.entries
    }

    /// Looks up an entry by SSID.
    pub fn get(&self, ssid: &str) -> Option<&Credential> {
        self.entries.iter().find(|c| c.ssid == ssid)
    }

    /// Inserts or replaces a credential and hands it top priority.
    ///
    /// If an entry with the same SSID exists its payload is replaced; in both
    /// cases the (re-)submitted entry receives `max existing rank + 1`, so it
    /// is tried first on the next rotation.  At capacity the lowest-ranked
    /// entry is evicted to make room.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] for an invalid SSID or passphrase.
    pub fn upsert(&mut self, ssid: &str, passphrase: &str) -> Result<(), CredentialError> {
        let mut cred = Credential::new(ssid, passphrase)?;
        let next_rank = self.max_rank().wrapping_add(1);

        if let Some(existing) = self.entries.iter_mut().find(|c| c.ssid == ssid) {
            existing.passphrase = cred.passphrase;
            existing.success_rank = next_rank;
            existing.valid = true;
            self.sort();
            return Ok(());
        }

        if self.entries.len() >= MAX_SAVED_NETWORKS {
            // The set is sorted, so the lowest-ranked entry is the last one.
            self.entries.pop();
        }

        cred.success_rank = next_rank;
        cred.slot_priority = self.entries.len() as u32;
        self.entries.push(cred);
        self.sort();
        Ok(())
    }

    /// Removes the entry with the given SSID, compacting the sequence.
    ///
    /// Returns whether anything was removed.
    pub fn remove(&mut self, ssid: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|c| c.ssid != ssid);
        before != self.entries.len()
    }

    /// Raises the named entry's rank to `max existing rank + 1` and re-sorts.
    ///
    /// Called by the connection scheduler when a network delivered an
    /// address.  Returns `false` if the SSID is not stored.
    pub fn promote(&mut self, ssid: &str) -> bool {
        let next_rank = self.max_rank().wrapping_add(1);
        match self.entries.iter_mut().find(|c| c.ssid == ssid) {
            Some(entry) => {
                entry.success_rank = next_rank;
                self.sort();
                true
            }
            None => false,
        }
    }

    /// Sorts by rank descending, slot priority ascending.
    fn sort(&mut self) {
        self.entries
            .sort_by_key(|c| (std::cmp::Reverse(c.success_rank), c.slot_priority));
    }

    fn max_rank(&self) -> u32 {
        self.entries.iter().map(|c| c.success_rank).max().unwrap_or(0)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
