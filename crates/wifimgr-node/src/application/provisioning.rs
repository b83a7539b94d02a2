//! The provisioning surface: what the configuration page can do.
//!
//! The external HTTP layer (out of scope for this repository) terminates the
//! browser connection, parses bodies, and renders JSON; everything it can
//! actually *do* is a plain method on [`ProvisioningService`].  The DTOs
//! derive `Serialize` so that layer can hand them straight to its encoder.
//!
//! Status reporting deliberately distinguishes three situations that would
//! otherwise look identical to an uninformed caller: "no saved networks"
//! (`saved_networks == 0`), "all saved networks failed" (`AllExhausted`),
//! and "connected".

use std::net::Ipv4Addr;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::application::credential_store::{CredentialStore, StoreError};
use crate::application::radio::{RadioDriver, RadioError, ScanNetwork};
use crate::application::scheduler::{ConnectionPhase, ConnectionScheduler, SchedulerError};

/// Error type for provisioning operations.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Radio(#[from] RadioError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// One saved network as presented to the configuration page.  The
/// passphrase is intentionally never echoed back out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedNetwork {
    pub ssid: String,
    pub success_rank: u32,
    pub slot_priority: u32,
}

/// Current node status for the configuration page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeStatus {
    pub phase: ConnectionPhase,
    /// SSID of the current attempt or connection.
    pub ssid: Option<String>,
    /// Station address while connected.
    pub address: Option<Ipv4Addr>,
    /// Link signal strength in dBm while connected.
    pub signal: Option<i8>,
    /// Number of saved networks, so "nothing saved" is distinguishable from
    /// "everything failed".
    pub saved_networks: usize,
}

/// Facade over the store, the radio, and the scheduler.
pub struct ProvisioningService {
    store: Arc<CredentialStore>,
    radio: Arc<dyn RadioDriver>,
    scheduler: Arc<tokio::sync::Mutex<ConnectionScheduler>>,
}

impl ProvisioningService {
    pub fn new(
        store: Arc<CredentialStore>,
        radio: Arc<dyn RadioDriver>,
        scheduler: Arc<tokio::sync::Mutex<ConnectionScheduler>>,
    ) -> Self {
        Self {
            store,
            radio,
            scheduler,
        }
    }

    /// Triggers a scan for nearby networks.
    pub fn scan(&self) -> Result<Vec<ScanNetwork>, ProvisioningError> {
        Ok(self.radio.scan()?)
    }

    /// Lists the saved networks in priority order.
    pub fn saved_networks(&self) -> Result<Vec<SavedNetwork>, ProvisioningError> {
        let list = self.store.list()?;
        Ok(list
            .into_iter()
            .map(|c| SavedNetwork {
                ssid: c.ssid,
                success_rank: c.success_rank,
                slot_priority: c.slot_priority,
            })
            .collect())
    }

    /// Saves (or replaces) a credential and restarts the rotation so the new
    /// network – now top-ranked – is tried on the next tick.
    pub async fn add_network(
        &self,
        ssid: &str,
        passphrase: &str,
    ) -> Result<Vec<SavedNetwork>, ProvisioningError> {
        self.store.upsert(ssid, passphrase)?;
        info!(%ssid, "network saved via provisioning");
        self.scheduler.lock().await.reset();
        self.saved_networks()
    }

    /// Deletes a saved network.  Returns whether anything was removed.
    pub fn remove_network(&self, ssid: &str) -> Result<bool, ProvisioningError> {
        Ok(self.store.remove(ssid)?)
    }

    /// Connects to a specific saved network immediately, bypassing rotation
    /// order.
    pub async fn connect_saved(&self, ssid: &str) -> Result<(), ProvisioningError> {
        Ok(self.scheduler.lock().await.connect_saved(ssid)?)
    }

    /// Clears the retry state unconditionally ("retry now").
    pub async fn reset_retry(&self) {
        self.scheduler.lock().await.reset();
    }

    /// Current status snapshot.
    pub async fn status(&self) -> Result<NodeStatus, ProvisioningError> {
        let scheduler_status = self.scheduler.lock().await.status();
        let signal = match scheduler_status.phase {
            ConnectionPhase::Connected => self.radio.link_quality(),
            _ => None,
        };
        Ok(NodeStatus {
            phase: scheduler_status.phase,
            ssid: scheduler_status.ssid,
            address: scheduler_status.address,
            signal,
            saved_networks: self.store.list()?.len(),
        })
    }
}
