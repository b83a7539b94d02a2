//! The connection scheduler: walks the saved networks in priority order,
//! retries, fails over, and re-ranks on success.
//!
//! # State machine
//!
//! ```text
//!               tick: dispatch candidate            AddressAcquired
//! Disconnected ──────────────────────► (attempt) ──────────────────► Connected
//!      ▲  ▲      Disassociated × retry budget │                          │
//!      │  │      AssociationFailed: next      │                          │
//!      │  └───────────────────────────────────┘            Disassociated │
//!      │                                                                 │
//!      │ cool-down elapsed                 rotation walked past the end  │
//!      └──────────────── AllExhausted ◄──────────────────────────────────┘
//! ```
//!
//! The machine is stepped two ways, both serialized by the single scheduler
//! task (see [`spawn_scheduler`]): a periodic [`tick`](ConnectionScheduler::tick)
//! and asynchronous [`RadioEvent`]s from the driver.  The struct itself is
//! plain synchronous code, which keeps every transition directly testable.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::application::credential_store::{CredentialStore, KvStore, StoreError};
use crate::application::radio::{RadioDriver, RadioError, RadioEvent};

/// How many times a candidate is re-tried after a disassociation before the
/// rotation advances to the next saved network.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default period between scheduler ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(3);

/// Default cool-down before a failed rotation is restarted.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30);

/// Namespace for the scheduler's persisted outcome flag.
pub const STATE_NAMESPACE: &str = "wifi_state";

/// Key recording whether the last rotation exhausted all candidates.
pub const CONNECTION_FAILED_KEY: &str = "connection_failed";

/// Error type for scheduler operations invoked from the provisioning surface.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// No saved network with the given SSID.
    #[error("no saved network named {0:?}")]
    NotFound(String),

    /// The credential store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The driver refused the association dispatch.
    #[error(transparent)]
    Radio(#[from] RadioError),
}

/// Tuning knobs for the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Per-candidate retry budget.
    pub max_retries: u32,
    /// Cool-down before restarting an exhausted rotation.  `None` disables
    /// automatic retry entirely: the device parks in `AllExhausted` until an
    /// external reset.
    pub cooldown: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            cooldown: Some(DEFAULT_COOLDOWN),
        }
    }
}

/// Externally visible connection phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    Disconnected,
    Connecting,
    Connected,
    AllExhausted,
}

/// Point-in-time scheduler status for the provisioning surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub phase: ConnectionPhase,
    /// SSID of the current attempt or connection.
    pub ssid: Option<String>,
    /// Acquired station address while connected.
    pub address: Option<Ipv4Addr>,
}

/// Internal link state.  `Connecting` is not a separate variant: an attempt
/// in flight is `Disconnected` with the outstanding flag set, exactly as the
/// rotation logic treats it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    Disconnected,
    Connected,
    AllExhausted { since: Instant },
}

/// The connection scheduler.
pub struct ConnectionScheduler {
    store: Arc<CredentialStore>,
    radio: Arc<dyn RadioDriver>,
    state_kv: Arc<dyn KvStore>,
    config: SchedulerConfig,
    state: LinkState,
    candidate_index: usize,
    retry_count: u32,
    attempt_outstanding: bool,
    current_ssid: Option<String>,
    link_address: Option<Ipv4Addr>,
}

impl ConnectionScheduler {
    /// Creates a scheduler in the `Disconnected` state with the rotation at
    /// the top-ranked candidate.
    pub fn new(
        store: Arc<CredentialStore>,
        radio: Arc<dyn RadioDriver>,
        state_kv: Arc<dyn KvStore>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            radio,
            state_kv,
            config,
            state: LinkState::Disconnected,
            candidate_index: 0,
            retry_count: 0,
            attempt_outstanding: false,
            current_ssid: None,
            link_address: None,
        }
    }

    /// One periodic step of the state machine.
    pub fn tick(&mut self) {
        match self.state {
            LinkState::Connected => {}
            LinkState::AllExhausted { since } => {
                let Some(cooldown) = self.config.cooldown else {
                    // Automatic retry disabled: parked until an external reset.
                    return;
                };
                if since.elapsed() >= cooldown {
                    info!("cool-down elapsed, restarting rotation");
                    self.state = LinkState::Disconnected;
                    self.candidate_index = 0;
                    self.retry_count = 0;
                    self.attempt_outstanding = false;
                }
            }
            LinkState::Disconnected => self.step_rotation(),
        }
    }

    /// Applies one asynchronous driver notification.
    pub fn handle_event(&mut self, event: RadioEvent) {
        match event {
            RadioEvent::Associated => {
                debug!("link associated; awaiting address");
            }
            RadioEvent::AddressAcquired(ip) => {
                info!(address = %ip.address, "address acquired");
                self.state = LinkState::Connected;
                self.retry_count = 0;
                self.candidate_index = 0;
                self.attempt_outstanding = false;
                self.link_address = Some(ip.address);
                if let Some(ssid) = self.current_ssid.clone() {
                    if let Err(e) = self.store.promote(&ssid) {
                        warn!(%ssid, "failed to promote connected network: {e}");
                    }
                }
                self.record_outcome(false);
            }
            RadioEvent::Disassociated { reason_code } => self.on_disassociated(reason_code),
            RadioEvent::AssociationFailed => {
                // Not worth local retries: a refused association will be
                // refused again.  Advance to the next saved network.
                debug!("association failed; advancing to next candidate");
                self.fail_current_candidate();
            }
        }
    }

    /// Clears all retry state and forces `Disconnected`, from any state.
    /// Invoked by the provisioning surface ("retry now").
    pub fn reset(&mut self) {
        info!("retry state reset");
        self.state = LinkState::Disconnected;
        self.candidate_index = 0;
        self.retry_count = 0;
        self.attempt_outstanding = false;
        self.current_ssid = None;
        self.link_address = None;
        self.record_outcome(false);
    }

    /// Jumps straight to the named saved credential, bypassing rotation
    /// order.  The retry budget then applies to that candidate.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NotFound`] if the SSID is not stored, or
    /// the store/driver error that prevented the dispatch.
    pub fn connect_saved(&mut self, ssid: &str) -> Result<(), SchedulerError> {
        let list = self.store.list()?;
        let index = list
            .iter()
            .position(|c| c.ssid == ssid)
            .ok_or_else(|| SchedulerError::NotFound(ssid.to_string()))?;

        self.radio.associate(&list[index].ssid, &list[index].passphrase)?;

        info!(%ssid, "direct connection attempt dispatched");
        self.state = LinkState::Disconnected;
        self.candidate_index = index;
        self.retry_count = 0;
        self.attempt_outstanding = true;
        self.current_ssid = Some(list[index].ssid.clone());
        Ok(())
    }

    /// Current externally visible status.
    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            phase: self.phase(),
            ssid: self.current_ssid.clone(),
            address: self.link_address,
        }
    }

    /// Maps the internal state onto the four-phase view the provisioning UI
    /// needs to tell "idle" from "attempt in flight".
    pub fn phase(&self) -> ConnectionPhase {
        match self.state {
            LinkState::Connected => ConnectionPhase::Connected,
            LinkState::AllExhausted { .. } => ConnectionPhase::AllExhausted,
            LinkState::Disconnected if self.attempt_outstanding => ConnectionPhase::Connecting,
            LinkState::Disconnected => ConnectionPhase::Disconnected,
        }
    }

    // ── Internal transitions ──────────────────────────────────────────────────

    /// The `Disconnected` tick: pick the next candidate and dispatch.
    fn step_rotation(&mut self) {
        if self.attempt_outstanding {
            // Waiting on the driver's verdict for the current attempt.
            return;
        }

        let list = match self.store.list() {
            Ok(list) => list,
            Err(e) => {
                warn!("saved-network list unavailable: {e}");
                return;
            }
        };
        if list.is_empty() {
            // Nothing to try; provisioning is the only way forward.
            return;
        }

        if self.candidate_index >= list.len() {
            info!(candidates = list.len(), "rotation exhausted all saved networks");
            self.state = LinkState::AllExhausted {
                since: Instant::now(),
            };
            self.candidate_index = 0;
            self.retry_count = 0;
            self.record_outcome(true);
            return;
        }

        let candidate = &list[self.candidate_index];
        if candidate.ssid.is_empty() {
            // Store invariants forbid this; skip rather than dispatch garbage.
            self.candidate_index += 1;
            return;
        }

        debug!(
            ssid = %candidate.ssid,
            index = self.candidate_index,
            "dispatching association attempt"
        );
        match self.radio.associate(&candidate.ssid, &candidate.passphrase) {
            Ok(()) => {
                self.attempt_outstanding = true;
                self.current_ssid = Some(candidate.ssid.clone());
            }
            Err(e) => {
                // Instant failure: the driver would not even start.
                warn!(ssid = %candidate.ssid, "association dispatch failed: {e}");
                self.candidate_index += 1;
            }
        }
    }

    fn on_disassociated(&mut self, reason_code: u16) {
        if self.state == LinkState::Connected {
            warn!(reason_code, "link lost; restarting rotation from the top");
            self.state = LinkState::Disconnected;
            self.candidate_index = 0;
            self.retry_count = 0;
            self.attempt_outstanding = false;
            self.current_ssid = None;
            self.link_address = None;
            return;
        }

        if !self.attempt_outstanding {
            // Late event after a stop or reset; nothing to do.
            debug!(reason_code, "disassociation with no attempt outstanding");
            return;
        }

        if self.retry_count < self.config.max_retries {
            self.retry_count += 1;
            debug!(
                reason_code,
                retry = self.retry_count,
                budget = self.config.max_retries,
                "re-issuing current candidate"
            );
            self.retry_current_candidate();
        } else {
            debug!(reason_code, "retry budget exhausted; advancing");
            self.retry_count = 0;
            self.candidate_index += 1;
            self.attempt_outstanding = false;
        }
    }

    /// Re-dispatches the candidate of the outstanding attempt.  Any store or
    /// driver failure here is treated as an immediate association failure.
    fn retry_current_candidate(&mut self) {
        let Some(ssid) = self.current_ssid.clone() else {
            self.fail_current_candidate();
            return;
        };

        let passphrase = match self.store.list() {
            Ok(list) => list.into_iter().find(|c| c.ssid == ssid).map(|c| c.passphrase),
            Err(e) => {
                warn!(%ssid, "store unavailable during retry: {e}");
                None
            }
        };

        match passphrase {
            Some(passphrase) => match self.radio.associate(&ssid, &passphrase) {
                Ok(()) => {
                    self.attempt_outstanding = true;
                }
                Err(e) => {
                    warn!(%ssid, "retry dispatch failed: {e}");
                    self.fail_current_candidate();
                }
            },
            // The credential vanished mid-attempt (removed via provisioning).
            None => self.fail_current_candidate(),
        }
    }

    fn fail_current_candidate(&mut self) {
        self.attempt_outstanding = false;
        self.retry_count = 0;
        self.candidate_index += 1;
    }

    /// Persists the rotation-outcome flag.  Best effort: a device that
    /// cannot record the flag must still keep connecting.
    fn record_outcome(&self, failed: bool) {
        let value = [u8::from(failed)];
        let result = self
            .state_kv
            .set(STATE_NAMESPACE, CONNECTION_FAILED_KEY, &value)
            .and_then(|()| self.state_kv.commit());
        if let Err(e) = result {
            warn!("failed to record rotation outcome: {e}");
        }
    }
}

// ── Scheduler task ────────────────────────────────────────────────────────────

/// Spawns the single task that steps the scheduler.
///
/// Both mutation sources – the periodic tick and the driver's event channel –
/// are multiplexed here, so every transition happens on this task and the
/// serialization requirement holds by construction.  The mutex exists for the
/// provisioning surface, which calls `reset`/`connect_saved` from other tasks.
///
/// The task exits when `running` is cleared (checked at least once per tick
/// period) or when every event sender has been dropped.  Events arriving
/// after the task stops are simply never consumed.
pub fn spawn_scheduler(
    scheduler: Arc<tokio::sync::Mutex<ConnectionScheduler>>,
    mut events: mpsc::UnboundedReceiver<RadioEvent>,
    tick_interval: Duration,
    running: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        // `interval` panics on a zero period; a misconfigured tick still runs.
        let mut ticker = tokio::time::interval(tick_interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if !running.load(Ordering::Relaxed) {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => scheduler.lock().await.tick(),
                event = events.recv() => match event {
                    Some(event) => scheduler.lock().await.handle_event(event),
                    None => break,
                },
            }
        }
        info!("connection scheduler stopped");
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
