//! Mock radio driver for unit testing and headless runs.
//!
//! # Why a mock driver?
//!
//! The real driver talks to WiFi hardware that:
//!
//! - Does not exist on a development host or CI machine.
//! - Delivers its verdicts asynchronously through the platform event loop.
//! - Cannot be told which association attempts to fail.
//!
//! `MockRadioDriver` replaces the hardware with in-memory recording plus a
//! scripted outcome plan.  Each `associate` call is logged and consumes the
//! next planned [`AssociateOutcome`]; the events that outcome implies are
//! either forwarded into an attached channel (driving a live scheduler task)
//! or queued for the test to drain and feed to the machine by hand.
//!
//! With an empty plan, `associate` accepts the dispatch and produces no
//! events – the attempt just stays pending, which is exactly what a test
//! asserting "no re-dispatch while an attempt is outstanding" needs.

use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::application::radio::{IpInfo, RadioDriver, RadioError, RadioEvent, ScanNetwork};

/// Scripted verdict for one `associate` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociateOutcome {
    /// The dispatch itself is rejected (synchronous failure).
    Reject,
    /// Dispatch accepted, then the association fails outright.
    Fail,
    /// Dispatch accepted, then the link drops with the given reason code.
    Drop { reason_code: u16 },
    /// Dispatch accepted, link comes up, and the given address is acquired.
    Acquire(Ipv4Addr),
}

/// A driver that records all calls and plays back scripted outcomes.
#[derive(Default)]
pub struct MockRadioDriver {
    /// Records each (ssid, passphrase) pair passed to `associate`.
    associate_log: Mutex<Vec<(String, String)>>,
    /// Outcomes consumed front-to-back by successive `associate` calls.
    plan: Mutex<VecDeque<AssociateOutcome>>,
    /// Events produced by planned outcomes, when no channel is attached.
    pending: Mutex<VecDeque<RadioEvent>>,
    /// Optional live channel into a scheduler task.
    events_tx: Mutex<Option<mpsc::UnboundedSender<RadioEvent>>>,
    /// Returned by `scan`.
    scan_results: Mutex<Vec<ScanNetwork>>,
    /// Returned by `link_quality`.
    link_quality: Mutex<Option<i8>>,
}

impl MockRadioDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an outcome to the script.
    pub fn plan(&self, outcome: AssociateOutcome) {
        self.plan.lock().unwrap().push_back(outcome);
    }

    /// Routes future events into `tx` instead of the internal queue.
    pub fn attach_events(&self, tx: mpsc::UnboundedSender<RadioEvent>) {
        *self.events_tx.lock().unwrap() = Some(tx);
    }

    /// Drains the internally queued events (no channel attached).
    pub fn drain_events(&self) -> Vec<RadioEvent> {
        self.pending.lock().unwrap().drain(..).collect()
    }

    /// Snapshot of all recorded `associate` calls.
    pub fn associate_calls(&self) -> Vec<(String, String)> {
        self.associate_log.lock().unwrap().clone()
    }

    /// Sets the fixed result of future `scan` calls.
    pub fn set_scan_results(&self, networks: Vec<ScanNetwork>) {
        *self.scan_results.lock().unwrap() = networks;
    }

    /// Sets the signal strength reported for the current link.
    pub fn set_link_quality(&self, dbm: Option<i8>) {
        *self.link_quality.lock().unwrap() = dbm;
    }

    fn emit(&self, event: RadioEvent) {
        if let Some(tx) = self.events_tx.lock().unwrap().as_ref() {
            // The receiver may already be gone after a scheduler stop; late
            // events are dropped by design.
            let _ = tx.send(event);
        } else {
            self.pending.lock().unwrap().push_back(event);
        }
    }
}

impl RadioDriver for MockRadioDriver {
    fn scan(&self) -> Result<Vec<ScanNetwork>, RadioError> {
        Ok(self.scan_results.lock().unwrap().clone())
    }

    fn associate(&self, ssid: &str, passphrase: &str) -> Result<(), RadioError> {
        self.associate_log
            .lock()
            .unwrap()
            .push((ssid.to_string(), passphrase.to_string()));

        let outcome = self.plan.lock().unwrap().pop_front();
        match outcome {
            Some(AssociateOutcome::Reject) => {
                Err(RadioError::Dispatch(format!("scripted rejection of {ssid:?}")))
            }
            Some(AssociateOutcome::Fail) => {
                self.emit(RadioEvent::AssociationFailed);
                Ok(())
            }
            Some(AssociateOutcome::Drop { reason_code }) => {
                self.emit(RadioEvent::Disassociated { reason_code });
                Ok(())
            }
            Some(AssociateOutcome::Acquire(address)) => {
                self.emit(RadioEvent::Associated);
                self.emit(RadioEvent::AddressAcquired(IpInfo {
                    address,
                    netmask: Ipv4Addr::new(255, 255, 255, 0),
                    gateway: Ipv4Addr::new(
                        address.octets()[0],
                        address.octets()[1],
                        address.octets()[2],
                        1,
                    ),
                }));
                Ok(())
            }
            // No script: accept the dispatch and leave the attempt pending.
            None => Ok(()),
        }
    }

    fn disassociate(&self) -> Result<(), RadioError> {
        Ok(())
    }

    fn link_quality(&self) -> Option<i8> {
        *self.link_quality.lock().unwrap()
    }
}
