//! The radio driver seam.
//!
//! The node never talks to WiFi hardware directly: the surrounding firmware
//! supplies an implementation of [`RadioDriver`] and forwards the radio
//! subsystem's asynchronous notifications as [`RadioEvent`]s into the
//! scheduler's event channel.  `associate` is an immediate accept/reject of
//! the *dispatch* only – the actual outcome of an association attempt always
//! arrives later as an event.
//!
//! Mode selection (simultaneous access point + station) is assumed to be
//! configured by the surrounding application before the scheduler starts.

use std::net::Ipv4Addr;

use serde::Serialize;
use thiserror::Error;

/// Error type for radio driver operations.
#[derive(Debug, Error)]
pub enum RadioError {
    /// The driver refused to even start the association attempt.
    #[error("association dispatch rejected: {0}")]
    Dispatch(String),

    /// A network scan could not be carried out.
    #[error("scan failed: {0}")]
    Scan(String),
}

/// A single network found during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanNetwork {
    pub ssid: String,
    /// Signal strength in dBm (negative; closer to zero is stronger).
    pub signal: i8,
}

/// Addressing information delivered once the link obtains a lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpInfo {
    pub address: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
}

/// Asynchronous notifications from the radio subsystem.
///
/// Events are delivered through an mpsc channel consumed by the scheduler
/// task, so handling is always serialized with the periodic tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    /// Link established; no address assigned yet.  Purely informational.
    Associated,
    /// Address acquired – the attempt has fully succeeded.
    AddressAcquired(IpInfo),
    /// The link dropped, either mid-attempt or while connected.
    Disassociated { reason_code: u16 },
    /// The association attempt failed outright (wrong key, AP refused).
    AssociationFailed,
}

/// Abstraction over the platform WiFi driver.
pub trait RadioDriver: Send + Sync {
    /// Performs a blocking scan for nearby networks.
    fn scan(&self) -> Result<Vec<ScanNetwork>, RadioError>;

    /// Starts an association attempt.  Success means the attempt was
    /// dispatched; the outcome arrives later as a [`RadioEvent`].
    fn associate(&self, ssid: &str, passphrase: &str) -> Result<(), RadioError>;

    /// Tears down the current link, if any.
    fn disassociate(&self) -> Result<(), RadioError>;

    /// Signal strength of the current link in dBm, if associated.
    fn link_quality(&self) -> Option<i8>;
}
