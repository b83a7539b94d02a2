//! Captive DNS redirector: the socket loop around `wifimgr_core::dns`.
//!
//! The responder binds a UDP socket on the fallback access point's network
//! segment (well-known port 53 in production, an ephemeral port in tests)
//! and answers every structurally valid query with the device's own address.
//! All byte-level validation and synthesis lives in the core crate; this
//! module only moves datagrams.
//!
//! The loop runs as a blocking task on a dedicated thread to keep
//! synchronous socket I/O off the Tokio runtime.
//!
//! # Read timeout
//!
//! The socket is configured with a 500 ms read timeout.  On each timeout the
//! loop re-checks the `running` flag, so a stop request is observed within
//! half a second even when no client is talking.

use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use wifimgr_core::dns::{build_redirect_response, MAX_DATAGRAM_SIZE};

/// Error type for redirector start-up.
#[derive(Debug, Error)]
pub enum RedirectorError {
    /// The UDP socket could not be bound or inspected.
    #[error("failed to bind captive DNS socket on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Redirector parameters, supplied once at start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectorConfig {
    /// Address to bind the responder socket on.
    pub bind_address: SocketAddr,
    /// The access point's own IPv4 address – what every name resolves to.
    pub ap_address: Ipv4Addr,
}

/// Binds the responder socket and spawns the receive loop on a dedicated
/// thread.  Returns the bound address (useful when binding port 0).
///
/// Clearing `running` stops the loop; the read timeout bounds how long that
/// takes.  Internal socket failures after start-up also end the loop and are
/// reported in the log only – a redirector has no client to report to.
///
/// # Errors
///
/// Returns [`RedirectorError::BindFailed`] if the socket cannot be bound.
pub fn start_captive_redirector(
    config: RedirectorConfig,
    running: Arc<AtomicBool>,
) -> Result<SocketAddr, RedirectorError> {
    let socket = UdpSocket::bind(config.bind_address).map_err(|source| {
        RedirectorError::BindFailed {
            addr: config.bind_address,
            source,
        }
    })?;
    socket
        .set_read_timeout(Some(Duration::from_millis(500)))
        .ok();
    let local_addr = socket
        .local_addr()
        .map_err(|source| RedirectorError::BindFailed {
            addr: config.bind_address,
            source,
        })?;

    std::thread::Builder::new()
        .name("captive-dns".to_string())
        .spawn(move || {
            redirector_loop(socket, config.ap_address, running);
        })
        .expect("failed to spawn captive DNS thread");

    info!("captive DNS redirector listening on UDP {local_addr}, answering with {}", config.ap_address);
    Ok(local_addr)
}

/// The receive loop executed on the redirector thread.
fn redirector_loop(socket: UdpSocket, ap_address: Ipv4Addr, running: Arc<AtomicBool>) {
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];

    while running.load(Ordering::Relaxed) {
        let (len, src) = match socket.recv_from(&mut buf) {
            Ok(pair) => pair,
            Err(e) if is_timeout_error(&e) => continue,
            Err(e) => {
                error!("captive DNS receive failed, stopping responder: {e}");
                break;
            }
        };

        let Some(response) = build_redirect_response(&buf[..len], ap_address) else {
            // Malformed or truncated input is simply ignored.
            debug!("dropping malformed DNS datagram from {src}");
            continue;
        };

        if let Err(e) = socket.send_to(&response, src) {
            warn!("failed to send DNS response to {src}: {e}");
        }
    }

    info!("captive DNS redirector stopped");
}

/// Returns `true` for OS timeout / would-block errors that should be retried.
fn is_timeout_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
