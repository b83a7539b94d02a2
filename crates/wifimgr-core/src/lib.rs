//! # wifimgr-core
//!
//! Shared library for the WiFi-Manager node containing the credential domain
//! model, the persisted-record codec with its integrity tag, and the captive
//! DNS byte logic.
//!
//! This crate is used by the node application and by its tests.
//! It has zero dependencies on OS APIs, network sockets, or the file system.
//!
//! The three modules mirror the three hard problems of the system:
//!
//! - **`domain`** – Pure business rules: the `Credential` entry, the bounded
//!   `CredentialSet`, and the ordering rule that decides which saved network
//!   is tried first on the next connection cycle.
//!
//! - **`blob`** – How a `CredentialSet` is laid out on flash.  A versioned,
//!   fixed-width binary record with a CRC-32 tag computed over the serialized
//!   bytes, so a damaged record is detected and treated as absent instead of
//!   being half-trusted.
//!
//! - **`dns`** – The captive-portal DNS transform: given any structurally
//!   valid query received on the fallback access point, synthesize a response
//!   whose single A record points at the device itself.

pub mod blob;
pub mod dns;
pub mod domain;

// Re-export the most-used types at the crate root so callers can write
// `wifimgr_core::Credential` instead of `wifimgr_core::domain::credential::Credential`.
pub use blob::{decode_store, encode_store, BlobError};
pub use dns::build_redirect_response;
pub use domain::credential::{
    Credential, CredentialError, CredentialSet, MAX_SAVED_NETWORKS, PASSPHRASE_MAX_LEN,
    SSID_MAX_LEN,
};
