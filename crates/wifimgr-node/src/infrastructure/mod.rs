//! Infrastructure layer for the node application.
//!
//! Contains OS-facing adapters: file-system storage backends, the captive
//! DNS socket loop, the TOML configuration file, and the simulated radio
//! driver.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `wifimgr_core`, but MUST NOT be imported by the `application` or domain
//! layers (test code excepted).

pub mod config;
pub mod network;
pub mod radio;
pub mod storage;
