//! Network infrastructure: the captive DNS socket loop.

pub mod redirector;

pub use redirector::{start_captive_redirector, RedirectorConfig, RedirectorError};
