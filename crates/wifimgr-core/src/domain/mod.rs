//! Domain module containing the credential model and its ordering rules.

pub mod credential;

pub use credential::{Credential, CredentialError, CredentialSet};
