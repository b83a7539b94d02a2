//! Application layer use cases for the node.
//!
//! Use cases in this layer orchestrate the domain types from `wifimgr-core`
//! to fulfil a device goal, and depend on abstractions (traits) rather than
//! concrete OS facilities, so the infrastructure can be swapped without
//! touching this code.  Nothing here opens a socket or a file directly.
//!
//! # Sub-modules
//!
//! - **`radio`** – The driver seam: the `RadioDriver` trait the scheduler
//!   dispatches through, and the asynchronous `RadioEvent`s it consumes.
//!
//! - **`credential_store`** – The persisted, priority-ordered credential
//!   list: lazy-loaded over a raw `KvStore` blob primitive, re-persisted
//!   with a fresh integrity tag on every mutation.
//!
//! - **`scheduler`** – The connection state machine: walks the store in
//!   priority order, retries, fails over, re-ranks on success, and parks in
//!   a cool-down once every candidate has failed.
//!
//! - **`provisioning`** – The plain function-call boundary the external
//!   HTTP layer presents to the user: scan, save, remove, connect, reset,
//!   status.

pub mod credential_store;
pub mod provisioning;
pub mod radio;
pub mod scheduler;
