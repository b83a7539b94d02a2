//! Storage backends implementing the application's [`KvStore`] seam.
//!
//! On the target device the blob primitive is the platform's flash key-value
//! engine; on a development host it is a directory of files.  Either way the
//! credential store above sees the same four operations, and all format and
//! integrity concerns stay in `wifimgr_core::blob`.
//!
//! [`KvStore`]: crate::application::credential_store::KvStore

pub mod file_kv;
pub mod memory_kv;

pub use file_kv::FileKvStore;
pub use memory_kv::MemoryKvStore;
