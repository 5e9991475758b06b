//! The Depot storage engine.
//!
//! [`CombinedStore`] joins a metadata store and a content store into one
//! unit exposed through the [`BlobStore`] trait. Writes, appends and inserts
//! all end the same way: the persisted bytes are read back, hashed with
//! SHA-256, and only then is the metadata record finalized.
//!
//! [`EngineConfig`] assembles the usual production stack (filesystem content,
//! optional read cache, byte accounting, JSON metadata) and
//! [`LockedAppender`] serializes appends on one blob through a
//! synchronization store.

pub mod append;
pub mod combined;
pub mod config;
pub mod error;

pub use append::LockedAppender;
pub use combined::{BlobStore, CombinedStore};
pub use config::{CacheConfig, DynCombinedStore, EngineConfig};
pub use error::{EngineError, EngineResult, ErrorKind};

// Re-export the types callers need alongside the engine.
pub use depot_types::{Blob, BlobClass, BlobId, BlobQuery};
