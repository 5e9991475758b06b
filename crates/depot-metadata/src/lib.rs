//! Blob metadata for Depot.
//!
//! Metadata is the descriptive half of a blob (name, bucket, owner, checksum,
//! size); content lives in a separate content store. The storage engine keeps
//! the two consistent through a two-phase protocol: a work-in-progress record
//! is stored first, and only after the content has been re-read and hashed is
//! the record finalized.
//!
//! # Modules
//!
//! - [`error`] — Error types for metadata operations
//! - [`traits`] — The [`MetadataStore`] trait
//! - [`memory`] — [`InMemoryMetadataStore`] for tests and embedding
//! - [`json_file`] — [`JsonFileMetadataStore`], persisted across restarts

pub mod error;
pub mod json_file;
pub mod memory;
pub mod traits;

pub use error::{MetadataError, MetadataResult};
pub use json_file::JsonFileMetadataStore;
pub use memory::{InMemoryMetadataStore, MetadataSnapshot};
pub use traits::MetadataStore;
