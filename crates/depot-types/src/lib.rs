//! Foundation types for Depot.
//!
//! This crate provides the record and identifier types shared by every Depot
//! crate: the storage engine, the metadata backends, and the HTTP layer.
//!
//! # Key Types
//!
//! - [`BlobId`] — Allocated blob identifier (`0` while a record is pending)
//! - [`Blob`] — Descriptive record for one stored object
//! - [`BlobClass`] — Retention class (`permanent` or `temporary`)
//! - [`MetadataMap`] — Free-form key/value metadata attached to a blob
//! - [`BlobQuery`] — Search criteria over name, bucket, and checksum
//! - [`RouteResolver`] — Capability for turning a named route into a URL
//! - [`RouteTable`] — Template-based [`RouteResolver`] keyed by route name

pub mod blob;
pub mod error;
pub mod id;
pub mod query;
pub mod route;

pub use blob::{Blob, BlobClass, MetadataMap};
pub use error::TypeError;
pub use id::BlobId;
pub use query::BlobQuery;
pub use route::{RouteResolver, RouteTable};
