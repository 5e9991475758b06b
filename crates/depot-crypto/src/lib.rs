//! Checksum primitives for Depot.
//!
//! Every finalized blob carries the lowercase hex SHA-256 of the bytes that
//! were persisted for it. This crate wraps `sha2` so that every component
//! computes and compares those digests the same way.

pub mod checksum;

pub use checksum::{ChecksumError, ChecksumWriter, ContentHasher, CHECKSUM_HEX_LEN};
