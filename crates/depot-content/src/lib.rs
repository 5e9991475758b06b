//! Byte-content storage for Depot.
//!
//! Content is addressed by a blob's allocated id and stored independently of
//! its metadata. All stores implement [`ContentStore`], including the two
//! decorators, so they stack:
//!
//! - [`FileSystemContentStore`]: one file per blob under a root directory.
//! - [`InMemoryContentStore`]: `HashMap`-backed, for tests and embedding.
//! - [`NullContentStore`]: discards writes.
//! - [`CachingContentStore`]: bounded LRU read cache.
//! - [`AccountingContentStore`]: running total of bytes under management.

pub mod accounting;
pub mod caching;
pub mod error;
pub mod local_fs;
pub mod memory;
pub mod null;
pub mod traits;

pub use accounting::AccountingContentStore;
pub use caching::{CacheStats, CachingContentStore};
pub use error::{ContentError, ContentResult};
pub use local_fs::{FileSystemContentStore, STATIC_CONTENT_ROUTE};
pub use memory::InMemoryContentStore;
pub use null::NullContentStore;
pub use traits::{ContentStore, ContentWrite};
