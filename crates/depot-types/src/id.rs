use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Identifier allocated to a blob by the metadata store.
///
/// A `BlobId` of zero marks a record that has not been persisted yet; every
/// persisted blob carries a strictly positive id. Content stores use the id
/// to address bytes, so a pending id can never reach durable storage.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(i64);

impl BlobId {
    /// The id carried by a record before the metadata store allocates one.
    pub const PENDING: Self = Self(0);

    /// Wrap a raw id.
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// The raw integer value.
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Returns `true` while no id has been allocated.
    pub fn is_pending(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if this id can address persisted content.
    pub fn is_allocated(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Debug for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobId({})", self.0)
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BlobId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: i64 = s
            .trim()
            .parse()
            .map_err(|_| TypeError::InvalidBlobId(s.to_string()))?;
        if raw <= 0 {
            return Err(TypeError::InvalidBlobId(s.to_string()));
        }
        Ok(Self(raw))
    }
}

impl From<i64> for BlobId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl From<BlobId> for i64 {
    fn from(id: BlobId) -> Self {
        id.0
    }
}
