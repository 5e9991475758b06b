use serde::{Deserialize, Serialize};

/// Search criteria for blob records.
///
/// Each populated field selects the blobs matching it exactly; a search
/// returns the union of all selections.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl BlobQuery {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Default::default() }
    }

    pub fn by_bucket(bucket: impl Into<String>) -> Self {
        Self { bucket: Some(bucket.into()), ..Default::default() }
    }

    pub fn by_checksum(checksum: impl Into<String>) -> Self {
        Self { checksum: Some(checksum.into()), ..Default::default() }
    }

    /// Returns `true` if no criterion is set.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.bucket.is_none() && self.checksum.is_none()
    }
}
