use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::id::BlobId;

/// Free-form key/value metadata attached to a blob. Keys are unique.
pub type MetadataMap = BTreeMap<String, serde_json::Value>;

/// Retention class of a blob.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobClass {
    /// Kept until explicitly deleted.
    #[default]
    Permanent,
    /// Eligible for removal under quota pressure.
    #[serde(alias = "temp")]
    Temporary,
}

impl fmt::Display for BlobClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permanent => write!(f, "permanent"),
            Self::Temporary => write!(f, "temporary"),
        }
    }
}

impl FromStr for BlobClass {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "permanent" => Ok(Self::Permanent),
            "temporary" | "temp" => Ok(Self::Temporary),
            other => Err(TypeError::UnknownClass(other.to_string())),
        }
    }
}

/// Descriptive record for one stored object.
///
/// `size` and `checksum` are provisional until the record has been
/// finalized: a freshly allocated record carries `size == 0` and an empty
/// checksum, and only the checksum-and-finalize step of the storage engine
/// fills them from the persisted bytes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Blob {
    #[serde(default)]
    pub id: BlobId,
    pub name: String,
    pub bucket: String,
    #[serde(rename = "uploaded", default = "Utc::now")]
    pub created: DateTime<Utc>,
    #[serde(rename = "type", default)]
    pub class: BlobClass,
    /// Lowercase hex SHA-256 of the persisted content. Empty until finalized.
    #[serde(default)]
    pub checksum: String,
    #[serde(rename = "owner")]
    pub uploader: String,
    #[serde(default)]
    pub metadata: MetadataMap,
    #[serde(default)]
    pub size: u64,
}

impl Blob {
    /// Create a pending blob record with the required descriptive fields.
    pub fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        class: BlobClass,
        uploader: impl Into<String>,
    ) -> Self {
        Self {
            id: BlobId::PENDING,
            name: name.into(),
            bucket: bucket.into(),
            created: Utc::now(),
            class,
            checksum: String::new(),
            uploader: uploader.into(),
            metadata: MetadataMap::new(),
            size: 0,
        }
    }

    /// Set the id (builder style).
    pub fn with_id(mut self, id: BlobId) -> Self {
        self.id = id;
        self
    }

    /// Attach one metadata entry (builder style).
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Check the fields every record needs before an id can be allocated.
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.name.trim().is_empty() {
            return Err(TypeError::MissingField("name"));
        }
        if self.bucket.trim().is_empty() {
            return Err(TypeError::MissingField("bucket"));
        }
        if self.uploader.trim().is_empty() {
            return Err(TypeError::MissingField("owner"));
        }
        Ok(())
    }

    /// Fields that must be populated before the record can be finalized.
    ///
    /// An empty result means the record is complete.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.id.is_allocated() {
            missing.push("id");
        }
        if self.name.is_empty() {
            missing.push("name");
        }
        if self.bucket.is_empty() {
            missing.push("bucket");
        }
        if self.uploader.is_empty() {
            missing.push("owner");
        }
        if self.checksum.is_empty() {
            missing.push("checksum");
        }
        missing
    }

    /// Returns `true` once a checksum has been committed.
    pub fn is_finalized(&self) -> bool {
        !self.checksum.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Blob {
        Blob::new("report.pdf", "testing", BlobClass::Permanent, "alice")
    }

    #[test]
    fn new_blob_is_pending_and_unfinalized() {
        let blob = sample();
        assert!(blob.id.is_pending());
        assert_eq!(blob.size, 0);
        assert!(!blob.is_finalized());
    }

    #[test]
    fn validate_requires_descriptive_fields() {
        assert!(sample().validate().is_ok());

        let mut blob = sample();
        blob.bucket = "  ".into();
        assert_eq!(blob.validate(), Err(TypeError::MissingField("bucket")));

        let mut blob = sample();
        blob.uploader.clear();
        assert_eq!(blob.validate(), Err(TypeError::MissingField("owner")));
    }

    #[test]
    fn missing_fields_lists_everything_absent() {
        let blob = sample();
        assert_eq!(blob.missing_fields(), vec!["id", "checksum"]);

        let mut complete = sample().with_id(BlobId::new(3));
        complete.checksum = "ab".repeat(32);
        assert!(complete.missing_fields().is_empty());
    }

    #[test]
    fn class_accepts_legacy_temp_alias() {
        let class: BlobClass = serde_json::from_str("\"temp\"").unwrap();
        assert_eq!(class, BlobClass::Temporary);
        assert_eq!("temp".parse::<BlobClass>().unwrap(), BlobClass::Temporary);
        assert!("scratch".parse::<BlobClass>().is_err());
    }

    #[test]
    fn wire_names_follow_the_http_api() {
        let blob = sample().with_metadata("pages", 12);
        let json = serde_json::to_value(&blob).unwrap();
        assert_eq!(json["owner"], "alice");
        assert_eq!(json["type"], "permanent");
        assert_eq!(json["metadata"]["pages"], 12);
        assert!(json.get("uploaded").is_some());
    }

    #[test]
    fn description_without_id_or_size_deserializes_as_pending() {
        let json = r#"{"name":"a","bucket":"b","owner":"c","type":"temporary"}"#;
        let blob: Blob = serde_json::from_str(json).unwrap();
        assert!(blob.id.is_pending());
        assert_eq!(blob.class, BlobClass::Temporary);
        assert!(blob.metadata.is_empty());
    }
}
