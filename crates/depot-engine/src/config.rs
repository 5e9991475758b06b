use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use depot_content::{AccountingContentStore, CachingContentStore, ContentStore, FileSystemContentStore};
use depot_metadata::{InMemoryMetadataStore, JsonFileMetadataStore, MetadataStore};
use depot_types::RouteResolver;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::combined::CombinedStore;
use crate::error::{EngineError, EngineResult};

/// The engine as assembled from configuration: trait-object stores so the
/// decorator chain can vary at runtime.
pub type DynCombinedStore = CombinedStore<Arc<dyn MetadataStore>, Arc<dyn ContentStore>>;

/// Read-cache bounds in bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Crossing this forces an inline sweep.
    pub maximum_size: u64,
    /// Sweeps evict down to this size.
    pub stretch_size: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            maximum_size: 64 * 1024 * 1024,
            stretch_size: 48 * 1024 * 1024,
        }
    }
}

/// Storage engine configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding one file per blob.
    pub content_root: PathBuf,
    /// JSON metadata file. Metadata is kept in memory only when unset.
    pub metadata_path: Option<PathBuf>,
    pub cache: Option<CacheConfig>,
    /// Keep a running total of managed bytes instead of scanning the root.
    pub accounting: bool,
    /// Upper bound on managed bytes.
    pub quota: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            content_root: PathBuf::from("data"),
            metadata_path: None,
            cache: None,
            accounting: true,
            quota: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if let Some(cache) = &self.cache {
            if cache.stretch_size > cache.maximum_size {
                return Err(EngineError::Config(format!(
                    "cache stretch size {} exceeds maximum size {}",
                    cache.stretch_size, cache.maximum_size
                )));
            }
        }
        if self.content_root.as_os_str().is_empty() {
            return Err(EngineError::Config("content root is empty".into()));
        }
        Ok(())
    }

    /// Assemble the stores this configuration describes.
    ///
    /// The content root is created if missing. Decorators stack as
    /// filesystem, then cache, then accounting (outermost).
    pub fn build(&self, routes: Option<Arc<dyn RouteResolver>>) -> EngineResult<DynCombinedStore> {
        self.validate()?;

        fs::create_dir_all(&self.content_root).map_err(|e| {
            EngineError::Config(format!(
                "cannot create content root {}: {e}",
                self.content_root.display()
            ))
        })?;

        let mut fs_store = FileSystemContentStore::open(&self.content_root)?;
        if let Some(routes) = routes {
            fs_store = fs_store.with_routes(routes);
        }

        let mut content: Arc<dyn ContentStore> = Arc::new(fs_store);
        if let Some(cache) = self.cache {
            content = Arc::new(CachingContentStore::new(content, cache.maximum_size, cache.stretch_size)?);
        }
        if self.accounting {
            let (accounted, error) = AccountingContentStore::new(content);
            if let Some(e) = error {
                warn!(error = %e, "accounting seeded from zero");
            }
            info!(bytes = accounted.estimate(), "content accounting ready");
            content = Arc::new(accounted);
        }

        let metadata: Arc<dyn MetadataStore> = match &self.metadata_path {
            Some(path) => Arc::new(JsonFileMetadataStore::open(path)?),
            None => Arc::new(InMemoryMetadataStore::new()),
        };

        let mut store = CombinedStore::new(metadata, content);
        if let Some(quota) = self.quota {
            store = store.with_quota(quota);
        }

        info!(
            root = %self.content_root.display(),
            cached = self.cache.is_some(),
            accounting = self.accounting,
            quota = ?self.quota,
            "storage engine assembled"
        );
        Ok(store)
    }
}
