//! Filesystem-backed content store.
//!
//! Layout: one file per blob, named after its id, directly under the root.
//!
//! ```text
//! {root}/
//! ├── 1
//! ├── 2
//! └── .tmpXXXXXX   # staged replacement, renamed over its target on success
//! ```

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use depot_types::{Blob, BlobId, RouteResolver};
use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{ContentError, ContentResult};
use crate::traits::{ContentStore, ContentWrite};

/// Route name under which stored files are exposed by the HTTP layer.
pub const STATIC_CONTENT_ROUTE: &str = "static-content";

/// Content store living in a local directory on this machine.
///
/// `write` stages the new content in a temporary file inside the root and
/// renames it over the target, so a failed write leaves the previous content
/// intact. `append` and `insert` modify the file in place.
pub struct FileSystemContentStore {
    root: PathBuf,
    routes: Option<Arc<dyn RouteResolver>>,
}

impl FileSystemContentStore {
    /// Open a store rooted at an existing directory.
    pub fn open(root: impl Into<PathBuf>) -> ContentResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ContentError::Config(format!(
                "content root {} is not a directory",
                root.display()
            )));
        }
        Ok(Self { root, routes: None })
    }

    /// Resolve `url_for` through the given routes (builder style).
    pub fn with_routes(mut self, routes: Arc<dyn RouteResolver>) -> Self {
        self.routes = Some(routes);
        self
    }

    /// The directory holding the content files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding a blob's content.
    pub fn path_for(&self, blob: &Blob) -> ContentResult<PathBuf> {
        if !blob.id.is_allocated() {
            return Err(ContentError::InvalidBlobId(blob.id));
        }
        Ok(self.root.join(blob.id.to_string()))
    }

    fn current_size(path: &Path) -> ContentResult<u64> {
        match fs::metadata(path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

impl fmt::Debug for FileSystemContentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSystemContentStore")
            .field("root", &self.root)
            .field("routes", &self.routes.is_some())
            .finish()
    }
}

impl ContentStore for FileSystemContentStore {
    fn contains_blob(&self, blob: &Blob) -> ContentResult<bool> {
        if !blob.id.is_allocated() {
            return Ok(false);
        }
        match fs::metadata(self.path_for(blob)?) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, blob: &Blob, reader: &mut dyn Read) -> ContentResult<ContentWrite> {
        let path = self.path_for(blob)?;
        let previous_size = Self::current_size(&path)?;

        let mut staged = NamedTempFile::new_in(&self.root)?;
        let written = io::copy(reader, &mut staged)?;
        staged.as_file().sync_data()?;
        staged.persist(&path).map_err(|e| ContentError::Io(e.error))?;

        debug!(id = %blob.id, written, previous_size, "content replaced");
        Ok(ContentWrite::new(blob, written, previous_size, written))
    }

    fn append(&self, blob: &Blob, reader: &mut dyn Read) -> ContentResult<ContentWrite> {
        let path = self.path_for(blob)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        let previous_size = file.metadata()?.len();
        let written = io::copy(reader, &mut file)?;
        file.flush()?;

        debug!(id = %blob.id, written, previous_size, "content appended");
        Ok(ContentWrite::new(blob, written, previous_size, previous_size + written))
    }

    fn insert(&self, blob: &Blob, offset: u64, reader: &mut dyn Read) -> ContentResult<ContentWrite> {
        let path = self.path_for(blob)?;
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        let previous_size = file.metadata()?.len();
        let position = file.seek(SeekFrom::Start(offset))?;
        if position != offset {
            return Err(ContentError::Io(io::Error::new(
                io::ErrorKind::Other,
                format!("seek landed at {position}, expected {offset}"),
            )));
        }

        // Writing past the end zero-fills the gap; the file only grows once
        // the upload has produced its bytes.
        let written = io::copy(reader, &mut file)?;
        if written == 0 && previous_size < offset {
            file.set_len(offset)?;
        }
        file.flush()?;
        let size = previous_size.max(offset + written);

        debug!(id = %blob.id, offset, written, size, "content inserted");
        Ok(ContentWrite::new(blob, written, previous_size, size))
    }

    fn delete(&self, blob: &Blob) -> ContentResult<u64> {
        let path = self.path_for(blob)?;
        let released = fs::metadata(&path)
            .map_err(|e| ContentError::from_io(e, blob.id))?
            .len();
        fs::remove_file(&path).map_err(|e| ContentError::from_io(e, blob.id))?;

        debug!(id = %blob.id, released, "content deleted");
        Ok(released)
    }

    fn retrieve(&self, blob: &Blob, writer: &mut dyn Write) -> ContentResult<u64> {
        let path = self.path_for(blob)?;
        let mut file = File::open(&path).map_err(|e| ContentError::from_io(e, blob.id))?;
        Ok(io::copy(&mut file, writer)?)
    }

    fn url_for(&self, blob: &Blob) -> ContentResult<String> {
        let routes = self
            .routes
            .as_ref()
            .ok_or(ContentError::MethodNotSupported("url_for"))?;
        if !blob.id.is_allocated() {
            return Err(ContentError::InvalidBlobId(blob.id));
        }
        let id = blob.id.to_string();
        Ok(routes.url_for_route(STATIC_CONTENT_ROUTE, &[("id", id.as_str())])?)
    }

    fn estimate_size_of_managed_content(&self) -> ContentResult<i64> {
        let mut total: i64 = 0;
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let is_blob = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<BlobId>().ok())
                .is_some();
            if is_blob {
                total += entry.metadata().map_err(io::Error::from)?.len() as i64;
            }
        }
        Ok(total)
    }
}
