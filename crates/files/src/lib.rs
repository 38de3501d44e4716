//! Vault blob storage
//!
//! This crate persists, retrieves and archives the binary payloads bound to
//! [`MediaRecord`](vault_types::MediaRecord)s. Metadata lives elsewhere; the only thing a
//! record carries from here is its `logical_path`.
//!
//! ## Design Principles
//!
//! - One [`BlobStore`] contract, two interchangeable backends (local filesystem and remote
//!   object store), chosen once at startup through [`StorageSettings`]
//! - Deterministic placement: [`PathLayout`] derives `/<mime-category>/<YYYYMMDD>` for new
//!   blobs and reuses an existing `logical_path` verbatim
//! - Deleting never destroys bytes directly: blobs are archived into the trash first and only
//!   removed once the archive exists
//! - Thumbnail generation is best-effort and never fails a save
//!
//! ## Storage Layout
//!
//! ```text
//! <root>/
//! ├── image/
//! │   └── 20240301/
//! │       ├── <id>            # original bytes
//! │       ├── <id>-small      # PNG thumbnail variants
//! │       ├── <id>-medium
//! │       └── <id>-large
//! ├── video/
//! │   └── 20240302/
//! │       └── <id>
//! └── trash/
//!     └── <id>                # zip archive of a deleted record's blob tree
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use vault_files::{open_blob_store, BlobStore, StorageSettings, SystemClock, ThumbnailSpec};
//! use vault_types::MediaRecord;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = open_blob_store(
//!     &StorageSettings::Local { root: "vault_data/blobs".into() },
//!     ThumbnailSpec::default(),
//!     Arc::new(SystemClock),
//! )?;
//!
//! let mut record = MediaRecord::new("notes", "notes.txt", "text/plain");
//! record.id = Some("550e8400e29b41d4a716446655440000".into());
//! let record = store.save(b"hello", record)?;
//! assert!(record.logical_path.is_some());
//! # Ok(())
//! # }
//! ```

mod backend;
mod constants;
mod icons;
mod inspect;
mod layout;
mod store;
mod thumbnail;
mod trash;

#[cfg(test)]
mod test_support;

pub use backend::{LocalBackend, ObjectBackend, RemoteBackend, SeekableBlob};
pub use constants::{DEFAULT_THUMBNAIL_BOUNDS, TRASH_DIR};
pub use icons::FallbackIcon;
pub use inspect::{inspect, Inspection};
pub use layout::{Clock, FixedClock, PathLayout, SystemClock};
pub use store::{
    open_blob_store, BlobStore, ConfiguredBlobStore, LocalBlobStore, MediaBlobStore,
    RemoteBlobStore, StorageMode, StorageSettings,
};
pub use thumbnail::{ThumbnailSize, ThumbnailSpec};
pub use trash::TrashManager;

/// Errors that can occur during blob operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// MIME type has no `/`, so no storage category can be derived
    #[error("Invalid MIME type: {0}")]
    InvalidMimeType(String),

    /// A record claims a blob that is not present on the backend
    #[error("Blob not found: {0}")]
    NotFound(String),

    /// Local storage root is unusable
    #[error("Invalid root directory: {0}")]
    InvalidRootDirectory(String),

    /// Storage key failed validation (potential directory traversal)
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Remote backend URL cannot be parsed or is unsupported
    #[error("Invalid backend URL: {0}")]
    InvalidBackendUrl(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote object store error
    #[error("Object store error: {0}")]
    Backend(#[from] object_store::Error),

    /// Trash archive could not be written
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Image decoding or encoding failed
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type FilesResult<T> = Result<T, FilesError>;
