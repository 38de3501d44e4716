//! Physical storage backends.
//!
//! A backend is a flat key/value store of byte objects addressed by absolute `/`-separated
//! keys. Everything above it (placement, thumbnails, trash) is shared, so the local and remote
//! blob stores differ only in how they move bytes.

mod local;
mod remote;

pub use local::LocalBackend;
pub use remote::RemoteBackend;

use crate::FilesResult;
use chrono::{DateTime, Utc};
use std::io::{Read, Seek};

/// A blob opened for positioned reads.
///
/// Dropping the handle releases the underlying file or connection.
pub trait SeekableBlob: Read + Seek + Send {
    /// Total length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Last modification time reported by the backend.
    fn last_modified(&self) -> Option<DateTime<Utc>>;
}

/// Object-level operations a blob store needs from its backend.
///
/// "Not found" is a normal outcome and is reported through `Option`/`bool`; errors are
/// reserved for I/O faults.
pub trait ObjectBackend: Send + Sync {
    /// Writes `data` at `key`, replacing any existing object and creating parents.
    fn put(&self, key: &str, data: &[u8]) -> FilesResult<()>;

    /// Streams `source` to `key` without holding it in memory, replacing any existing object.
    /// Returns the number of bytes written.
    fn put_from(&self, key: &str, source: &mut dyn Read) -> FilesResult<u64>;

    /// Reads a whole object.
    fn get(&self, key: &str) -> FilesResult<Option<Vec<u8>>>;

    /// Opens an object for positioned reads.
    fn open(&self, key: &str) -> FilesResult<Option<Box<dyn SeekableBlob>>>;

    fn exists(&self, key: &str) -> FilesResult<bool>;

    /// Removes one object. Returns whether it existed.
    fn remove(&self, key: &str) -> FilesResult<bool>;

    /// Removes everything under `prefix`. Succeeds when nothing is there.
    fn remove_tree(&self, prefix: &str) -> FilesResult<()>;

    /// Makes sure `dir` can hold objects. A no-op where directories do not exist.
    fn ensure_dir(&self, dir: &str) -> FilesResult<()>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}
