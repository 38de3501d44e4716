//! Local filesystem backend.
//!
//! Keys map directly onto paths below a canonicalised root directory:
//! `/image/20240301/<id>` is stored at `<root>/image/20240301/<id>`.

use super::{ObjectBackend, SeekableBlob};
use crate::layout::validate_key;
use crate::{FilesError, FilesResult};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::{self, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Stores objects as plain files under `root`.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Opens (creating if needed) a storage root.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidRootDirectory`] if the root cannot be created, is not a
    /// directory or cannot be canonicalised.
    pub fn new(root: &Path) -> FilesResult<Self> {
        fs::create_dir_all(root).map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot create directory {}: {}",
                root.display(),
                e
            ))
        })?;

        if !root.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Path is not a directory: {}",
                root.display()
            )));
        }

        let root = root.canonicalize().map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot canonicalize path {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> FilesResult<PathBuf> {
        let relative = validate_key(key)?;
        Ok(self.root.join(relative))
    }
}

fn with_context(e: io::Error, action: &str, path: &Path) -> FilesError {
    FilesError::Io(io::Error::new(
        e.kind(),
        format!("Failed to {} {}: {}", action, path.display(), e),
    ))
}

impl ObjectBackend for LocalBackend {
    fn put(&self, key: &str, data: &[u8]) -> FilesResult<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| with_context(e, "create storage directory", parent))?;
        }
        // fs::write truncates, so an existing blob is replaced rather than appended to.
        fs::write(&path, data).map_err(|e| with_context(e, "write file to", &path))?;
        debug!(key, bytes = data.len(), "wrote local object");
        Ok(())
    }

    fn put_from(&self, key: &str, source: &mut dyn Read) -> FilesResult<u64> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| with_context(e, "create storage directory", parent))?;
        }
        let mut file =
            fs::File::create(&path).map_err(|e| with_context(e, "create file at", &path))?;
        let written =
            io::copy(source, &mut file).map_err(|e| with_context(e, "stream file to", &path))?;
        debug!(key, bytes = written, "streamed local object");
        Ok(written)
    }

    fn get(&self, key: &str) -> FilesResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(with_context(e, "read file from", &path)),
        }
    }

    fn open(&self, key: &str) -> FilesResult<Option<Box<dyn SeekableBlob>>> {
        let path = self.path_for(key)?;
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(with_context(e, "open", &path)),
        };
        let metadata = file.metadata().map_err(|e| with_context(e, "stat", &path))?;
        if !metadata.is_file() {
            return Ok(None);
        }

        Ok(Some(Box::new(LocalBlob {
            len: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            file,
        })))
    }

    fn exists(&self, key: &str) -> FilesResult<bool> {
        Ok(self.path_for(key)?.is_file())
    }

    fn remove(&self, key: &str) -> FilesResult<bool> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(with_context(e, "remove", &path)),
        }
    }

    fn remove_tree(&self, prefix: &str) -> FilesResult<()> {
        let path = self.path_for(prefix)?;
        match fs::remove_dir_all(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(with_context(e, "remove directory", &path)),
        }
    }

    fn ensure_dir(&self, dir: &str) -> FilesResult<()> {
        let path = self.path_for(dir)?;
        fs::create_dir_all(&path).map_err(|e| with_context(e, "create directory", &path))
    }

    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }
}

/// An open local file.
struct LocalBlob {
    file: fs::File,
    len: u64,
    modified: Option<DateTime<Utc>>,
}

impl Read for LocalBlob {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for LocalBlob {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl SeekableBlob for LocalBlob {
    fn len(&self) -> u64 {
        self.len
    }

    fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_creates_and_canonicalises_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("blobs");

        let backend = LocalBackend::new(&root).unwrap();

        assert!(root.is_dir());
        assert!(backend.root().is_absolute());
        assert!(backend.describe().starts_with("file://"));
    }

    #[test]
    fn test_new_rejects_file_as_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("file.txt");
        fs::write(&root, "not a directory").unwrap();

        let result = LocalBackend::new(&root);
        assert!(matches!(result, Err(FilesError::InvalidRootDirectory(_))));
    }

    #[test]
    fn test_put_overwrites_instead_of_appending() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path()).unwrap();

        backend.put("/text/20240101/a", b"first version, longer").unwrap();
        backend.put("/text/20240101/a", b"second").unwrap();

        assert_eq!(
            backend.get("/text/20240101/a").unwrap().as_deref(),
            Some(&b"second"[..])
        );
        assert!(temp.path().join("text/20240101/a").is_file());
    }

    #[test]
    fn test_put_from_streams_and_truncates() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path()).unwrap();
        backend.put("/trash/a", b"a much longer previous archive").unwrap();

        let written = backend
            .put_from("/trash/a", &mut io::Cursor::new(b"zip".to_vec()))
            .unwrap();

        assert_eq!(written, 3);
        assert_eq!(backend.get("/trash/a").unwrap().as_deref(), Some(&b"zip"[..]));
    }

    #[test]
    fn test_missing_objects_are_not_errors() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path()).unwrap();

        assert!(backend.get("/nothing/here").unwrap().is_none());
        assert!(backend.open("/nothing/here").unwrap().is_none());
        assert!(!backend.exists("/nothing/here").unwrap());
        assert!(!backend.remove("/nothing/here").unwrap());
        backend.remove_tree("/nothing").unwrap();
    }

    #[test]
    fn test_open_supports_positioned_reads() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path()).unwrap();
        let data: Vec<u8> = (0..=255).collect();
        backend.put("/application/20240101/bin", &data).unwrap();

        let mut blob = backend.open("/application/20240101/bin").unwrap().unwrap();
        assert_eq!(blob.len(), 256);
        assert!(blob.last_modified().is_some());

        blob.seek(SeekFrom::Start(100)).unwrap();
        let mut buf = [0u8; 4];
        blob.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [100, 101, 102, 103]);
    }

    #[test]
    fn test_rejects_traversal_keys() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(&temp.path().join("root")).unwrap();

        let result = backend.put("/../escape", b"x");
        assert!(matches!(result, Err(FilesError::InvalidPath(_))));
        assert!(!temp.path().join("escape").exists());
    }

    #[test]
    fn test_remove_tree_and_ensure_dir() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path()).unwrap();

        backend.ensure_dir("/trash").unwrap();
        assert!(temp.path().join("trash").is_dir());

        backend.put("/trash/a", b"1").unwrap();
        backend.put("/trash/b", b"2").unwrap();
        backend.remove_tree("/trash").unwrap();
        assert!(!temp.path().join("trash").exists());

        // Idempotent.
        backend.remove_tree("/trash").unwrap();
    }
}
