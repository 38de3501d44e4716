//! Remote object-store backend (S3-compatible, HTTP, in-memory).
//!
//! The [`ObjectBackend`] contract is synchronous, so this backend owns a small tokio runtime
//! and blocks on it for each call. Callers running inside an async executor must reach it
//! through `spawn_blocking`.

use super::{ObjectBackend, SeekableBlob};
use crate::constants::{REMOTE_READ_CHUNK, REMOTE_UPLOAD_PARTS, REMOTE_WORKER_THREADS};
use crate::layout::validate_key;
use crate::{FilesError, FilesResult};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use object_store::path::Path as StorePath;
use object_store::{ObjectMeta, ObjectStore, PutPayload, WriteMultipart};
use std::future::Future;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::debug;
use url::Url;

/// A dedicated runtime that drives the object-store client.
struct BlockingRuntime {
    handle: Handle,
    runtime: Option<Runtime>,
}

impl BlockingRuntime {
    fn new() -> FilesResult<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(REMOTE_WORKER_THREADS)
            .thread_name("vault-object-store")
            .enable_all()
            .build()?;
        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
        })
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.handle.block_on(future)
    }
}

impl Drop for BlockingRuntime {
    fn drop(&mut self) {
        // The last owner may be dropped on an executor thread, where a blocking shutdown
        // would panic.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Stores objects in an [`ObjectStore`] below a base prefix.
#[derive(Clone)]
pub struct RemoteBackend {
    store: Arc<dyn ObjectStore>,
    base: StorePath,
    rt: Arc<BlockingRuntime>,
}

impl std::fmt::Debug for RemoteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBackend")
            .field("store", &self.store.to_string())
            .field("base", &self.base)
            .finish()
    }
}

impl RemoteBackend {
    /// Wraps an existing store. Keys are placed below `base`.
    pub fn new(store: Arc<dyn ObjectStore>, base: StorePath) -> FilesResult<Self> {
        Ok(Self {
            store,
            base,
            rt: Arc::new(BlockingRuntime::new()?),
        })
    }

    /// Builds a store from a URL such as `s3://bucket/prefix` or `memory:///`.
    ///
    /// Credentials for S3 are read from the usual `AWS_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidBackendUrl`] if the URL cannot be parsed or names an
    /// unsupported scheme.
    pub fn from_url(url: &str) -> FilesResult<Self> {
        let parsed = Url::parse(url)
            .map_err(|e| FilesError::InvalidBackendUrl(format!("{}: {}", url, e)))?;

        let options = std::env::vars()
            .filter(|(key, _)| key.starts_with("AWS_"))
            .map(|(key, value)| (key.to_ascii_lowercase(), value));

        let (store, base) = object_store::parse_url_opts(&parsed, options)
            .map_err(|e| FilesError::InvalidBackendUrl(format!("{}: {}", url, e)))?;

        Self::new(Arc::from(store), base)
    }

    fn path_for(&self, key: &str) -> FilesResult<StorePath> {
        let relative = validate_key(key)?;
        Ok(relative
            .split('/')
            .fold(self.base.clone(), |path, segment| path.child(segment)))
    }

    fn head(&self, path: &StorePath) -> FilesResult<Option<ObjectMeta>> {
        match self.rt.block_on(self.store.head(path)) {
            Ok(meta) => Ok(Some(meta)),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl ObjectBackend for RemoteBackend {
    fn put(&self, key: &str, data: &[u8]) -> FilesResult<()> {
        let path = self.path_for(key)?;
        let payload = PutPayload::from(data.to_vec());
        self.rt.block_on(self.store.put(&path, payload))?;
        debug!(%path, bytes = data.len(), "wrote remote object");
        Ok(())
    }

    fn put_from(&self, key: &str, source: &mut dyn Read) -> FilesResult<u64> {
        let path = self.path_for(key)?;
        let written = self.rt.block_on(async {
            let upload = self.store.put_multipart(&path).await?;
            let mut writer = WriteMultipart::new(upload);
            let mut buf = vec![0u8; REMOTE_READ_CHUNK as usize];
            let mut written = 0u64;
            loop {
                let n = match source.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        writer.abort().await?;
                        return Err(FilesError::Io(e));
                    }
                };
                writer.wait_for_capacity(REMOTE_UPLOAD_PARTS).await?;
                writer.write(&buf[..n]);
                written += n as u64;
            }
            writer.finish().await?;
            Ok::<_, FilesError>(written)
        })?;
        debug!(%path, bytes = written, "streamed remote object");
        Ok(written)
    }

    fn get(&self, key: &str) -> FilesResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        let result = self.rt.block_on(async {
            let response = self.store.get(&path).await?;
            response.bytes().await
        });
        match result {
            Ok(bytes) => Ok(Some(bytes.to_vec())),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn open(&self, key: &str) -> FilesResult<Option<Box<dyn SeekableBlob>>> {
        let path = self.path_for(key)?;
        let Some(meta) = self.head(&path)? else {
            return Ok(None);
        };

        Ok(Some(Box::new(RemoteSeekable {
            store: Arc::clone(&self.store),
            rt: Arc::clone(&self.rt),
            path,
            len: meta.size,
            last_modified: meta.last_modified,
            position: 0,
            chunk: Vec::new(),
            chunk_start: 0,
        })))
    }

    fn exists(&self, key: &str) -> FilesResult<bool> {
        let path = self.path_for(key)?;
        Ok(self.head(&path)?.is_some())
    }

    fn remove(&self, key: &str) -> FilesResult<bool> {
        let path = self.path_for(key)?;
        // Some stores treat deleting a missing object as success, so existence is checked
        // explicitly.
        if self.head(&path)?.is_none() {
            return Ok(false);
        }
        match self.rt.block_on(self.store.delete(&path)) {
            Ok(()) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn remove_tree(&self, prefix: &str) -> FilesResult<()> {
        let prefix = self.path_for(prefix)?;
        self.rt.block_on(async {
            let objects: Vec<ObjectMeta> = self.store.list(Some(&prefix)).try_collect().await?;
            for object in objects {
                match self.store.delete(&object.location).await {
                    Ok(()) | Err(object_store::Error::NotFound { .. }) => {}
                    Err(e) => return Err(e),
                }
            }
            Ok(())
        })?;
        Ok(())
    }

    fn ensure_dir(&self, _dir: &str) -> FilesResult<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{} ({})", self.store, self.base)
    }
}

/// Reads a remote object through ranged GETs, fetching at least
/// [`REMOTE_READ_CHUNK`] bytes per request.
struct RemoteSeekable {
    store: Arc<dyn ObjectStore>,
    rt: Arc<BlockingRuntime>,
    path: StorePath,
    len: u64,
    last_modified: DateTime<Utc>,
    position: u64,
    chunk: Vec<u8>,
    chunk_start: u64,
}

impl RemoteSeekable {
    fn chunk_end(&self) -> u64 {
        self.chunk_start + self.chunk.len() as u64
    }

    fn fill(&mut self) -> io::Result<()> {
        let end = (self.position + REMOTE_READ_CHUNK).min(self.len);
        let bytes = self
            .rt
            .block_on(self.store.get_range(&self.path, self.position..end))
            .map_err(io::Error::other)?;
        self.chunk = bytes.to_vec();
        self.chunk_start = self.position;
        Ok(())
    }
}

impl Read for RemoteSeekable {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.position >= self.len {
            return Ok(0);
        }
        if self.position < self.chunk_start || self.position >= self.chunk_end() {
            self.fill()?;
        }

        let offset = (self.position - self.chunk_start) as usize;
        let available = &self.chunk[offset..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for RemoteSeekable {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of object")
        })?;
        self.position = target;
        Ok(target)
    }
}

impl SeekableBlob for RemoteSeekable {
    fn len(&self) -> u64 {
        self.len
    }

    fn last_modified(&self) -> Option<DateTime<Utc>> {
        Some(self.last_modified)
    }
}
