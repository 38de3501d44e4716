//! The blob store contract and its backend-generic implementation.

use crate::backend::{LocalBackend, ObjectBackend, RemoteBackend, SeekableBlob};
use crate::icons::FallbackIcon;
use crate::layout::{Clock, PathLayout};
use crate::thumbnail::{ThumbnailSize, ThumbnailSpec};
use crate::trash::TrashManager;
use crate::{FilesError, FilesResult};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};
use vault_types::MediaRecord;
use vault_uuid::Sha256Hash;

/// Persists, retrieves and archives record blobs.
///
/// Read operations report a missing blob as `Ok(None)`; errors mean the backend itself
/// failed.
pub trait BlobStore: Send + Sync {
    /// Writes `bytes` at `<compute_path(record)>/<id>` and returns the record with
    /// `logical_path` and `size` set.
    ///
    /// Empty `bytes` is a no-op returning `record` unchanged. A record without an id is keyed
    /// by the SHA-256 of its bytes, which is also written back as its id. Image records get
    /// thumbnail variants; failing to produce them is logged, not returned.
    fn save(&self, bytes: &[u8], record: MediaRecord) -> FilesResult<MediaRecord>;

    fn read_all(&self, record: &MediaRecord) -> FilesResult<Option<Vec<u8>>>;

    fn read_seekable(&self, record: &MediaRecord) -> FilesResult<Option<Box<dyn SeekableBlob>>>;

    /// Archives the record's blob and thumbnails to the trash.
    ///
    /// A record without a `logical_path` is a no-op. Returns [`FilesError::NotFound`] when
    /// the path is set but the blob is missing.
    fn delete(&self, record: &MediaRecord) -> FilesResult<()>;

    /// Returns a stored thumbnail for image records, or a fallback icon for anything else.
    fn thumbnail(&self, record: &MediaRecord, size: ThumbnailSize)
        -> FilesResult<Option<Vec<u8>>>;

    fn empty_trash(&self) -> FilesResult<()>;

    fn mode(&self) -> StorageMode;
}

/// Which backend family a store writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageMode {
    #[default]
    Local,
    Remote,
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

impl FromStr for StorageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(format!(
                "unknown storage mode '{}' (expected 'local' or 'remote')",
                other
            )),
        }
    }
}

/// Backend selection, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageSettings {
    Local { root: PathBuf },
    Remote { url: String },
}

impl StorageSettings {
    pub fn mode(&self) -> StorageMode {
        match self {
            Self::Local { .. } => StorageMode::Local,
            Self::Remote { .. } => StorageMode::Remote,
        }
    }
}

/// [`BlobStore`] over any [`ObjectBackend`].
pub struct MediaBlobStore<B> {
    backend: B,
    layout: PathLayout,
    thumbnails: ThumbnailSpec,
    trash: TrashManager,
    mode: StorageMode,
}

pub type LocalBlobStore = MediaBlobStore<LocalBackend>;
pub type RemoteBlobStore = MediaBlobStore<RemoteBackend>;

impl LocalBlobStore {
    pub fn local(
        root: &std::path::Path,
        thumbnails: ThumbnailSpec,
        clock: Arc<dyn Clock>,
    ) -> FilesResult<Self> {
        Ok(Self::new(
            LocalBackend::new(root)?,
            StorageMode::Local,
            thumbnails,
            clock,
        ))
    }
}

impl RemoteBlobStore {
    pub fn remote(url: &str, thumbnails: ThumbnailSpec, clock: Arc<dyn Clock>) -> FilesResult<Self> {
        Ok(Self::new(
            RemoteBackend::from_url(url)?,
            StorageMode::Remote,
            thumbnails,
            clock,
        ))
    }
}

impl<B: ObjectBackend> MediaBlobStore<B> {
    pub fn new(
        backend: B,
        mode: StorageMode,
        thumbnails: ThumbnailSpec,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            layout: PathLayout::new(clock),
            thumbnails,
            trash: TrashManager::new(),
            mode,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn layout(&self) -> &PathLayout {
        &self.layout
    }

    /// Blob key of a record that has one bound.
    fn bound_key(record: &MediaRecord) -> Option<(&str, &str)> {
        match (record.logical_path.as_deref(), record.id.as_deref()) {
            (Some(dir), Some(id)) if !id.is_empty() => Some((dir, id)),
            _ => None,
        }
    }

    fn write_thumbnails(&self, dir: &str, id: &str, bytes: &[u8]) {
        let variants = match self.thumbnails.render(bytes) {
            Ok(variants) => variants,
            Err(e) => {
                warn!(id, error = %e, "thumbnail generation failed");
                return;
            }
        };

        for (size, png) in variants {
            let key = PathLayout::thumbnail_key(dir, id, size);
            if let Err(e) = self.backend.put(&key, &png) {
                warn!(id, %size, error = %e, "failed to store thumbnail");
            }
        }
    }

    fn remove_thumbnails(&self, dir: &str, id: &str) {
        for size in ThumbnailSize::ALL {
            let key = PathLayout::thumbnail_key(dir, id, size);
            match self.backend.remove(&key) {
                Ok(true) => debug!(%key, "removed stale thumbnail"),
                Ok(false) => {}
                Err(e) => warn!(%key, error = %e, "failed to remove stale thumbnail"),
            }
        }
    }
}

impl<B: ObjectBackend> BlobStore for MediaBlobStore<B> {
    fn save(&self, bytes: &[u8], mut record: MediaRecord) -> FilesResult<MediaRecord> {
        if bytes.is_empty() {
            debug!(id = record.id_str(), "empty payload, nothing stored");
            return Ok(record);
        }

        let id = match record.id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => id.to_owned(),
            None => {
                let hash = Sha256Hash::digest(bytes).to_string();
                record.id = Some(hash.clone());
                hash
            }
        };
        if id.contains('/') {
            return Err(FilesError::InvalidPath(format!("record id contains '/': {}", id)));
        }

        let dir = self.layout.compute_path(&record)?;
        let key = PathLayout::blob_key(&dir, &id);
        self.backend.put(&key, bytes)?;

        if record.is_image() {
            self.write_thumbnails(&dir, &id, bytes);
        } else {
            self.remove_thumbnails(&dir, &id);
        }

        info!(id = %id, path = %dir, bytes = bytes.len(), "stored blob");
        record.logical_path = Some(dir);
        record.size = bytes.len() as u64;
        Ok(record)
    }

    fn read_all(&self, record: &MediaRecord) -> FilesResult<Option<Vec<u8>>> {
        match Self::bound_key(record) {
            Some((dir, id)) => self.backend.get(&PathLayout::blob_key(dir, id)),
            None => Ok(None),
        }
    }

    fn read_seekable(&self, record: &MediaRecord) -> FilesResult<Option<Box<dyn SeekableBlob>>> {
        match Self::bound_key(record) {
            Some((dir, id)) => self.backend.open(&PathLayout::blob_key(dir, id)),
            None => Ok(None),
        }
    }

    fn delete(&self, record: &MediaRecord) -> FilesResult<()> {
        let Some((dir, id)) = Self::bound_key(record) else {
            debug!(id = record.id_str(), "no blob bound, nothing to delete");
            return Ok(());
        };

        let key = PathLayout::blob_key(dir, id);
        if !self.backend.exists(&key)? {
            return Err(FilesError::NotFound(key));
        }

        self.trash.move_to_trash(&self.backend, dir, id)?;
        Ok(())
    }

    fn thumbnail(
        &self,
        record: &MediaRecord,
        size: ThumbnailSize,
    ) -> FilesResult<Option<Vec<u8>>> {
        let variant = match Self::bound_key(record) {
            Some((dir, id)) if record.is_image() => {
                self.backend.get(&PathLayout::thumbnail_key(dir, id, size))?
            }
            _ => None,
        };
        if variant.is_none() && record.is_image() {
            debug!(id = record.id_str(), "no thumbnail variant stored, serving fallback icon");
        }

        Ok(Some(variant.unwrap_or_else(|| {
            FallbackIcon::for_mime(&record.mime_type).bytes().to_vec()
        })))
    }

    fn empty_trash(&self) -> FilesResult<()> {
        self.trash.empty(&self.backend)
    }

    fn mode(&self) -> StorageMode {
        self.mode
    }
}

/// The single store selected at startup.
pub enum ConfiguredBlobStore {
    Local(LocalBlobStore),
    Remote(RemoteBlobStore),
}

impl ConfiguredBlobStore {
    fn inner(&self) -> &dyn BlobStore {
        match self {
            Self::Local(store) => store,
            Self::Remote(store) => store,
        }
    }
}

impl BlobStore for ConfiguredBlobStore {
    fn save(&self, bytes: &[u8], record: MediaRecord) -> FilesResult<MediaRecord> {
        self.inner().save(bytes, record)
    }

    fn read_all(&self, record: &MediaRecord) -> FilesResult<Option<Vec<u8>>> {
        self.inner().read_all(record)
    }

    fn read_seekable(&self, record: &MediaRecord) -> FilesResult<Option<Box<dyn SeekableBlob>>> {
        self.inner().read_seekable(record)
    }

    fn delete(&self, record: &MediaRecord) -> FilesResult<()> {
        self.inner().delete(record)
    }

    fn thumbnail(
        &self,
        record: &MediaRecord,
        size: ThumbnailSize,
    ) -> FilesResult<Option<Vec<u8>>> {
        self.inner().thumbnail(record, size)
    }

    fn empty_trash(&self) -> FilesResult<()> {
        self.inner().empty_trash()
    }

    fn mode(&self) -> StorageMode {
        self.inner().mode()
    }
}

/// Builds the store described by `settings`.
///
/// # Errors
///
/// Returns [`FilesError::InvalidRootDirectory`] for an unusable local root or
/// [`FilesError::InvalidBackendUrl`] for a bad remote URL.
pub fn open_blob_store(
    settings: &StorageSettings,
    thumbnails: ThumbnailSpec,
    clock: Arc<dyn Clock>,
) -> FilesResult<ConfiguredBlobStore> {
    let store = match settings {
        StorageSettings::Local { root } => {
            ConfiguredBlobStore::Local(LocalBlobStore::local(root, thumbnails, clock)?)
        }
        StorageSettings::Remote { url } => {
            ConfiguredBlobStore::Remote(RemoteBlobStore::remote(url, thumbnails, clock)?)
        }
    };

    info!(mode = %store.mode(), "opened blob store");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::FixedClock;
    use crate::test_support::sample_png;
    use chrono::NaiveDate;
    use object_store::memory::InMemory;
    use object_store::path::Path as StorePath;
    use std::io::{Read, Seek, SeekFrom};
    use tempfile::TempDir;

    const ID: &str = "550e8400e29b41d4a716446655440000";

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()))
    }

    fn local_store(temp: &TempDir) -> LocalBlobStore {
        LocalBlobStore::local(temp.path(), ThumbnailSpec::default(), clock()).unwrap()
    }

    fn record(mime: &str) -> MediaRecord {
        let mut record = MediaRecord::new("title", "file", mime);
        record.id = Some(ID.into());
        record
    }

    #[test]
    fn test_save_and_read_back() {
        let temp = TempDir::new().unwrap();
        let store = local_store(&temp);

        let saved = store.save(b"hello vault", record("text/plain")).unwrap();

        assert_eq!(saved.logical_path.as_deref(), Some("/text/20240301"));
        assert_eq!(saved.size, 11);
        assert_eq!(saved.id.as_deref(), Some(ID));
        assert!(temp.path().join("text/20240301").join(ID).is_file());
        assert_eq!(store.read_all(&saved).unwrap().as_deref(), Some(&b"hello vault"[..]));

        let mut handle = store.read_seekable(&saved).unwrap().unwrap();
        handle.seek(SeekFrom::Start(6)).unwrap();
        let mut rest = String::new();
        handle.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "vault");
    }

    #[test]
    fn test_save_overwrites_in_place() {
        let temp = TempDir::new().unwrap();
        let store = local_store(&temp);

        let mut first = record("text/plain");
        first.logical_path = Some("/text/20200101".into());
        let first = store.save(b"a much longer first payload", first).unwrap();
        let second = store.save(b"short", first).unwrap();

        assert_eq!(second.logical_path.as_deref(), Some("/text/20200101"));
        assert_eq!(store.read_all(&second).unwrap().as_deref(), Some(&b"short"[..]));
        assert!(!temp.path().join("text/20240301").exists());
    }

    #[test]
    fn test_empty_bytes_is_noop() {
        let temp = TempDir::new().unwrap();
        let store = local_store(&temp);

        let input = record("image/png");
        let output = store.save(&[], input.clone()).unwrap();

        assert_eq!(output, input);
        assert!(output.logical_path.is_none());
        assert!(!temp.path().join("image").exists());
        assert!(store.read_all(&output).unwrap().is_none());
    }

    #[test]
    fn test_invalid_mime_type_fails_save() {
        let temp = TempDir::new().unwrap();
        let store = local_store(&temp);

        let result = store.save(b"data", record("nonsense"));
        assert!(matches!(result, Err(FilesError::InvalidMimeType(_))));
    }

    #[test]
    fn test_image_scenario_writes_three_thumbnails() {
        let temp = TempDir::new().unwrap();
        let store = local_store(&temp);
        let png = sample_png(200, 150);
        assert!(png.len() > 50 * 1024);

        let mut input = MediaRecord::new("a.png", "a.png", "image/png");
        input.id = Some(ID.into());
        let saved = store.save(&png, input).unwrap();

        assert_eq!(saved.logical_path.as_deref(), Some("/image/20240301"));
        assert!(saved.activated);
        for size in ThumbnailSize::ALL {
            let thumb = store.thumbnail(&saved, size).unwrap().unwrap();
            assert!(image::load_from_memory(&thumb).is_ok());
            assert!(temp
                .path()
                .join("image/20240301")
                .join(format!("{}-{}", ID, size))
                .is_file());
        }
    }

    #[test]
    fn test_corrupt_image_still_saves() {
        let temp = TempDir::new().unwrap();
        let store = local_store(&temp);

        let saved = store.save(b"not really a png", record("image/png")).unwrap();

        assert!(saved.logical_path.is_some());
        assert!(store.read_all(&saved).unwrap().is_some());
        assert_eq!(
            store.thumbnail(&saved, ThumbnailSize::Small).unwrap().as_deref(),
            Some(FallbackIcon::Generic.bytes())
        );
    }

    #[test]
    fn test_non_image_overwrite_removes_stale_thumbnails() {
        let temp = TempDir::new().unwrap();
        let store = local_store(&temp);

        let saved = store.save(&sample_png(32, 32), record("image/png")).unwrap();
        let small = temp.path().join("image/20240301").join(format!("{}-small", ID));
        assert!(small.is_file());

        let mut replaced = saved.clone();
        replaced.mime_type = "application/pdf".into();
        store.save(b"%PDF-1.7", replaced).unwrap();

        assert!(!small.exists());
    }

    #[test]
    fn test_thumbnail_fallback_icon_for_non_images() {
        let temp = TempDir::new().unwrap();
        let store = local_store(&temp);

        let video = record("video/mp4");
        let icon = store.thumbnail(&video, ThumbnailSize::Large).unwrap().unwrap();
        assert_eq!(icon, FallbackIcon::Video.bytes());

        let html = record("text/html");
        let icon = store.thumbnail(&html, ThumbnailSize::Small).unwrap().unwrap();
        assert_eq!(icon, FallbackIcon::Generic.bytes());
    }

    #[test]
    fn test_delete_moves_to_trash() {
        let temp = TempDir::new().unwrap();
        let store = local_store(&temp);
        let saved = store.save(b"bytes", record("audio/mpeg")).unwrap();

        store.delete(&saved).unwrap();

        assert!(store.read_all(&saved).unwrap().is_none());
        assert!(temp.path().join("trash").join(ID).is_file());

        store.empty_trash().unwrap();
        assert!(!temp.path().join("trash").exists());
        store.empty_trash().unwrap();
    }

    #[test]
    fn test_delete_missing_blob_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = local_store(&temp);

        let mut ghost = record("audio/mpeg");
        ghost.logical_path = Some("/audio/20240301".into());
        assert!(matches!(store.delete(&ghost), Err(FilesError::NotFound(_))));

        // Nothing bound: no-op.
        store.delete(&record("audio/mpeg")).unwrap();
    }

    #[test]
    fn test_identity_assigned_id_wins_over_content_hash() {
        let temp = TempDir::new().unwrap();
        let store = local_store(&temp);
        let bytes = b"identical bytes";
        let digest = Sha256Hash::digest(bytes).to_string();

        let hashed = store
            .save(bytes, MediaRecord::new("a", "a.bin", "application/x-test"))
            .unwrap();
        assert_eq!(hashed.id.as_deref(), Some(digest.as_str()));

        let again = store
            .save(bytes, MediaRecord::new("b", "b.bin", "application/x-test"))
            .unwrap();
        assert_eq!(again.id, hashed.id);

        let assigned = store.save(bytes, record("application/x-test")).unwrap();
        assert_eq!(assigned.id.as_deref(), Some(ID));

        let dir = temp.path().join("application/20240301");
        assert!(dir.join(&digest).is_file());
        assert!(dir.join(ID).is_file());
    }

    #[test]
    fn test_remote_store_in_memory() {
        let backend =
            RemoteBackend::new(Arc::new(InMemory::new()), StorePath::from("media")).unwrap();
        let store = RemoteBlobStore::new(
            backend,
            StorageMode::Remote,
            ThumbnailSpec::default(),
            clock(),
        );

        let saved = store.save(&sample_png(20, 20), record("image/png")).unwrap();
        assert_eq!(store.mode(), StorageMode::Remote);
        assert_eq!(saved.logical_path.as_deref(), Some("/image/20240301"));
        assert!(store.thumbnail(&saved, ThumbnailSize::Medium).unwrap().is_some());

        let mut handle = store.read_seekable(&saved).unwrap().unwrap();
        let mut bytes = Vec::new();
        handle.read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, sample_png(20, 20));

        store.delete(&saved).unwrap();
        assert!(store.read_all(&saved).unwrap().is_none());
        assert!(store.backend().exists("/trash/550e8400e29b41d4a716446655440000").unwrap());
    }

    #[test]
    fn test_open_blob_store_from_settings() {
        let temp = TempDir::new().unwrap();
        let settings = StorageSettings::Local {
            root: temp.path().join("blobs"),
        };
        let store = open_blob_store(&settings, ThumbnailSpec::default(), clock()).unwrap();
        assert_eq!(store.mode(), StorageMode::Local);
        assert_eq!(settings.mode(), StorageMode::Local);

        let remote = StorageSettings::Remote {
            url: "memory:///".into(),
        };
        let store = open_blob_store(&remote, ThumbnailSpec::default(), clock()).unwrap();
        assert!(matches!(store, ConfiguredBlobStore::Remote(_)));

        let bad = StorageSettings::Remote { url: "::".into() };
        assert!(matches!(
            open_blob_store(&bad, ThumbnailSpec::default(), clock()),
            Err(FilesError::InvalidBackendUrl(_))
        ));
    }

    #[test]
    fn test_storage_mode_parse() {
        assert_eq!("LOCAL".parse::<StorageMode>().unwrap(), StorageMode::Local);
        assert_eq!("remote".parse::<StorageMode>().unwrap(), StorageMode::Remote);
        assert!("hdfs".parse::<StorageMode>().is_err());
        assert_eq!(StorageMode::Remote.to_string(), "remote");
    }
}
