//! The vault orchestrator.
//!
//! [`VaultService`] sequences [`MetadataIndex`] and [`BlobStore`] calls so the two stores stay
//! in agreement as far as independent failures allow:
//!
//! - create: index save (assigns the id), then blob save, then index update binding the path
//! - update: blob replace or removal first, then index update
//! - delete: index flips `activated` off, then the blob is archived to trash; if archiving
//!   fails the flag is flipped back
//!
//! Mutations and blob opens on the same id are serialised through an in-process lock table.

use crate::config::CoreConfig;
use crate::index::{JsonFileIndex, MetadataIndex, SearchQuery};
use crate::locks::IdLocks;
use crate::{VaultError, VaultResult};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use vault_files::{
    inspect, open_blob_store, BlobStore, PathLayout, SeekableBlob, StorageMode, SystemClock,
    ThumbnailSize,
};
use vault_types::{MediaRecord, PropValue, DEFAULT_MIME_TYPE};

/// A gallery member as seen at read time.
#[derive(Debug, Clone, PartialEq)]
pub enum GalleryChild {
    /// The child's current state in the index.
    Current(MediaRecord),
    /// The child id no longer resolves; only the reference is left.
    Missing { id: String },
}

impl GalleryChild {
    pub fn id(&self) -> &str {
        match self {
            Self::Current(record) => record.id_str(),
            Self::Missing { id } => id,
        }
    }
}

/// A record together with its resolved children.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryView {
    pub record: MediaRecord,
    pub children: Vec<GalleryChild>,
}

/// An open blob ready for streaming.
pub struct BlobStream {
    pub record: MediaRecord,
    pub blob: Box<dyn SeekableBlob>,
}

impl std::fmt::Debug for BlobStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStream")
            .field("record", &self.record.id)
            .field("len", &self.blob.len())
            .finish()
    }
}

pub struct VaultService {
    blobs: Arc<dyn BlobStore>,
    index: Arc<dyn MetadataIndex>,
    locks: IdLocks,
    stream_buffer: usize,
}

impl VaultService {
    pub fn new(
        cfg: &CoreConfig,
        blobs: Arc<dyn BlobStore>,
        index: Arc<dyn MetadataIndex>,
    ) -> Self {
        Self {
            blobs,
            index,
            locks: IdLocks::new(),
            stream_buffer: cfg.stream_buffer(),
        }
    }

    /// Opens the configured blob store and the JSON index under the data directory.
    pub fn open(cfg: &CoreConfig) -> VaultResult<Self> {
        let blobs = open_blob_store(cfg.storage(), cfg.thumbnails(), Arc::new(SystemClock))?;
        let index = JsonFileIndex::new(cfg.index_dir())?;
        info!(
            mode = %cfg.storage_mode(),
            data_dir = %cfg.data_dir().display(),
            "vault opened"
        );
        Ok(Self::new(cfg, Arc::new(blobs), Arc::new(index)))
    }

    /// Buffer size to use when streaming blobs to clients.
    pub fn stream_buffer(&self) -> usize {
        self.stream_buffer
    }

    pub fn storage_mode(&self) -> StorageMode {
        self.blobs.mode()
    }

    /// Creates a record, storing `bytes` as its blob when non-empty.
    ///
    /// If the index accepts the record but the blob write fails, the record stays indexed
    /// without a blob and is returned as such (`logical_path` unset).
    pub fn create(
        &self,
        mut record: MediaRecord,
        bytes: Option<&[u8]>,
        acting_user: &str,
    ) -> VaultResult<MediaRecord> {
        let bytes = bytes.filter(|b| !b.is_empty());
        let now = Utc::now();

        record.id = None;
        record.logical_path = None;
        record.activated = true;
        record.created_by = Some(acting_user.to_owned());
        record.creation_date = Some(now);
        record.modified_by = Some(acting_user.to_owned());
        record.modification_date = Some(now);
        describe_payload(&mut record, bytes)?;

        let record = self.index.save(record)?;
        let id = record.id_str().to_owned();
        info!(id = %id, user = acting_user, "record created");

        let Some(bytes) = bytes else {
            return Ok(record);
        };

        let stored = match self.blobs.save(bytes, record.clone()) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(id = %id, error = %e, "blob write failed, record left without content");
                return Ok(record);
            }
        };

        self.index.update(&stored).inspect_err(|e| {
            warn!(id = %id, error = %e, "blob stored but its path was not indexed");
        })
    }

    /// Replaces a record's fields and its blob.
    ///
    /// Absent or empty `bytes` removes any existing blob. Identity, audit creation fields, the
    /// trash flag and the existing logical path are kept from the stored record.
    pub fn update(
        &self,
        id: &str,
        mut fields: MediaRecord,
        bytes: Option<&[u8]>,
        acting_user: &str,
    ) -> VaultResult<MediaRecord> {
        let _guard = self.locks.acquire(id);
        let existing = self.require(id)?;
        if !existing.activated {
            return Err(VaultError::InvalidInput(format!(
                "record {} is in the trash",
                id
            )));
        }

        let bytes = bytes.filter(|b| !b.is_empty());
        fields.id = existing.id.clone();
        fields.activated = existing.activated;
        fields.created_by = existing.created_by.clone();
        fields.creation_date = existing.creation_date;
        fields.modified_by = Some(acting_user.to_owned());
        fields.modification_date = Some(Utc::now());
        fields.logical_path = existing.logical_path.clone();
        describe_payload(&mut fields, bytes)?;

        let updated = match bytes {
            Some(bytes) => self.blobs.save(bytes, fields)?,
            None if fields.has_blob() => {
                match self.blobs.delete(&fields) {
                    Ok(()) => {}
                    Err(vault_files::FilesError::NotFound(key)) => {
                        warn!(id, key = %key, "blob already missing, unbinding path");
                    }
                    Err(e) => return Err(VaultError::StorageService(e.to_string())),
                }
                fields.logical_path = None;
                fields
            }
            None => fields,
        };

        let updated = self.index.update(&updated)?;
        info!(id, user = acting_user, "record updated");
        Ok(updated)
    }

    /// Moves a record to the trash.
    ///
    /// The index is flipped first so the record disappears from active listings before the
    /// blob moves. If the blob cannot be archived, the flip is undone and the storage error
    /// returned. Deleting an already trashed record returns it unchanged.
    pub fn delete(&self, id: &str, acting_user: &str) -> VaultResult<MediaRecord> {
        let _guard = self.locks.acquire(id);
        let original = self.require(id)?;
        if !original.activated {
            debug!(id, "record already in trash");
            return Ok(original);
        }

        let mut trashed = original.clone();
        trashed.activated = false;
        trashed.modified_by = Some(acting_user.to_owned());
        trashed.modification_date = Some(Utc::now());
        let mut trashed = self.index.update(&trashed)?;

        if let Err(e) = self.blobs.delete(&trashed) {
            warn!(id, error = %e, "blob archive failed, restoring record");
            if let Err(restore) = self.index.update(&original) {
                error!(id, error = %restore, "failed to restore record after blob archive failure");
            }
            return Err(VaultError::StorageService(e.to_string()));
        }

        if trashed.logical_path.take().is_some() {
            trashed = match self.index.update(&trashed) {
                Ok(unbound) => unbound,
                Err(e) => {
                    warn!(id, error = %e, "blob archived but stale path still indexed");
                    trashed
                }
            };
        }

        info!(id, user = acting_user, "record moved to trash");
        Ok(trashed)
    }

    pub fn get(&self, id: &str) -> VaultResult<Option<MediaRecord>> {
        self.index.get(id)
    }

    /// Fetches a record and resolves gallery children against the index.
    ///
    /// Children that no longer resolve are kept as [`GalleryChild::Missing`].
    pub fn read(&self, id: &str) -> VaultResult<GalleryView> {
        let record = self.require(id)?;

        let children = record
            .children
            .iter()
            .map(|child_id| match self.index.get(child_id) {
                Ok(Some(child)) => GalleryChild::Current(child),
                Ok(None) => GalleryChild::Missing {
                    id: child_id.clone(),
                },
                Err(e) => {
                    warn!(id, child = %child_id, error = %e, "gallery child unreadable");
                    GalleryChild::Missing {
                        id: child_id.clone(),
                    }
                }
            })
            .collect();

        Ok(GalleryView { record, children })
    }

    /// Full blob of an active record, if one is stored.
    pub fn content(&self, id: &str) -> VaultResult<Option<(MediaRecord, Vec<u8>)>> {
        let _guard = self.locks.acquire(id);
        let Some(record) = self.active(id)? else {
            return Ok(None);
        };
        Ok(self.blobs.read_all(&record)?.map(|bytes| (record, bytes)))
    }

    /// Opens the blob of an active record for positioned reads.
    pub fn open_stream(&self, id: &str) -> VaultResult<Option<BlobStream>> {
        let _guard = self.locks.acquire(id);
        let Some(record) = self.active(id)? else {
            return Ok(None);
        };
        Ok(self
            .blobs
            .read_seekable(&record)?
            .map(|blob| BlobStream { record, blob }))
    }

    /// Thumbnail bytes for an active record, or the fallback icon for non-images.
    pub fn thumbnail(&self, id: &str, size: ThumbnailSize) -> VaultResult<Option<Vec<u8>>> {
        let Some(record) = self.active(id)? else {
            return Ok(None);
        };
        Ok(self.blobs.thumbnail(&record, size)?)
    }

    pub fn list_active(&self) -> VaultResult<Vec<MediaRecord>> {
        self.index.list_active()
    }

    pub fn list_trash(&self) -> VaultResult<Vec<MediaRecord>> {
        self.index.list_trashed()
    }

    /// Purges archived blobs, then drops every trashed record from the index.
    ///
    /// Returns the number of records purged.
    pub fn empty_trash(&self, acting_user: &str) -> VaultResult<usize> {
        self.blobs
            .empty_trash()
            .map_err(|e| VaultError::StorageService(e.to_string()))?;

        let mut purged = 0;
        for record in self.index.list_trashed()? {
            if self.purge_row(record.id_str())? {
                purged += 1;
            }
        }

        info!(purged, user = acting_user, "trash emptied");
        Ok(purged)
    }

    pub fn search(&self, query: &SearchQuery, acting_user: &str) -> VaultResult<Vec<MediaRecord>> {
        self.index.search(query, acting_user)
    }

    /// Drops a trashed row under its id lock. A row restored by a failed delete in the
    /// meantime is kept.
    fn purge_row(&self, id: &str) -> VaultResult<bool> {
        let _guard = self.locks.acquire(id);
        match self.index.get(id)? {
            Some(record) if !record.activated => self.index.delete(id),
            Some(_) => {
                debug!(id, "record restored before purge, keeping it");
                Ok(false)
            }
            None => Ok(false),
        }
    }

    fn require(&self, id: &str) -> VaultResult<MediaRecord> {
        self.index
            .get(id)?
            .ok_or_else(|| VaultError::NotFound(format!("record {}", id)))
    }

    fn active(&self, id: &str) -> VaultResult<Option<MediaRecord>> {
        Ok(self.index.get(id)?.filter(|r| r.activated))
    }
}

/// Fills MIME type, size and image dimensions from the payload.
fn describe_payload(record: &mut MediaRecord, bytes: Option<&[u8]>) -> VaultResult<()> {
    let Some(bytes) = bytes else {
        record.size = record
            .content
            .as_deref()
            .map_or(0, |c| c.chars().count() as u64);
        return Ok(());
    };

    let inspection = inspect(bytes);
    let mime = record.mime_type.trim();
    if mime.is_empty() || mime.eq_ignore_ascii_case(DEFAULT_MIME_TYPE) {
        record.mime_type = inspection
            .mime_type
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_owned());
    }
    PathLayout::storage_category(&record.mime_type)?;

    record.size = bytes.len() as u64;
    if let Some((width, height)) = inspection.dimensions {
        record.set_prop("width", PropValue::Number(f64::from(width)));
        record.set_prop("height", PropValue::Number(f64::from(height)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::InMemoryIndex;
    use chrono::NaiveDate;
    use std::io::Read;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;
    use vault_files::{FilesError, FilesResult, FixedClock, LocalBlobStore, ThumbnailSpec};

    /// Blob store that can be told to fail saves or deletes.
    struct FlakyBlobStore {
        inner: LocalBlobStore,
        fail_save: AtomicBool,
        fail_delete: AtomicBool,
    }

    impl BlobStore for FlakyBlobStore {
        fn save(&self, bytes: &[u8], record: MediaRecord) -> FilesResult<MediaRecord> {
            if self.fail_save.load(Ordering::SeqCst) {
                return Err(FilesError::Io(std::io::Error::other("disk full")));
            }
            self.inner.save(bytes, record)
        }

        fn read_all(&self, record: &MediaRecord) -> FilesResult<Option<Vec<u8>>> {
            self.inner.read_all(record)
        }

        fn read_seekable(
            &self,
            record: &MediaRecord,
        ) -> FilesResult<Option<Box<dyn SeekableBlob>>> {
            self.inner.read_seekable(record)
        }

        fn delete(&self, record: &MediaRecord) -> FilesResult<()> {
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(FilesError::Io(std::io::Error::other("trash unavailable")));
            }
            self.inner.delete(record)
        }

        fn thumbnail(
            &self,
            record: &MediaRecord,
            size: ThumbnailSize,
        ) -> FilesResult<Option<Vec<u8>>> {
            self.inner.thumbnail(record, size)
        }

        fn empty_trash(&self) -> FilesResult<()> {
            self.inner.empty_trash()
        }

        fn mode(&self) -> StorageMode {
            StorageMode::Local
        }
    }

    /// Index whose writes can be switched off.
    #[derive(Default)]
    struct ReadOnlyToggleIndex {
        inner: InMemoryIndex,
        reject_writes: AtomicBool,
    }

    impl ReadOnlyToggleIndex {
        fn check(&self) -> VaultResult<()> {
            if self.reject_writes.load(Ordering::SeqCst) {
                return Err(VaultError::IndexWrite("index offline".into()));
            }
            Ok(())
        }
    }

    impl MetadataIndex for ReadOnlyToggleIndex {
        fn save(&self, record: MediaRecord) -> VaultResult<MediaRecord> {
            self.check()?;
            self.inner.save(record)
        }

        fn update(&self, record: &MediaRecord) -> VaultResult<MediaRecord> {
            self.check()?;
            self.inner.update(record)
        }

        fn get(&self, id: &str) -> VaultResult<Option<MediaRecord>> {
            self.inner.get(id)
        }

        fn delete(&self, id: &str) -> VaultResult<bool> {
            self.check()?;
            self.inner.delete(id)
        }

        fn list_active(&self) -> VaultResult<Vec<MediaRecord>> {
            self.inner.list_active()
        }

        fn list_trashed(&self) -> VaultResult<Vec<MediaRecord>> {
            self.inner.list_trashed()
        }

        fn search(&self, query: &SearchQuery, acting_user: &str) -> VaultResult<Vec<MediaRecord>> {
            self.inner.search(query, acting_user)
        }
    }

    struct Fixture {
        _temp: TempDir,
        vault: VaultService,
        blobs: Arc<FlakyBlobStore>,
        index: Arc<ReadOnlyToggleIndex>,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let cfg = CoreConfig::local(temp.path());
        let clock = Arc::new(FixedClock(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
        let blobs = Arc::new(FlakyBlobStore {
            inner: LocalBlobStore::local(&temp.path().join("blobs"), ThumbnailSpec::default(), clock)
                .unwrap(),
            fail_save: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        });
        let index = Arc::new(ReadOnlyToggleIndex::default());
        let vault = VaultService::new(&cfg, blobs.clone(), index.clone());
        Fixture {
            _temp: temp,
            vault,
            blobs,
            index,
        }
    }

    fn text_record(title: &str) -> MediaRecord {
        MediaRecord::new(title, format!("{}.txt", title), "text/plain")
    }

    #[test]
    fn test_create_round_trip() {
        let fx = fixture();
        let created = fx
            .vault
            .create(text_record("notes"), Some(b"hello vault".as_slice()), "alice")
            .unwrap();

        let id = created.id.clone().unwrap();
        assert_eq!(created.logical_path.as_deref(), Some("/text/20240301"));
        assert_eq!(created.size, 11);
        assert!(created.activated);
        assert_eq!(created.created_by.as_deref(), Some("alice"));
        assert_eq!(fx.vault.get(&id).unwrap(), Some(created.clone()));

        let (_, bytes) = fx.vault.content(&id).unwrap().unwrap();
        assert_eq!(bytes, b"hello vault");
    }

    #[test]
    fn test_create_without_bytes_leaves_no_blob() {
        let fx = fixture();
        let mut record = MediaRecord::new("memo", "memo.html", "text/html");
        record.content = Some("<p>héllo</p>".into());

        let created = fx.vault.create(record, Some(b"".as_slice()), "alice").unwrap();
        assert!(created.logical_path.is_none());
        assert_eq!(created.size, 12);
        assert!(fx.vault.content(created.id_str()).unwrap().is_none());
        assert!(fx.vault.open_stream(created.id_str()).unwrap().is_none());
    }

    #[test]
    fn test_create_detects_mime_and_rejects_malformed() {
        let fx = fixture();
        let pdf = MediaRecord::new("scan", "scan.bin", "");
        let created = fx
            .vault
            .create(pdf, Some(b"%PDF-1.7\n%binary".as_slice()), "alice")
            .unwrap();
        assert_eq!(created.mime_type, "application/pdf");
        assert_eq!(created.logical_path.as_deref(), Some("/application/20240301"));

        let bad = MediaRecord::new("bad", "bad", "nonsense");
        assert!(matches!(
            fx.vault.create(bad, Some(b"xyz".as_slice()), "alice"),
            Err(VaultError::InvalidMimeType(_))
        ));
        assert!(fx.vault.list_active().unwrap().len() == 1);
    }

    #[test]
    fn test_create_rejects_trash_category() {
        let fx = fixture();
        let sneaky = MediaRecord::new("sneaky", "sneaky.bin", "trash/x-custom");
        assert!(matches!(
            fx.vault.create(sneaky, Some(b"live bytes".as_slice()), "alice"),
            Err(VaultError::InvalidMimeType(m)) if m == "trash/x-custom"
        ));
        assert!(fx.vault.list_active().unwrap().is_empty());

        let kept = fx.vault.create(text_record("kept"), Some(b"kept".as_slice()), "alice").unwrap();
        let gone = fx.vault.create(text_record("gone"), Some(b"gone".as_slice()), "alice").unwrap();
        fx.vault.delete(gone.id_str(), "alice").unwrap();
        fx.vault.empty_trash("alice").unwrap();

        let (_, bytes) = fx.vault.content(kept.id_str()).unwrap().unwrap();
        assert_eq!(bytes, b"kept");
    }

    #[test]
    fn test_create_index_failure_stores_nothing() {
        let fx = fixture();
        fx.index.reject_writes.store(true, Ordering::SeqCst);

        let result = fx.vault.create(text_record("a"), Some(b"bytes".as_slice()), "alice");
        assert!(matches!(result, Err(VaultError::IndexWrite(_))));

        fx.index.reject_writes.store(false, Ordering::SeqCst);
        assert!(fx.vault.list_active().unwrap().is_empty());
    }

    #[test]
    fn test_create_blob_failure_leaves_headless_record() {
        let fx = fixture();
        fx.blobs.fail_save.store(true, Ordering::SeqCst);

        let created = fx
            .vault
            .create(text_record("a"), Some(b"bytes".as_slice()), "alice")
            .unwrap();
        assert!(created.id.is_some());
        assert!(created.logical_path.is_none());
        assert!(fx.vault.content(created.id_str()).unwrap().is_none());

        let active = fx.vault.list_active().unwrap();
        assert_eq!(active.len(), 1);
        assert!(active[0].logical_path.is_none());
    }

    #[test]
    fn test_update_preserves_identity_and_path() {
        let fx = fixture();
        let created = fx
            .vault
            .create(text_record("v1"), Some(b"first".as_slice()), "alice")
            .unwrap();
        let id = created.id.clone().unwrap();

        let mut fields = text_record("v2");
        fields.logical_path = Some("/elsewhere".into());
        let updated = fx
            .vault
            .update(&id, fields, Some(b"second version".as_slice()), "bob")
            .unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.title, "v2");
        assert_eq!(updated.logical_path, created.logical_path);
        assert_eq!(updated.created_by.as_deref(), Some("alice"));
        assert_eq!(updated.creation_date, created.creation_date);
        assert_eq!(updated.modified_by.as_deref(), Some("bob"));

        let (_, bytes) = fx.vault.content(&id).unwrap().unwrap();
        assert_eq!(bytes, b"second version");
    }

    #[test]
    fn test_update_without_bytes_drops_blob() {
        let fx = fixture();
        let created = fx
            .vault
            .create(text_record("a"), Some(b"payload".as_slice()), "alice")
            .unwrap();
        let id = created.id.clone().unwrap();

        let mut fields = text_record("a");
        fields.content = Some("inline now".into());
        let updated = fx.vault.update(&id, fields, None, "alice").unwrap();

        assert!(updated.logical_path.is_none());
        assert_eq!(updated.size, 10);
        assert!(fx.vault.content(&id).unwrap().is_none());
    }

    #[test]
    fn test_update_unknown_id_is_not_found() {
        let fx = fixture();
        assert!(matches!(
            fx.vault.update("missing", text_record("x"), None, "alice"),
            Err(VaultError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_moves_record_to_trash() {
        let fx = fixture();
        let created = fx
            .vault
            .create(text_record("a"), Some(b"payload".as_slice()), "alice")
            .unwrap();
        let id = created.id.clone().unwrap();

        let trashed = fx.vault.delete(&id, "bob").unwrap();
        assert!(!trashed.activated);
        assert!(trashed.logical_path.is_none());

        assert!(fx.vault.list_active().unwrap().is_empty());
        assert_eq!(fx.vault.list_trash().unwrap().len(), 1);
        assert!(fx.blobs.inner.read_all(&created).unwrap().is_none());
        assert!(fx.vault.content(&id).unwrap().is_none());

        // Repeating the delete is harmless.
        assert!(!fx.vault.delete(&id, "bob").unwrap().activated);
    }

    #[test]
    fn test_delete_compensates_when_blob_cannot_be_archived() {
        let fx = fixture();
        let created = fx
            .vault
            .create(text_record("a"), Some(b"payload".as_slice()), "alice")
            .unwrap();
        let id = created.id.clone().unwrap();
        fx.blobs.fail_delete.store(true, Ordering::SeqCst);

        let result = fx.vault.delete(&id, "bob");
        assert!(matches!(result, Err(VaultError::StorageService(_))));

        let record = fx.vault.get(&id).unwrap().unwrap();
        assert!(record.activated);
        assert_eq!(fx.vault.list_active().unwrap().len(), 1);
        assert!(fx.vault.list_trash().unwrap().is_empty());
        assert!(fx.vault.content(&id).unwrap().is_some());
    }

    #[test]
    fn test_delete_missing_blob_is_storage_error_and_restores() {
        let fx = fixture();
        let created = fx
            .vault
            .create(text_record("a"), Some(b"payload".as_slice()), "alice")
            .unwrap();
        let id = created.id.clone().unwrap();
        fx.blobs.inner.delete(&created).unwrap();

        assert!(matches!(
            fx.vault.delete(&id, "bob"),
            Err(VaultError::StorageService(_))
        ));
        assert!(fx.vault.get(&id).unwrap().unwrap().activated);
    }

    #[test]
    fn test_update_trashed_record_is_rejected() {
        let fx = fixture();
        let created = fx.vault.create(text_record("a"), None, "alice").unwrap();
        let id = created.id.clone().unwrap();
        fx.vault.delete(&id, "alice").unwrap();

        assert!(matches!(
            fx.vault.update(&id, text_record("b"), None, "alice"),
            Err(VaultError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_gallery_keeps_missing_children() {
        let fx = fixture();
        let child = fx.vault.create(text_record("child"), None, "alice").unwrap();
        let child_id = child.id.clone().unwrap();

        let mut gallery = text_record("album");
        gallery.children = vec![child_id.clone(), "vanished".into()];
        let gallery = fx.vault.create(gallery, None, "alice").unwrap();

        let mut renamed = text_record("child renamed");
        renamed.children.clear();
        fx.vault.update(&child_id, renamed, None, "alice").unwrap();

        let view = fx.vault.read(gallery.id_str()).unwrap();
        assert_eq!(view.children.len(), 2);
        match &view.children[0] {
            GalleryChild::Current(current) => assert_eq!(current.title, "child renamed"),
            other => panic!("expected resolved child, got {:?}", other),
        }
        assert_eq!(
            view.children[1],
            GalleryChild::Missing {
                id: "vanished".into()
            }
        );
        assert_eq!(view.children[1].id(), "vanished");
    }

    #[test]
    fn test_open_stream_reads_blob() {
        let fx = fixture();
        let created = fx
            .vault
            .create(text_record("a"), Some(b"0123456789".as_slice()), "alice")
            .unwrap();

        let mut stream = fx.vault.open_stream(created.id_str()).unwrap().unwrap();
        assert_eq!(stream.blob.len(), 10);
        let mut out = String::new();
        stream.blob.read_to_string(&mut out).unwrap();
        assert_eq!(out, "0123456789");
    }

    #[test]
    fn test_thumbnail_fallback_for_documents() {
        let fx = fixture();
        let created = fx
            .vault
            .create(
                MediaRecord::new("scan", "scan.pdf", "application/pdf"),
                Some(b"%PDF-1.7".as_slice()),
                "alice",
            )
            .unwrap();

        let icon = fx
            .vault
            .thumbnail(created.id_str(), ThumbnailSize::Small)
            .unwrap();
        assert!(icon.is_some_and(|bytes| !bytes.is_empty()));
        assert!(fx
            .vault
            .thumbnail("unknown", ThumbnailSize::Small)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_unrenderable_image_gets_icon_thumbnail() {
        let fx = fixture();
        let created = fx
            .vault
            .create(
                MediaRecord::new("broken", "broken.png", "image/png"),
                Some(b"not a png".as_slice()),
                "alice",
            )
            .unwrap();
        assert!(created.logical_path.is_some());

        let icon = fx
            .vault
            .thumbnail(created.id_str(), ThumbnailSize::Small)
            .unwrap();
        assert!(icon.is_some_and(|bytes| !bytes.is_empty()));
    }

    #[test]
    fn test_empty_trash_purges_trashed_records() {
        let fx = fixture();
        let keep = fx.vault.create(text_record("keep"), Some(b"k".as_slice()), "alice").unwrap();
        let gone = fx.vault.create(text_record("gone"), Some(b"g".as_slice()), "alice").unwrap();
        fx.vault.delete(gone.id_str(), "alice").unwrap();

        assert_eq!(fx.vault.empty_trash("alice").unwrap(), 1);
        assert!(fx.vault.list_trash().unwrap().is_empty());
        assert!(fx.vault.get(gone.id_str()).unwrap().is_none());
        assert_eq!(fx.vault.list_active().unwrap(), vec![keep]);
        assert_eq!(fx.vault.empty_trash("alice").unwrap(), 0);
    }

    #[test]
    fn test_purge_waits_for_delete_and_keeps_restored_record() {
        let fx = fixture();
        let record = fx.vault.create(text_record("racy"), Some(b"r".as_slice()), "alice").unwrap();
        let id = record.id_str().to_owned();

        // A delete in flight: flag flipped, blob archive not yet attempted.
        let guard = fx.vault.locks.acquire(&id);
        let mut trashed = record.clone();
        trashed.activated = false;
        fx.index.update(&trashed).unwrap();

        let finished = AtomicBool::new(false);
        std::thread::scope(|scope| {
            let purge = scope.spawn(|| {
                let purged = fx.vault.purge_row(&id).unwrap();
                finished.store(true, Ordering::SeqCst);
                purged
            });

            std::thread::sleep(std::time::Duration::from_millis(50));
            assert!(!finished.load(Ordering::SeqCst));

            // The archive failed, so the delete restores the record before letting go.
            fx.index.update(&record).unwrap();
            drop(guard);

            assert!(!purge.join().unwrap());
        });

        let stored = fx.vault.get(&id).unwrap().unwrap();
        assert!(stored.activated);
        assert!(fx.vault.content(&id).unwrap().is_some());
    }

    #[test]
    fn test_search_skips_trashed_records() {
        let fx = fixture();
        fx.vault.create(text_record("report 2023"), None, "alice").unwrap();
        let old = fx.vault.create(text_record("report 2022"), None, "alice").unwrap();
        fx.vault.delete(old.id_str(), "alice").unwrap();

        let hits = fx.vault.search(&SearchQuery::text("report"), "bob").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "report 2023");
    }

    #[test]
    fn test_open_wires_json_index_and_local_blobs() {
        let temp = TempDir::new().unwrap();
        let cfg = CoreConfig::local(temp.path());
        let vault = VaultService::open(&cfg).unwrap();
        let created = vault.create(text_record("a"), Some(b"abc".as_slice()), "alice").unwrap();

        let reopened = VaultService::open(&cfg).unwrap();
        assert_eq!(reopened.get(created.id_str()).unwrap(), Some(created));
        assert_eq!(reopened.storage_mode(), StorageMode::Local);
        assert_eq!(reopened.stream_buffer(), 8192);
    }
}
