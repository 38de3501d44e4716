use super::{run_search, sort_recent_first, MetadataIndex, SearchQuery};
use crate::constants::RECORD_FILE_NAME;
use crate::{VaultError, VaultResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use vault_types::MediaRecord;
use vault_uuid::ShardableUuid;

/// Index persisted as one JSON document per record.
///
/// Records live at `<root>/<s1>/<s2>/<id>/record.json`, where `s1`/`s2` are the first two
/// pairs of hex characters of the id. Ids must be canonical 32-character lowercase hex.
#[derive(Debug, Clone)]
pub struct JsonFileIndex {
    root: PathBuf,
}

impl JsonFileIndex {
    /// Opens (creating if needed) an index rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> VaultResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            VaultError::IndexWrite(format!(
                "failed to create index directory {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_dir(&self, id: &ShardableUuid) -> PathBuf {
        id.sharded_dir(&self.root)
    }

    fn record_path(&self, id: &ShardableUuid) -> PathBuf {
        self.record_dir(id).join(RECORD_FILE_NAME)
    }

    fn write(&self, id: &ShardableUuid, record: &MediaRecord) -> VaultResult<()> {
        let dir = self.record_dir(id);
        fs::create_dir_all(&dir).map_err(|e| {
            VaultError::IndexWrite(format!("failed to create {}: {}", dir.display(), e))
        })?;

        let json = serde_json::to_string_pretty(record)
            .map_err(|e| VaultError::IndexWrite(format!("failed to serialize record: {}", e)))?;

        // Write-then-rename so a crash never leaves a truncated record behind.
        let path = dir.join(RECORD_FILE_NAME);
        let tmp = dir.join(format!("{}.tmp", RECORD_FILE_NAME));
        fs::write(&tmp, json).map_err(|e| {
            VaultError::IndexWrite(format!("failed to write {}: {}", tmp.display(), e))
        })?;
        fs::rename(&tmp, &path).map_err(|e| {
            VaultError::IndexWrite(format!("failed to replace {}: {}", path.display(), e))
        })?;
        Ok(())
    }

    fn read(&self, path: &Path) -> VaultResult<Option<MediaRecord>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(VaultError::IndexRead(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        serde_json::from_str(&contents).map(Some).map_err(|e| {
            VaultError::IndexRead(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Walks the sharded layout. Unreadable or malformed records are logged and skipped.
    fn all(&self) -> VaultResult<Vec<MediaRecord>> {
        let mut records = Vec::new();

        let s1_iter = match fs::read_dir(&self.root) {
            Ok(it) => it,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(records),
            Err(e) => {
                return Err(VaultError::IndexRead(format!(
                    "failed to list {}: {}",
                    self.root.display(),
                    e
                )))
            }
        };

        for s1 in s1_iter.flatten() {
            let s1_path = s1.path();
            if !s1_path.is_dir() {
                continue;
            }
            let Ok(s2_iter) = fs::read_dir(&s1_path) else {
                continue;
            };

            for s2 in s2_iter.flatten() {
                let s2_path = s2.path();
                if !s2_path.is_dir() {
                    continue;
                }
                let Ok(id_iter) = fs::read_dir(&s2_path) else {
                    continue;
                };

                for id_ent in id_iter.flatten() {
                    let record_path = id_ent.path().join(RECORD_FILE_NAME);
                    if !record_path.is_file() {
                        continue;
                    }
                    match self.read(&record_path) {
                        Ok(Some(record)) => records.push(record),
                        Ok(None) => {}
                        Err(e) => warn!("skipping unreadable record: {}", e),
                    }
                }
            }
        }

        Ok(records)
    }

    fn collect(&self, activated: bool) -> VaultResult<Vec<MediaRecord>> {
        let mut selected: Vec<MediaRecord> = self
            .all()?
            .into_iter()
            .filter(|r| r.activated == activated)
            .collect();
        sort_recent_first(&mut selected);
        Ok(selected)
    }
}

fn parse_id(id: &str) -> VaultResult<ShardableUuid> {
    ShardableUuid::parse(id).map_err(|e| VaultError::InvalidInput(e.to_string()))
}

impl MetadataIndex for JsonFileIndex {
    fn save(&self, mut record: MediaRecord) -> VaultResult<MediaRecord> {
        let id = match record.id.as_deref() {
            Some(id) => parse_id(id)?,
            None => ShardableUuid::new(),
        };
        if self.record_path(&id).exists() {
            return Err(VaultError::IndexWrite(format!("record {} already exists", id)));
        }

        record.id = Some(id.to_string());
        self.write(&id, &record)?;
        debug!(id = %id, "indexed record");
        Ok(record)
    }

    fn update(&self, record: &MediaRecord) -> VaultResult<MediaRecord> {
        let id = record
            .id
            .as_deref()
            .ok_or_else(|| VaultError::InvalidInput("cannot update a record without id".into()))?;
        let id = parse_id(id)?;
        if !self.record_path(&id).is_file() {
            return Err(VaultError::NotFound(id.to_string()));
        }

        self.write(&id, record)?;
        Ok(record.clone())
    }

    fn get(&self, id: &str) -> VaultResult<Option<MediaRecord>> {
        // A non-canonical id cannot name any stored record.
        let Ok(id) = ShardableUuid::parse(id) else {
            return Ok(None);
        };
        self.read(&self.record_path(&id))
    }

    fn delete(&self, id: &str) -> VaultResult<bool> {
        let Ok(id) = ShardableUuid::parse(id) else {
            return Ok(false);
        };
        let dir = self.record_dir(&id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(VaultError::IndexWrite(format!(
                "failed to remove {}: {}",
                dir.display(),
                e
            ))),
        }
    }

    fn list_active(&self) -> VaultResult<Vec<MediaRecord>> {
        self.collect(true)
    }

    fn list_trashed(&self) -> VaultResult<Vec<MediaRecord>> {
        self.collect(false)
    }

    fn search(&self, query: &SearchQuery, acting_user: &str) -> VaultResult<Vec<MediaRecord>> {
        debug!(acting_user, text = ?query.text, "searching json index");
        Ok(run_search(self.all()?, query))
    }
}
