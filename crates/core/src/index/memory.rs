use super::{run_search, sort_recent_first, MetadataIndex, SearchQuery};
use crate::{VaultError, VaultResult};
use std::collections::BTreeMap;
use std::sync::RwLock;
use tracing::debug;
use vault_types::MediaRecord;
use vault_uuid::ShardableUuid;

/// Process-local index. Contents are lost on exit.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    records: RwLock<BTreeMap<String, MediaRecord>>,
}

fn poisoned_read<T>(_: T) -> VaultError {
    VaultError::IndexRead("index lock poisoned".into())
}

fn poisoned_write<T>(_: T) -> VaultError {
    VaultError::IndexWrite("index lock poisoned".into())
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn collect(&self, activated: bool) -> VaultResult<Vec<MediaRecord>> {
        let records = self.records.read().map_err(poisoned_read)?;
        let mut selected: Vec<MediaRecord> = records
            .values()
            .filter(|r| r.activated == activated)
            .cloned()
            .collect();
        sort_recent_first(&mut selected);
        Ok(selected)
    }
}

impl MetadataIndex for InMemoryIndex {
    fn save(&self, mut record: MediaRecord) -> VaultResult<MediaRecord> {
        let mut records = self.records.write().map_err(poisoned_write)?;

        let id = match record.id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => id.to_owned(),
            None => ShardableUuid::new().to_string(),
        };
        if records.contains_key(&id) {
            return Err(VaultError::IndexWrite(format!("record {} already exists", id)));
        }

        record.id = Some(id.clone());
        records.insert(id.clone(), record.clone());
        debug!(id = %id, "indexed record");
        Ok(record)
    }

    fn update(&self, record: &MediaRecord) -> VaultResult<MediaRecord> {
        let id = record
            .id
            .as_deref()
            .ok_or_else(|| VaultError::InvalidInput("cannot update a record without id".into()))?;

        let mut records = self.records.write().map_err(poisoned_write)?;
        match records.get_mut(id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(record.clone())
            }
            None => Err(VaultError::NotFound(id.to_owned())),
        }
    }

    fn get(&self, id: &str) -> VaultResult<Option<MediaRecord>> {
        let records = self.records.read().map_err(poisoned_read)?;
        Ok(records.get(id).cloned())
    }

    fn delete(&self, id: &str) -> VaultResult<bool> {
        let mut records = self.records.write().map_err(poisoned_write)?;
        Ok(records.remove(id).is_some())
    }

    fn list_active(&self) -> VaultResult<Vec<MediaRecord>> {
        self.collect(true)
    }

    fn list_trashed(&self) -> VaultResult<Vec<MediaRecord>> {
        self.collect(false)
    }

    fn search(&self, query: &SearchQuery, acting_user: &str) -> VaultResult<Vec<MediaRecord>> {
        debug!(acting_user, text = ?query.text, "searching in-memory index");
        let records = self.records.read().map_err(poisoned_read)?;
        Ok(run_search(records.values().cloned(), query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_assigns_canonical_id() {
        let index = InMemoryIndex::new();
        let saved = index
            .save(MediaRecord::new("a", "a.txt", "text/plain"))
            .unwrap();

        let id = saved.id.clone().unwrap();
        assert!(ShardableUuid::is_canonical(&id));
        assert_eq!(index.get(&id).unwrap(), Some(saved));
    }

    #[test]
    fn test_save_rejects_duplicate_id() {
        let index = InMemoryIndex::new();
        let saved = index
            .save(MediaRecord::new("a", "a.txt", "text/plain"))
            .unwrap();
        assert!(matches!(
            index.save(saved),
            Err(VaultError::IndexWrite(_))
        ));
    }

    #[test]
    fn test_update_and_delete() {
        let index = InMemoryIndex::new();
        let mut saved = index
            .save(MediaRecord::new("a", "a.txt", "text/plain"))
            .unwrap();

        saved.title = "renamed".into();
        index.update(&saved).unwrap();
        assert_eq!(index.get(saved.id_str()).unwrap().unwrap().title, "renamed");

        assert!(index.delete(saved.id_str()).unwrap());
        assert!(!index.delete(saved.id_str()).unwrap());
        assert!(matches!(index.update(&saved), Err(VaultError::NotFound(_))));
    }

    #[test]
    fn test_active_and_trashed_listings() {
        let index = InMemoryIndex::new();
        let live = index
            .save(MediaRecord::new("live", "live.txt", "text/plain"))
            .unwrap();
        let mut gone = index
            .save(MediaRecord::new("gone", "gone.txt", "text/plain"))
            .unwrap();
        gone.activated = false;
        index.update(&gone).unwrap();

        let active = index.list_active().unwrap();
        let trashed = index.list_trashed().unwrap();
        assert_eq!(active, vec![live]);
        assert_eq!(trashed, vec![gone]);

        let hits = index.search(&SearchQuery::text("gone"), "tester").unwrap();
        assert!(hits.is_empty());
    }
}
