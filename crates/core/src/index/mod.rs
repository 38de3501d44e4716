//! The metadata index contract and its implementations.
//!
//! The vault treats the index as an opaque document store keyed by record id. It assigns ids,
//! persists records and answers listing and search queries; it knows nothing about blobs.

mod json_file;
mod memory;

pub use json_file::JsonFileIndex;
pub use memory::InMemoryIndex;

use crate::constants::DEFAULT_SEARCH_LIMIT;
use crate::VaultResult;
use std::cmp::Reverse;
use vault_types::MediaRecord;

/// CRUD and search over [`MediaRecord`]s.
pub trait MetadataIndex: Send + Sync {
    /// Persists a new record and returns it with its id set.
    ///
    /// A record arriving without an id is given a fresh one.
    fn save(&self, record: MediaRecord) -> VaultResult<MediaRecord>;

    /// Replaces an existing record. Fails with `NotFound` if the id is unknown.
    fn update(&self, record: &MediaRecord) -> VaultResult<MediaRecord>;

    fn get(&self, id: &str) -> VaultResult<Option<MediaRecord>>;

    /// Removes a record. Returns whether it existed.
    fn delete(&self, id: &str) -> VaultResult<bool>;

    /// Records with `activated == true`, most recently modified first.
    fn list_active(&self) -> VaultResult<Vec<MediaRecord>>;

    /// Records with `activated == false`, most recently modified first.
    fn list_trashed(&self) -> VaultResult<Vec<MediaRecord>>;

    fn search(&self, query: &SearchQuery, acting_user: &str) -> VaultResult<Vec<MediaRecord>>;
}

/// Free text plus structured filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Case-insensitive substring matched against title, filename, content and tags.
    pub text: Option<String>,
    pub limit: usize,
    /// Prefix of the MIME type, e.g. `image/` or `application/pdf`.
    pub mime_prefix: Option<String>,
    /// Every listed tag must be present.
    pub tags: Vec<String>,
    pub created_by: Option<String>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            text: None,
            limit: DEFAULT_SEARCH_LIMIT,
            mime_prefix: None,
            tags: Vec::new(),
            created_by: None,
        }
    }
}

impl SearchQuery {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Whether an active record satisfies every part of the query.
    pub fn matches(&self, record: &MediaRecord) -> bool {
        if !record.activated {
            return false;
        }

        if let Some(prefix) = &self.mime_prefix {
            if !record
                .mime_type
                .to_ascii_lowercase()
                .starts_with(&prefix.to_ascii_lowercase())
            {
                return false;
            }
        }

        if let Some(creator) = &self.created_by {
            if record.created_by.as_deref() != Some(creator.as_str()) {
                return false;
            }
        }

        let has_all_tags = self.tags.iter().all(|wanted| {
            record
                .tags
                .iter()
                .any(|tag| tag.as_str().eq_ignore_ascii_case(wanted.trim()))
        });
        if !has_all_tags {
            return false;
        }

        match self.text.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(text) => {
                let needle = text.to_lowercase();
                let contains = |haystack: &str| haystack.to_lowercase().contains(&needle);
                contains(&record.title)
                    || contains(&record.filename)
                    || record.content.as_deref().is_some_and(contains)
                    || record.tags.iter().any(|tag| contains(tag.as_str()))
            }
        }
    }
}

/// Orders records most recently modified first, ties broken by id.
pub(crate) fn sort_recent_first(records: &mut [MediaRecord]) {
    records.sort_by(|a, b| {
        Reverse(a.modification_date)
            .cmp(&Reverse(b.modification_date))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Shared search tail: filter, order and truncate.
pub(crate) fn run_search(
    records: impl IntoIterator<Item = MediaRecord>,
    query: &SearchQuery,
) -> Vec<MediaRecord> {
    let mut hits: Vec<MediaRecord> = records.into_iter().filter(|r| query.matches(r)).collect();
    sort_recent_first(&mut hits);
    hits.truncate(query.limit);
    hits
}
