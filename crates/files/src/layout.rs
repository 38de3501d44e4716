//! Deterministic placement of blobs on a backend.
//!
//! A record's blob directory is derived once, from the top-level MIME category and the date
//! of the first successful save, and then travels with the record as `logical_path`. Later
//! saves reuse it verbatim so that replacing a binary overwrites the existing bytes instead of
//! orphaning them under a new date.

use crate::constants::{DATE_DIR_FORMAT, TRASH_DIR};
use crate::thumbnail::ThumbnailSize;
use crate::{FilesError, FilesResult};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use vault_types::MediaRecord;

/// Source of "today" for path derivation.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Wall-clock date in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// A clock pinned to one date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Computes logical paths and the storage keys that hang off them.
#[derive(Clone)]
pub struct PathLayout {
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for PathLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathLayout")
            .field("today", &self.clock.today())
            .finish()
    }
}

impl PathLayout {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Returns the record's logical path, deriving `/<category>/<YYYYMMDD>` if none is set.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidMimeType`] if a path has to be derived and `mime_type`
    /// contains no `/`.
    pub fn compute_path(&self, record: &MediaRecord) -> FilesResult<String> {
        Self::compute_path_on(record, self.clock.today())
    }

    /// Same as [`Self::compute_path`] with an explicit date.
    pub fn compute_path_on(record: &MediaRecord, date: NaiveDate) -> FilesResult<String> {
        if let Some(existing) = &record.logical_path {
            return Ok(existing.clone());
        }

        let category = Self::storage_category(&record.mime_type)?;
        Ok(format!("/{}/{}", category, date.format(DATE_DIR_FORMAT)))
    }

    /// Lowercased top-level MIME category used as the first path segment.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidMimeType`] if `mime_type` has no `/`, an empty category,
    /// or a category that would land inside the trash subtree.
    pub fn storage_category(mime_type: &str) -> FilesResult<String> {
        let category = mime_type
            .split_once('/')
            .map(|(category, _)| category.trim().to_ascii_lowercase())
            .filter(|category| !category.is_empty())
            .ok_or_else(|| FilesError::InvalidMimeType(mime_type.to_owned()))?;

        if category == TRASH_DIR.trim_start_matches('/') {
            return Err(FilesError::InvalidMimeType(mime_type.to_owned()));
        }
        Ok(category)
    }

    /// Storage key of the original blob: `<dir>/<id>`.
    pub fn blob_key(dir: &str, id: &str) -> String {
        format!("{}/{}", dir.trim_end_matches('/'), id)
    }

    /// Storage key of a thumbnail variant: `<dir>/<id>-<size>`.
    pub fn thumbnail_key(dir: &str, id: &str, size: ThumbnailSize) -> String {
        format!("{}-{}", Self::blob_key(dir, id), size.suffix())
    }

    /// Every key a record may own under `dir`: the blob followed by all thumbnail variants.
    pub fn record_keys(dir: &str, id: &str) -> Vec<String> {
        std::iter::once(Self::blob_key(dir, id))
            .chain(
                ThumbnailSize::ALL
                    .iter()
                    .map(|size| Self::thumbnail_key(dir, id, *size)),
            )
            .collect()
    }

    /// Storage key of a trash archive: `/trash/<id>`.
    pub fn trash_key(id: &str) -> String {
        Self::blob_key(TRASH_DIR, id)
    }
}

/// Rejects keys that could escape the storage root.
///
/// Keys are absolute (`/`-prefixed), `/`-separated and may not contain empty, `.` or `..`
/// segments or backslashes.
pub(crate) fn validate_key(key: &str) -> FilesResult<&str> {
    let relative = key
        .strip_prefix('/')
        .ok_or_else(|| FilesError::InvalidPath(format!("key must be absolute: {}", key)))?;

    if relative.is_empty() || relative.contains('\\') {
        return Err(FilesError::InvalidPath(key.to_owned()));
    }

    if relative
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(FilesError::InvalidPath(key.to_owned()));
    }

    Ok(relative)
}
