//! The persisted metadata unit.

use crate::NonEmptyText;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// MIME type assumed when a caller supplies none and detection fails.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Metadata for one vault entry.
///
/// A record owns at most one binary blob. `logical_path` is the backend-relative directory of
/// that blob and is `None` exactly when no blob exists; the blob itself lives at
/// `<logical_path>/<id>`.
///
/// `activated == false` means the record is in the trash: it is still indexed, but its
/// binary has been archived under the trash root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    /// Assigned by the metadata index on first save; immutable afterwards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub title: String,

    pub filename: String,

    pub mime_type: String,

    /// Bytes of the bound blob, or character count of inline `content`.
    #[serde(default)]
    pub size: u64,

    /// Inline textual payload for records without a blob (plain text, HTML).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default = "default_activated")]
    pub activated: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_path: Option<String>,

    #[serde(default)]
    pub tags: BTreeSet<NonEmptyText>,

    /// Ids of gallery members, in display order.
    #[serde(default)]
    pub children: Vec<String>,

    #[serde(default)]
    pub props: Vec<Prop>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification_date: Option<DateTime<Utc>>,
}

fn default_activated() -> bool {
    true
}

impl MediaRecord {
    /// Creates an unsaved, active record with no blob bound.
    pub fn new(
        title: impl Into<String>,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            title: title.into(),
            filename: filename.into(),
            mime_type: mime_type.into(),
            size: 0,
            content: None,
            activated: true,
            logical_path: None,
            tags: BTreeSet::new(),
            children: Vec::new(),
            props: Vec::new(),
            created_by: None,
            creation_date: None,
            modified_by: None,
            modification_date: None,
        }
    }

    /// Returns the id, or an empty string for records the index has not seen yet.
    pub fn id_str(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    /// Top-level MIME category (`image` for `image/png`), if the type is well formed.
    pub fn mime_category(&self) -> Option<&str> {
        self.mime_type
            .split_once('/')
            .map(|(category, _)| category)
            .filter(|category| !category.is_empty())
    }

    pub fn is_image(&self) -> bool {
        self.mime_category()
            .is_some_and(|c| c.eq_ignore_ascii_case("image"))
    }

    /// A gallery is any record referencing other records.
    pub fn is_gallery(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn has_blob(&self) -> bool {
        self.logical_path.is_some()
    }

    /// Looks up a prop by name.
    pub fn prop(&self, name: &str) -> Option<&PropValue> {
        self.props.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    /// Inserts or replaces a prop by name, keeping the original position on replace.
    pub fn set_prop(&mut self, name: impl Into<String>, value: PropValue) {
        let name = name.into();
        match self.props.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.value = value,
            None => self.props.push(Prop { name, value }),
        }
    }
}

/// Named auxiliary metadata, extracted from the binary or supplied by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prop {
    pub name: String,
    pub value: PropValue,
}

/// A prop value is exactly one of text, date-time or number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum PropValue {
    Text(String),
    DateTime(DateTime<Utc>),
    Number(f64),
}
