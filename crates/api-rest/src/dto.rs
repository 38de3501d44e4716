//! Request and response bodies.

use crate::error::ApiError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use vault_core::{
    GalleryChild, GalleryView, MediaRecord, NonEmptyText, Prop, PropValue, DEFAULT_MIME_TYPE,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// A named prop. Exactly one of `text`, `date_time` and `number` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PropDto {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<f64>,
}

impl From<&Prop> for PropDto {
    fn from(prop: &Prop) -> Self {
        let mut dto = PropDto {
            name: prop.name.clone(),
            text: None,
            date_time: None,
            number: None,
        };
        match &prop.value {
            PropValue::Text(text) => dto.text = Some(text.clone()),
            PropValue::DateTime(at) => dto.date_time = Some(*at),
            PropValue::Number(n) => dto.number = Some(*n),
        }
        dto
    }
}

impl TryFrom<PropDto> for Prop {
    type Error = ApiError;

    fn try_from(dto: PropDto) -> Result<Self, Self::Error> {
        let value = match (dto.text, dto.date_time, dto.number) {
            (Some(text), None, None) => PropValue::Text(text),
            (None, Some(at), None) => PropValue::DateTime(at),
            (None, None, Some(n)) => PropValue::Number(n),
            _ => {
                return Err(ApiError::bad_request(format!(
                    "prop '{}' must carry exactly one of text, date_time, number",
                    dto.name
                )))
            }
        };
        Ok(Prop {
            name: dto.name,
            value,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RecordDto {
    pub id: String,
    pub title: String,
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    pub content: Option<String>,
    pub activated: bool,
    pub logical_path: Option<String>,
    pub tags: Vec<String>,
    pub children: Vec<String>,
    pub props: Vec<PropDto>,
    pub created_by: Option<String>,
    pub creation_date: Option<DateTime<Utc>>,
    pub modified_by: Option<String>,
    pub modification_date: Option<DateTime<Utc>>,
}

impl From<MediaRecord> for RecordDto {
    fn from(record: MediaRecord) -> Self {
        Self {
            props: record.props.iter().map(PropDto::from).collect(),
            id: record.id.unwrap_or_default(),
            title: record.title,
            filename: record.filename,
            mime_type: record.mime_type,
            size: record.size,
            content: record.content,
            activated: record.activated,
            logical_path: record.logical_path,
            tags: record.tags.into_iter().map(NonEmptyText::into_inner).collect(),
            children: record.children,
            created_by: record.created_by,
            creation_date: record.creation_date,
            modified_by: record.modified_by,
            modification_date: record.modification_date,
        }
    }
}

/// Caller-editable fields of a record, sent as the `metadata` part of an upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RecordInput {
    pub title: String,
    #[serde(default)]
    pub filename: Option<String>,
    /// Detected from the uploaded bytes when omitted.
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub props: Vec<PropDto>,
}

impl RecordInput {
    /// Builds an unsaved record. `upload_name` and `upload_type` come from the file part.
    pub fn into_record(
        self,
        upload_name: Option<&str>,
        upload_type: Option<&str>,
    ) -> Result<MediaRecord, ApiError> {
        let title = self.title.trim().to_owned();
        if title.is_empty() {
            return Err(ApiError::bad_request("title is required"));
        }

        let filename = self
            .filename
            .or_else(|| upload_name.map(str::to_owned))
            .unwrap_or_else(|| title.clone());
        let mime_type = self
            .mime_type
            .or_else(|| upload_type.map(str::to_owned))
            .unwrap_or_else(|| {
                if self.content.is_some() {
                    "text/plain".to_owned()
                } else {
                    DEFAULT_MIME_TYPE.to_owned()
                }
            });

        let mut record = MediaRecord::new(title, filename, mime_type);
        record.content = self.content;
        record.children = self.children;
        for tag in self.tags {
            let tag = NonEmptyText::new(&tag)
                .map_err(|_| ApiError::bad_request("tags cannot be empty"))?;
            record.tags.insert(tag);
        }
        for prop in self.props {
            let prop = Prop::try_from(prop)?;
            record.set_prop(prop.name, prop.value);
        }
        Ok(record)
    }
}

/// Multipart form accepted by create and update.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    pub metadata: RecordInput,
    #[schema(value_type = Option<String>, format = Binary)]
    pub file: Option<Vec<u8>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GalleryChildDto {
    pub id: String,
    /// `None` when the child no longer exists in the index.
    pub record: Option<RecordDto>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileRes {
    pub record: RecordDto,
    pub children: Vec<GalleryChildDto>,
}

impl From<GalleryView> for FileRes {
    fn from(view: GalleryView) -> Self {
        Self {
            record: view.record.into(),
            children: view
                .children
                .into_iter()
                .map(|child| match child {
                    GalleryChild::Current(record) => GalleryChildDto {
                        id: record.id_str().to_owned(),
                        record: Some(record.into()),
                    },
                    GalleryChild::Missing { id } => GalleryChildDto { id, record: None },
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListFilesRes {
    pub files: Vec<RecordDto>,
}

impl From<Vec<MediaRecord>> for ListFilesRes {
    fn from(records: Vec<MediaRecord>) -> Self {
        Self {
            files: records.into_iter().map(RecordDto::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EmptyTrashRes {
    pub purged: usize,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Free text matched against title, filename, content and tags.
    pub q: Option<String>,
    pub limit: Option<usize>,
    /// MIME type prefix, e.g. `image/`.
    pub mime: Option<String>,
    /// Comma-separated tags that must all be present.
    pub tag: Option<String>,
    pub created_by: Option<String>,
}
