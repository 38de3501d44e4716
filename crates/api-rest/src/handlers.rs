use crate::dto::{
    EmptyTrashRes, FileRes, HealthRes, ListFilesRes, RecordDto, RecordInput, SearchParams,
    UploadForm,
};
use crate::error::ApiError;
use crate::streaming::into_http_response;
use crate::AppState;
use axum::{
    extract::{Multipart, Path as AxumPath, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::io::Cursor;
use std::str::FromStr;
use vault_core::constants::DEFAULT_SEARCH_LIMIT;
use vault_core::{MediaRecord, SearchQuery, SeekableBlob, ThumbnailSize, VaultResult, VaultService};
use vault_range::{RangeRequest, RangeResponse, ResourceInfo};

/// Header naming the acting user. Authentication happens upstream.
pub const USER_HEADER: &str = "x-vault-user";

const ANONYMOUS_USER: &str = "anonymous";

fn acting_user(headers: &HeaderMap) -> String {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(ANONYMOUS_USER)
        .to_owned()
}

/// Runs a vault call on the blocking pool.
async fn run_blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&VaultService) -> VaultResult<T> + Send + 'static,
    T: Send + 'static,
{
    let vault = state.vault.clone();
    tokio::task::spawn_blocking(move || f(&vault))
        .await
        .map_err(|e| ApiError::internal(format!("vault task failed: {}", e)))?
        .map_err(ApiError::from)
}

/// A parsed create or update form.
struct Upload {
    record: MediaRecord,
    bytes: Option<Vec<u8>>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let mut metadata: Option<RecordInput> = None;
    let mut bytes = None;
    let mut upload_name = None;
    let mut upload_type = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "metadata" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("unreadable metadata: {}", e)))?;
                metadata = Some(
                    serde_json::from_str(&text)
                        .map_err(|e| ApiError::bad_request(format!("invalid metadata: {}", e)))?,
                );
            }
            "file" => {
                upload_name = field.file_name().map(str::to_owned);
                upload_type = field
                    .content_type()
                    .map(str::to_owned)
                    .filter(|t| t.contains('/'));
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("unreadable file: {}", e)))?;
                bytes = Some(data.to_vec());
            }
            other => tracing::debug!("ignoring multipart field '{}'", other),
        }
    }

    let metadata = metadata.ok_or_else(|| ApiError::bad_request("missing 'metadata' part"))?;
    let record = metadata.into_record(upload_name.as_deref(), upload_type.as_deref())?;
    Ok(Upload { record, bytes })
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
#[axum::debug_handler]
pub async fn health(State(state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: format!(
            "Vault REST API is alive ({} storage)",
            state.vault.storage_mode()
        ),
    })
}

#[utoipa::path(
    get,
    path = "/files",
    responses(
        (status = 200, description = "Active records, most recently modified first", body = ListFilesRes),
        (status = 500, description = "Metadata index unavailable")
    )
)]
/// List every record that is not in the trash
#[axum::debug_handler]
pub async fn list_files(State(state): State<AppState>) -> Result<Json<ListFilesRes>, ApiError> {
    let records = run_blocking(&state, |vault| vault.list_active()).await?;
    Ok(Json(records.into()))
}

#[utoipa::path(
    post,
    path = "/files",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Record created", body = RecordDto),
        (status = 400, description = "Invalid metadata or MIME type"),
        (status = 500, description = "Metadata index rejected the record")
    )
)]
/// Create a record from a `metadata` JSON part and an optional `file` part
///
/// If the blob backend fails after the record was indexed, the record is still returned,
/// without a `logical_path`.
#[axum::debug_handler]
pub async fn create_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<(StatusCode, Json<RecordDto>), ApiError> {
    let user = acting_user(&headers);
    let upload = read_upload(multipart).await?;
    let created = run_blocking(&state, move |vault| {
        vault.create(upload.record, upload.bytes.as_deref(), &user)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

#[utoipa::path(
    get,
    path = "/files/{id}",
    params(("id" = String, Path, description = "Record id")),
    responses(
        (status = 200, description = "Record with resolved gallery children", body = FileRes),
        (status = 404, description = "No such record")
    )
)]
/// Read a record. Gallery children are resolved to their current state.
#[axum::debug_handler]
pub async fn read_file(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<FileRes>, ApiError> {
    let view = run_blocking(&state, move |vault| vault.read(&id)).await?;
    Ok(Json(view.into()))
}

#[utoipa::path(
    put,
    path = "/files/{id}",
    params(("id" = String, Path, description = "Record id")),
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Record updated", body = RecordDto),
        (status = 400, description = "Invalid metadata, or record is in the trash"),
        (status = 404, description = "No such record"),
        (status = 417, description = "Blob backend failure")
    )
)]
/// Replace a record's fields and content
///
/// Omitting the `file` part removes any stored content.
#[axum::debug_handler]
pub async fn update_file(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<RecordDto>, ApiError> {
    let user = acting_user(&headers);
    let upload = read_upload(multipart).await?;
    let updated = run_blocking(&state, move |vault| {
        vault.update(&id, upload.record, upload.bytes.as_deref(), &user)
    })
    .await?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    delete,
    path = "/files/{id}",
    params(("id" = String, Path, description = "Record id")),
    responses(
        (status = 200, description = "Record moved to trash", body = RecordDto),
        (status = 404, description = "No such record"),
        (status = 417, description = "Content could not be archived; record left active")
    )
)]
/// Move a record to the trash
#[axum::debug_handler]
pub async fn delete_file(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    headers: HeaderMap,
) -> Result<Json<RecordDto>, ApiError> {
    let user = acting_user(&headers);
    let trashed = run_blocking(&state, move |vault| vault.delete(&id, &user)).await?;
    Ok(Json(trashed.into()))
}

/// A prepared range response over either a stored blob or inline text.
enum Delivery {
    Blob(RangeResponse<Box<dyn SeekableBlob>>),
    Inline(RangeResponse<Cursor<Vec<u8>>>),
}

#[utoipa::path(
    get,
    path = "/files/{id}/content",
    params(
        ("id" = String, Path, description = "Record id"),
        ("Range" = Option<String>, Header, description = "Byte ranges, e.g. `bytes=0-1023`"),
        ("If-Range" = Option<String>, Header, description = "ETag or date guarding the range")
    ),
    responses(
        (status = 200, description = "Full content"),
        (status = 206, description = "Partial content"),
        (status = 304, description = "Not modified"),
        (status = 404, description = "No such record or no content"),
        (status = 412, description = "Precondition failed"),
        (status = 416, description = "Range not satisfiable")
    )
)]
/// Stream a record's content with conditional and byte-range support
///
/// Records without a blob but with inline text are served from that text.
#[axum::debug_handler]
pub async fn file_content(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    method: Method,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let request = RangeRequest::from_headers(&headers).head_only(method == Method::HEAD);
    let responder = state.responder.clone();

    let delivery = run_blocking(&state, move |vault| {
        if let Some(stream) = vault.open_stream(&id)? {
            let record = stream.record;
            let info = ResourceInfo::new(
                record.filename.as_str(),
                record.mime_type.as_str(),
                stream.blob.len(),
                stream
                    .blob
                    .last_modified()
                    .or(record.modification_date)
                    .unwrap_or_default(),
            );
            return Ok(Some(Delivery::Blob(responder.respond(
                &request,
                &info,
                stream.blob,
            ))));
        }

        let inline = vault
            .get(&id)?
            .filter(|r| r.activated)
            .and_then(|r| r.content.clone().map(|content| (r, content)));
        Ok(inline.map(|(record, content)| {
            let bytes = content.into_bytes();
            let info = ResourceInfo::new(
                record.filename.as_str(),
                record.mime_type.as_str(),
                bytes.len() as u64,
                record.modification_date.unwrap_or_default(),
            );
            Delivery::Inline(responder.respond(&request, &info, Cursor::new(bytes)))
        }))
    })
    .await?
    .ok_or_else(|| ApiError::not_found("no content for this record"))?;

    Ok(match delivery {
        Delivery::Blob(range) => into_http_response(range),
        Delivery::Inline(range) => into_http_response(range),
    })
}

#[utoipa::path(
    get,
    path = "/files/{id}/thumbnail/{size}",
    params(
        ("id" = String, Path, description = "Record id"),
        ("size" = String, Path, description = "small, medium or large")
    ),
    responses(
        (status = 200, description = "PNG thumbnail, or a category icon for non-images", content_type = "image/png"),
        (status = 400, description = "Unknown size class"),
        (status = 404, description = "No such record or no thumbnail")
    )
)]
/// Fetch a thumbnail variant
#[axum::debug_handler]
pub async fn file_thumbnail(
    State(state): State<AppState>,
    AxumPath((id, size)): AxumPath<(String, String)>,
) -> Result<Response, ApiError> {
    let size = ThumbnailSize::from_str(&size).map_err(ApiError::bad_request)?;
    let bytes = run_blocking(&state, move |vault| vault.thumbnail(&id, size))
        .await?
        .ok_or_else(|| ApiError::not_found("no thumbnail for this record"))?;
    Ok(([(header::CONTENT_TYPE, "image/png")], bytes).into_response())
}

#[utoipa::path(
    get,
    path = "/search",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching active records", body = ListFilesRes),
        (status = 500, description = "Metadata index unavailable")
    )
)]
/// Search active records by text and filters
#[axum::debug_handler]
pub async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Result<Json<ListFilesRes>, ApiError> {
    let user = acting_user(&headers);
    let query = SearchQuery {
        text: params.q,
        limit: params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
        mime_prefix: params.mime.filter(|m| !m.trim().is_empty()),
        tags: params
            .tag
            .map(|tags| {
                tags.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default(),
        created_by: params.created_by,
    };
    let hits = run_blocking(&state, move |vault| vault.search(&query, &user)).await?;
    Ok(Json(hits.into()))
}

#[utoipa::path(
    get,
    path = "/trash",
    responses(
        (status = 200, description = "Trashed records", body = ListFilesRes),
        (status = 500, description = "Metadata index unavailable")
    )
)]
/// List records in the trash
#[axum::debug_handler]
pub async fn list_trash(State(state): State<AppState>) -> Result<Json<ListFilesRes>, ApiError> {
    let records = run_blocking(&state, |vault| vault.list_trash()).await?;
    Ok(Json(records.into()))
}

#[utoipa::path(
    delete,
    path = "/trash",
    responses(
        (status = 200, description = "Trash emptied", body = EmptyTrashRes),
        (status = 417, description = "Archived content could not be purged")
    )
)]
/// Permanently remove everything in the trash
#[axum::debug_handler]
pub async fn empty_trash(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<EmptyTrashRes>, ApiError> {
    let user = acting_user(&headers);
    let purged = run_blocking(&state, move |vault| vault.empty_trash(&user)).await?;
    Ok(Json(EmptyTrashRes { purged }))
}
