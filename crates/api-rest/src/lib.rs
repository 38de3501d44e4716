//! # API REST
//!
//! REST API implementation for the media vault.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - Byte-range streaming through `vault-range`
//!
//! Vault calls block on disk or network I/O, so every handler hands them to the blocking pool.

#![warn(rust_2018_idioms)]

mod dto;
mod error;
mod handlers;
mod streaming;

pub use dto::{
    EmptyTrashRes, FileRes, GalleryChildDto, HealthRes, ListFilesRes, PropDto, RecordDto,
    RecordInput,
};
pub use error::ApiError;
pub use handlers::USER_HEADER;

use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use vault_core::VaultService;
use vault_range::RangeResponder;

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Application state for the REST API server
#[derive(Clone)]
pub struct AppState {
    pub vault: Arc<VaultService>,
    pub responder: Arc<RangeResponder>,
}

impl AppState {
    /// Wraps a vault, streaming with the vault's configured buffer size.
    pub fn new(vault: Arc<VaultService>) -> Self {
        let responder = Arc::new(RangeResponder::new(vault.stream_buffer()));
        Self { vault, responder }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::list_files,
        handlers::create_file,
        handlers::read_file,
        handlers::update_file,
        handlers::delete_file,
        handlers::file_content,
        handlers::file_thumbnail,
        handlers::search,
        handlers::list_trash,
        handlers::empty_trash,
    ),
    components(schemas(
        dto::HealthRes,
        dto::RecordDto,
        dto::PropDto,
        dto::RecordInput,
        dto::UploadForm,
        dto::FileRes,
        dto::GalleryChildDto,
        dto::ListFilesRes,
        dto::EmptyTrashRes,
    ))
)]
pub struct ApiDoc;

/// Builds the full router, including Swagger UI.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/files", get(handlers::list_files).post(handlers::create_file))
        .route(
            "/files/:id",
            get(handlers::read_file)
                .put(handlers::update_file)
                .delete(handlers::delete_file),
        )
        .route("/files/:id/content", get(handlers::file_content))
        .route("/files/:id/thumbnail/:size", get(handlers::file_thumbnail))
        .route("/search", get(handlers::search))
        .route(
            "/trash",
            get(handlers::list_trash).delete(handlers::empty_trash),
        )
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
