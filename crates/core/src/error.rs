use vault_files::FilesError;

/// Errors surfaced by vault operations.
///
/// The variants mirror how callers react: `NotFound` and the input errors are the caller's
/// fault, `Index*` means the metadata store failed and `StorageService` means the blob
/// backend did.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid MIME type: {0}")]
    InvalidMimeType(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to read metadata index: {0}")]
    IndexRead(String),
    #[error("failed to write metadata index: {0}")]
    IndexWrite(String),
    #[error("storage service error: {0}")]
    StorageService(String),
}

pub type VaultResult<T> = std::result::Result<T, VaultError>;

impl From<FilesError> for VaultError {
    fn from(err: FilesError) -> Self {
        match err {
            FilesError::NotFound(what) => Self::NotFound(what),
            FilesError::InvalidMimeType(mime) => Self::InvalidMimeType(mime),
            other => Self::StorageService(other.to_string()),
        }
    }
}
