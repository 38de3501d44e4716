//! Names and defaults shared across the vault.

/// Default root for the index and local blobs when `VAULT_DATA_DIR` is unset.
pub const DEFAULT_DATA_DIR: &str = "vault_data";

/// Subdirectory of the data dir holding the JSON metadata index.
pub const INDEX_DIR_NAME: &str = "index";

/// Subdirectory of the data dir holding local blobs.
pub const BLOBS_DIR_NAME: &str = "blobs";

/// Per-record metadata file inside the sharded index layout.
pub const RECORD_FILE_NAME: &str = "record.json";

pub const DEFAULT_STREAM_BUFFER: usize = 8 * 1024;
pub const MIN_STREAM_BUFFER: usize = 1024;
pub const MAX_STREAM_BUFFER: usize = 64 * 1024;

/// Upper bound applied to search results when the caller asks for none.
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Environment variables read by the binaries.
pub const ENV_DATA_DIR: &str = "VAULT_DATA_DIR";
pub const ENV_STORAGE_MODE: &str = "VAULT_STORAGE_MODE";
pub const ENV_REMOTE_URL: &str = "VAULT_REMOTE_URL";
pub const ENV_THUMBNAIL_SIZES: &str = "VAULT_THUMBNAIL_SIZES";
pub const ENV_STREAM_BUFFER: &str = "VAULT_STREAM_BUFFER";
pub const ENV_REST_ADDR: &str = "VAULT_REST_ADDR";

pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";
