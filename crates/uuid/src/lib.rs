//! Record identifiers and content hashes.
//!
//! The vault uses two kinds of identity:
//!
//! - [`ShardableUuid`]: the identifier the metadata index assigns to every record. Its
//!   canonical form is **32 lowercase hexadecimal characters** (no hyphens), the same value
//!   as `Uuid::new_v4().simple().to_string()`.
//! - [`Sha256Hash`]: a content identity derived from blob bytes. The blob store falls back to
//!   it when asked to persist bytes for a record the index has not seen yet, so identical
//!   bytes always map to the same storage key.
//!
//! ## Sharded directory layout
//! For a canonical UUID `u`, file-backed indexes store data under:
//! `parent_dir/<u[0..2]>/<u[2..4]>/<u>/`
//!
//! Example:
//! `vault_data/index/55/0e/550e8400e29b41d4a716446655440000/`
//!
//! This keeps directory fan-out bounded as the number of records grows.

mod service;

pub use service::{Sha256Hash, ShardableUuid, Uuid};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
