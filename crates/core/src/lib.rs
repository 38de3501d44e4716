//! # Vault Core
//!
//! Core business logic for the media vault.
//!
//! This crate keeps blob storage and the metadata index in agreement:
//! - [`VaultService`] sequences create, update, delete and read across both stores
//! - [`MetadataIndex`] is the document-store contract, with in-memory and sharded JSON
//!   implementations
//! - [`CoreConfig`] is resolved once at startup and handed to services
//!
//! **No API concerns**: HTTP serving, range negotiation and command-line handling belong in
//! `api-rest`, `vault-range` and `vault-cli`.

pub mod config;
pub mod constants;
mod error;
pub mod index;
mod locks;
mod vault;

pub use config::{resolve_config, ConfigValues, CoreConfig};
pub use error::{VaultError, VaultResult};
pub use index::{InMemoryIndex, JsonFileIndex, MetadataIndex, SearchQuery};
pub use locks::{IdGuard, IdLocks};
pub use vault::{BlobStream, GalleryChild, GalleryView, VaultService};

pub use vault_files::{SeekableBlob, StorageMode, StorageSettings, ThumbnailSize, ThumbnailSpec};
pub use vault_types::{MediaRecord, NonEmptyText, Prop, PropValue, DEFAULT_MIME_TYPE};
