//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into services. Nothing in
//! this crate reads environment variables; binaries collect the raw values into
//! [`ConfigValues`] and call [`resolve_config`].

use crate::constants::{
    BLOBS_DIR_NAME, DEFAULT_DATA_DIR, DEFAULT_STREAM_BUFFER, ENV_DATA_DIR, ENV_REMOTE_URL,
    ENV_STORAGE_MODE, ENV_STREAM_BUFFER, ENV_THUMBNAIL_SIZES, INDEX_DIR_NAME, MAX_STREAM_BUFFER,
    MIN_STREAM_BUFFER,
};
use crate::{VaultError, VaultResult};
use std::path::{Path, PathBuf};
use vault_files::{StorageMode, StorageSettings, ThumbnailSpec};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    storage: StorageSettings,
    thumbnails: ThumbnailSpec,
    stream_buffer: usize,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidInput`] if `stream_buffer` is outside
    /// `MIN_STREAM_BUFFER..=MAX_STREAM_BUFFER` or a thumbnail bound is zero.
    pub fn new(
        data_dir: PathBuf,
        storage: StorageSettings,
        thumbnails: ThumbnailSpec,
        stream_buffer: usize,
    ) -> VaultResult<Self> {
        if !(MIN_STREAM_BUFFER..=MAX_STREAM_BUFFER).contains(&stream_buffer) {
            return Err(VaultError::InvalidInput(format!(
                "stream buffer must be between {} and {} bytes, got {}",
                MIN_STREAM_BUFFER, MAX_STREAM_BUFFER, stream_buffer
            )));
        }
        if [thumbnails.small, thumbnails.medium, thumbnails.large].contains(&0) {
            return Err(VaultError::InvalidInput(
                "thumbnail bounds must be greater than zero".into(),
            ));
        }

        Ok(Self {
            data_dir,
            storage,
            thumbnails,
            stream_buffer,
        })
    }

    /// Local-mode configuration with defaults, rooted at `data_dir`.
    pub fn local(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            storage: StorageSettings::Local {
                root: data_dir.join(BLOBS_DIR_NAME),
            },
            data_dir,
            thumbnails: ThumbnailSpec::default(),
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn index_dir(&self) -> PathBuf {
        self.data_dir.join(INDEX_DIR_NAME)
    }

    pub fn storage(&self) -> &StorageSettings {
        &self.storage
    }

    pub fn storage_mode(&self) -> StorageMode {
        self.storage.mode()
    }

    pub fn thumbnails(&self) -> ThumbnailSpec {
        self.thumbnails
    }

    pub fn stream_buffer(&self) -> usize {
        self.stream_buffer
    }
}

/// Raw, unparsed configuration values as read from the environment.
#[derive(Clone, Debug, Default)]
pub struct ConfigValues {
    pub data_dir: Option<String>,
    pub storage_mode: Option<String>,
    pub remote_url: Option<String>,
    pub thumbnail_sizes: Option<String>,
    pub stream_buffer: Option<String>,
}

impl ConfigValues {
    /// Collects values through `lookup`, typically `|key| std::env::var(key).ok()`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            data_dir: lookup(ENV_DATA_DIR),
            storage_mode: lookup(ENV_STORAGE_MODE),
            remote_url: lookup(ENV_REMOTE_URL),
            thumbnail_sizes: lookup(ENV_THUMBNAIL_SIZES),
            stream_buffer: lookup(ENV_STREAM_BUFFER),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Builds a [`CoreConfig`] from raw values, applying defaults for anything unset.
pub fn resolve_config(values: ConfigValues) -> VaultResult<CoreConfig> {
    let data_dir =
        PathBuf::from(non_blank(values.data_dir).unwrap_or_else(|| DEFAULT_DATA_DIR.into()));
    let storage = storage_settings_from_env_values(
        &data_dir,
        values.storage_mode,
        values.remote_url,
    )?;
    let thumbnails = thumbnail_spec_from_env_value(values.thumbnail_sizes)?;
    let stream_buffer = stream_buffer_from_env_value(values.stream_buffer)?;

    CoreConfig::new(data_dir, storage, thumbnails, stream_buffer)
}

/// Selects the blob backend.
///
/// Local mode stores blobs under `<data_dir>/blobs`. Remote mode requires a URL.
pub fn storage_settings_from_env_values(
    data_dir: &Path,
    mode: Option<String>,
    remote_url: Option<String>,
) -> VaultResult<StorageSettings> {
    let mode = non_blank(mode)
        .map(|m| m.parse::<StorageMode>())
        .transpose()
        .map_err(VaultError::InvalidInput)?
        .unwrap_or_default();

    match mode {
        StorageMode::Local => Ok(StorageSettings::Local {
            root: data_dir.join(BLOBS_DIR_NAME),
        }),
        StorageMode::Remote => {
            let url = non_blank(remote_url).ok_or_else(|| {
                VaultError::InvalidInput("VAULT_REMOTE_URL is required in remote mode".into())
            })?;
            Ok(StorageSettings::Remote { url })
        }
    }
}

/// Parses `small,medium,large` pixel bounds. Unset means the defaults.
pub fn thumbnail_spec_from_env_value(value: Option<String>) -> VaultResult<ThumbnailSpec> {
    let Some(value) = non_blank(value) else {
        return Ok(ThumbnailSpec::default());
    };

    let bounds = value
        .split(',')
        .map(|part| part.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| VaultError::InvalidInput(format!("invalid thumbnail sizes '{}': {}", value, e)))?;

    match bounds.as_slice() {
        [small, medium, large] => Ok(ThumbnailSpec {
            small: *small,
            medium: *medium,
            large: *large,
        }),
        _ => Err(VaultError::InvalidInput(format!(
            "expected three thumbnail sizes (small,medium,large), got '{}'",
            value
        ))),
    }
}

/// Parses the streaming buffer size in bytes. Unset means the default.
pub fn stream_buffer_from_env_value(value: Option<String>) -> VaultResult<usize> {
    non_blank(value)
        .map(|v| {
            v.parse::<usize>()
                .map_err(|e| VaultError::InvalidInput(format!("invalid stream buffer '{}': {}", v, e)))
        })
        .transpose()
        .map(|parsed| parsed.unwrap_or(DEFAULT_STREAM_BUFFER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_defaults() {
        let cfg = resolve_config(ConfigValues::default()).unwrap();

        assert_eq!(cfg.data_dir(), Path::new("vault_data"));
        assert_eq!(cfg.index_dir(), Path::new("vault_data/index"));
        assert_eq!(cfg.storage_mode(), StorageMode::Local);
        assert_eq!(
            cfg.storage(),
            &StorageSettings::Local {
                root: PathBuf::from("vault_data/blobs")
            }
        );
        assert_eq!(cfg.thumbnails(), ThumbnailSpec::default());
        assert_eq!(cfg.stream_buffer(), 8192);
    }

    #[test]
    fn test_values_from_lookup() {
        let values = ConfigValues::from_lookup(|key| match key {
            "VAULT_DATA_DIR" => Some("/srv/vault".into()),
            "VAULT_STREAM_BUFFER" => Some("2048".into()),
            _ => None,
        });
        let cfg = resolve_config(values).unwrap();
        assert_eq!(cfg.data_dir(), Path::new("/srv/vault"));
        assert_eq!(cfg.stream_buffer(), 2048);
    }

    #[test]
    fn test_remote_mode_requires_url() {
        let result = resolve_config(ConfigValues {
            storage_mode: Some("remote".into()),
            ..ConfigValues::default()
        });
        assert!(matches!(result, Err(VaultError::InvalidInput(_))));

        let cfg = resolve_config(ConfigValues {
            storage_mode: Some("Remote".into()),
            remote_url: Some("s3://bucket/vault".into()),
            ..ConfigValues::default()
        })
        .unwrap();
        assert_eq!(
            cfg.storage(),
            &StorageSettings::Remote {
                url: "s3://bucket/vault".into()
            }
        );
    }

    #[test]
    fn test_unknown_storage_mode() {
        let result =
            storage_settings_from_env_values(Path::new("x"), Some("hdfs".into()), None);
        assert!(matches!(result, Err(VaultError::InvalidInput(_))));
    }

    #[test]
    fn test_thumbnail_sizes() {
        let spec = thumbnail_spec_from_env_value(Some(" 32, 128 ,1024".into())).unwrap();
        assert_eq!(
            spec,
            ThumbnailSpec {
                small: 32,
                medium: 128,
                large: 1024
            }
        );
        assert!(thumbnail_spec_from_env_value(Some("32,128".into())).is_err());
        assert!(thumbnail_spec_from_env_value(Some("a,b,c".into())).is_err());
        assert!(resolve_config(ConfigValues {
            thumbnail_sizes: Some("0,1,2".into()),
            ..ConfigValues::default()
        })
        .is_err());
    }

    #[test]
    fn test_stream_buffer_bounds() {
        assert_eq!(stream_buffer_from_env_value(None).unwrap(), 8192);
        assert_eq!(stream_buffer_from_env_value(Some("4096".into())).unwrap(), 4096);
        assert!(stream_buffer_from_env_value(Some("lots".into())).is_err());

        for out_of_range in ["512", "131072"] {
            let result = resolve_config(ConfigValues {
                stream_buffer: Some(out_of_range.into()),
                ..ConfigValues::default()
            });
            assert!(matches!(result, Err(VaultError::InvalidInput(_))));
        }
    }
}
