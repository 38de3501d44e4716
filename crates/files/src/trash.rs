//! Trash archival.
//!
//! A trashed record's blob and thumbnail variants are packed into one zip archive stored at
//! `/trash/<id>`. The archive comment records the directory the blobs came from.

use crate::backend::ObjectBackend;
use crate::constants::TRASH_DIR;
use crate::layout::PathLayout;
use crate::{FilesError, FilesResult};
use std::io::{self, Seek};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Moves record blobs into the trash and purges it.
#[derive(Debug, Clone)]
pub struct TrashManager {
    root: String,
}

impl Default for TrashManager {
    fn default() -> Self {
        Self {
            root: TRASH_DIR.to_owned(),
        }
    }
}

impl TrashManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Key of the archive for `id`.
    pub fn artifact_key(&self, id: &str) -> String {
        PathLayout::blob_key(&self.root, id)
    }

    /// Archives every object the record owns under `current_path`, then removes the
    /// originals.
    ///
    /// The originals are only touched once the archive has been written, so a failure at
    /// any earlier point leaves them in place. Re-trashing the same id replaces its archive.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::NotFound`] if none of the record's objects exist, or any
    /// backend or archive error.
    pub fn move_to_trash(
        &self,
        backend: &dyn ObjectBackend,
        current_path: &str,
        id: &str,
    ) -> FilesResult<String> {
        backend.ensure_dir(&self.root)?;

        // Spooled to an anonymous temp file.
        let mut archived = Vec::new();
        let mut zip = ZipWriter::new(tempfile::tempfile()?);
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(true);

        for key in PathLayout::record_keys(current_path, id) {
            let Some(mut blob) = backend.open(&key)? else {
                continue;
            };
            let entry = key.rsplit('/').next().unwrap_or(key.as_str()).to_owned();
            zip.start_file(entry, options)?;
            io::copy(&mut blob, &mut zip)?;
            archived.push(key);
        }

        if archived.is_empty() {
            return Err(FilesError::NotFound(PathLayout::blob_key(current_path, id)));
        }

        zip.set_comment(current_path);
        let mut archive = zip.finish()?;
        archive.rewind()?;

        let artifact = self.artifact_key(id);
        let bytes = backend.put_from(&artifact, &mut archive)?;
        debug!(%artifact, entries = archived.len(), bytes, "wrote trash archive");

        for key in &archived {
            backend.remove(key)?;
        }

        info!(id, from = current_path, "moved blobs to trash");
        Ok(artifact)
    }

    /// Purges the whole trash subtree. Emptying an empty trash is not an error.
    pub fn empty(&self, backend: &dyn ObjectBackend) -> FilesResult<()> {
        backend.remove_tree(&self.root)?;
        info!(trash = %self.root, "emptied trash");
        Ok(())
    }
}
