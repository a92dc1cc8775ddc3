//! Per-session scratch directory for temporary audio files

use std::io::Write;
use std::path::Path;

use tempfile::{TempDir, TempPath};

use crate::Result;

/// Directory holding the session's temporary audio files
///
/// Every file is created with a unique name and handed out as a
/// [`TempPath`], which deletes the file when dropped. The directory itself
/// is removed when the scratch space is dropped.
#[derive(Debug)]
pub struct ScratchSpace {
    dir: TempDir,
}

impl ScratchSpace {
    /// Create a scratch directory under the system temp dir
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("voice-rag-").tempdir()?;
        tracing::debug!(path = %dir.path().display(), "scratch space created");
        Ok(Self { dir })
    }

    /// Create a scratch directory under `parent`
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn new_in(parent: &Path) -> Result<Self> {
        std::fs::create_dir_all(parent)?;
        let dir = tempfile::Builder::new()
            .prefix("voice-rag-")
            .tempdir_in(parent)?;
        tracing::debug!(path = %dir.path().display(), "scratch space created");
        Ok(Self { dir })
    }

    /// Scratch directory path
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `bytes` to a fresh file named `{prefix}XXXX.{extension}`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or written
    pub fn write(&self, prefix: &str, extension: &str, bytes: &[u8]) -> Result<TempPath> {
        let suffix = format!(".{extension}");
        let mut file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(&suffix)
            .tempfile_in(self.dir.path())?;

        file.write_all(bytes)?;
        file.flush()?;

        let path = file.into_temp_path();
        tracing::trace!(path = %path.display(), bytes = bytes.len(), "scratch file written");
        Ok(path)
    }

    /// Number of files currently in the scratch directory
    #[must_use]
    pub fn file_count(&self) -> usize {
        std::fs::read_dir(self.dir.path())
            .map(|entries| entries.filter_map(std::result::Result::ok).count())
            .unwrap_or(0)
    }

    /// Delete every file left in the scratch directory
    ///
    /// Returns how many files were removed.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be listed
    pub fn purge(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in std::fs::read_dir(self.dir.path())? {
            let path = entry?.path();
            let result = if path.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove scratch file");
                }
            }
        }
        if removed > 0 {
            tracing::debug!(removed, "purged scratch files");
        }
        Ok(removed)
    }
}
