//! Scoped storage for downloaded attachments
//!
//! A run owns one working directory. [`ScopedStorage::acquire`] creates it and
//! hands out a [`StorageGuard`]; [`StorageGuard::release`] empties it again,
//! leaving the bare directory in place as a stable mount point.
//!
//! If a guard is dropped without being released (the run future was dropped,
//! or a panic unwound through it) the directory is emptied synchronously in
//! `Drop`, so cleanup also happens on cancellation.

use crate::error::{Result, StorageError};
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// Transient working directory bound to one pipeline run
#[derive(Clone, Debug)]
pub struct ScopedStorage {
    path: PathBuf,
}

impl ScopedStorage {
    /// Create a manager for the given directory (nothing is touched yet)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Directory managed by this instance
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the directory (and parents) if absent
    ///
    /// Idempotent if the directory already exists.
    #[tracing::instrument(level = "debug", skip(self), fields(path = ?self.path))]
    pub async fn acquire(&self) -> Result<StorageGuard> {
        tokio::fs::create_dir_all(&self.path).await.map_err(|e| {
            StorageError::CreateFailed {
                path: self.path.clone(),
                reason: e.to_string(),
            }
        })?;

        debug!(path = ?self.path, "scoped storage acquired");

        Ok(StorageGuard {
            path: self.path.clone(),
            released: false,
        })
    }

    /// Remove all contents, then recreate the empty directory
    #[tracing::instrument(level = "debug", skip(self), fields(path = ?self.path))]
    pub async fn release(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(StorageError::ReleaseFailed {
                    path: self.path.clone(),
                    reason: e.to_string(),
                }
                .into());
            }
        }

        tokio::fs::create_dir_all(&self.path).await.map_err(|e| {
            StorageError::ReleaseFailed {
                path: self.path.clone(),
                reason: format!("failed to recreate directory: {e}"),
            }
        })?;

        debug!(path = ?self.path, "scoped storage released");
        Ok(())
    }
}

/// Proof that scoped storage was acquired
///
/// Must be consumed with [`StorageGuard::release`]; dropping it releases the
/// directory synchronously as a fallback.
#[must_use = "scoped storage must be released"]
#[derive(Debug)]
pub struct StorageGuard {
    path: PathBuf,
    released: bool,
}

impl StorageGuard {
    /// Directory files should be written to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Empty the directory
    ///
    /// Callers treat an error as best-effort: it is reported, but does not
    /// change the outcome of the run.
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        ScopedStorage::new(self.path.clone()).release().await
    }
}

impl Drop for StorageGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        warn!(path = ?self.path, "scoped storage dropped without release, cleaning up");
        let result = match std::fs::remove_dir_all(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => std::fs::create_dir_all(&self.path),
        };
        if let Err(e) = result {
            error!(path = ?self.path, error = %e, "error cleaning up scoped storage");
        }
    }
}
