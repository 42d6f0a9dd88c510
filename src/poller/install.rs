//! Artifact download and collision-safe installation.
//!
//! Downloads stream into a staging file created in the install directory
//! itself, then move onto the final name with a rename. Readers of the
//! install directory therefore only ever see the old complete file or the
//! new complete file, never a partial one.

use crate::error::{Error, Result};
use futures::StreamExt;
use parking_lot::Mutex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Registry of files that could not be deleted when superseded.
///
/// A superseded artifact may be held open by the host process, in which case
/// deleting it fails. The path is parked here and the service makes one more
/// best-effort pass at shutdown. A failure at that point is logged and the
/// stale file left behind.
#[derive(Debug, Clone, Default)]
pub struct DeferredDeletes {
    inner: Arc<Mutex<Vec<PathBuf>>>,
}

impl DeferredDeletes {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a path for deletion at shutdown.
    pub fn defer(&self, path: PathBuf) {
        self.inner.lock().push(path);
    }

    /// Whether any deletions are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Snapshot of the pending paths.
    #[must_use]
    pub fn pending(&self) -> Vec<PathBuf> {
        self.inner.lock().clone()
    }

    /// Attempt every pending deletion, clearing the registry.
    pub fn drain(&self) {
        let pending = std::mem::take(&mut *self.inner.lock());
        for path in pending {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("removed deferred file {}", path.display()),
                Err(e) => warn!("leaving stale file {} behind: {e}", path.display()),
            }
        }
    }
}

/// Reject artifact names that would escape the install directory.
fn validate_artifact_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\\') {
        return Err(Error::Install(format!(
            "artifact file name '{name}' is not a plain file name"
        )));
    }
    Ok(())
}

/// Stream an artifact into the install directory under `file_name`.
///
/// The body is written to a staging file in `install_dir` and renamed onto
/// the final path, overwriting any existing file of that exact name.
///
/// # Errors
///
/// Returns [`Error::Download`] on transport failure or a non-success status,
/// and [`Error::Install`] if the staging file cannot be written or moved
/// into place.
pub(crate) async fn download_into(
    client: &reqwest::Client,
    url: &str,
    install_dir: &Path,
    file_name: &str,
) -> Result<PathBuf> {
    validate_artifact_name(file_name)?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Download(e.to_string()))?;
    if !response.status().is_success() {
        return Err(Error::Download(format!(
            "CI server returned {}",
            response.status()
        )));
    }

    std::fs::create_dir_all(install_dir)
        .map_err(|e| Error::Install(format!("cannot create install directory: {e}")))?;

    // Staging file lives next to the destination so the rename below stays
    // on one filesystem.
    let mut staging = tempfile::Builder::new()
        .prefix(".")
        .suffix(".part")
        .tempfile_in(install_dir)
        .map_err(|e| Error::Install(format!("cannot create staging file: {e}")))?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk: bytes::Bytes = chunk.map_err(|e| Error::Download(e.to_string()))?;
        staging
            .as_file_mut()
            .write_all(&chunk)
            .map_err(|e| Error::Install(format!("cannot write staging file: {e}")))?;
    }
    staging
        .as_file_mut()
        .flush()
        .map_err(|e| Error::Install(format!("cannot flush staging file: {e}")))?;

    let dest = install_dir.join(file_name);
    staging
        .persist(&dest)
        .map_err(|e| Error::Install(format!("cannot move artifact into place: {e}")))?;

    debug!("installed artifact at {}", dest.display());
    Ok(dest)
}

/// Remove the superseded artifact, deferring to shutdown if deletion fails.
pub(crate) fn remove_superseded(old_path: &Path, new_path: &Path, deferred: &DeferredDeletes) {
    if old_path == new_path {
        return;
    }
    match std::fs::remove_file(old_path) {
        Ok(()) => debug!("removed superseded artifact {}", old_path.display()),
        Err(e) => {
            warn!(
                "could not remove superseded artifact {} ({e}); deferring to shutdown",
                old_path.display()
            );
            deferred.defer(old_path.to_path_buf());
        }
    }
}
