//! Expired tile list directories.
//!
//! An expiry producer drops tile list files into a directory. Each run takes
//! the first files by name, up to a cap, and removes them once their tiles
//! are on the queue, so a rerun only sees newer lists.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::WriteError;

/// Most expired tile files consumed in one run.
pub const DEFAULT_EXPIRED_FILES_CAP: usize = 20;

/// Regular files in `dir`, sorted by name, at most `cap` of them.
pub async fn list_expired_files(dir: &Path, cap: usize) -> Result<Vec<PathBuf>, WriteError> {
    let read_error = |e: std::io::Error| WriteError::Read(format!("{}: {}", dir.display(), e));
    let mut entries = tokio::fs::read_dir(dir).await.map_err(read_error)?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(read_error)? {
        if entry.file_type().await.map_err(read_error)?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    let found = files.len();
    files.truncate(cap);
    info!(
        dir = %dir.display(),
        found,
        taken = files.len(),
        "Listed expired tile files"
    );
    Ok(files)
}

/// Reads every line of every file, in order.
pub async fn read_tile_files(paths: &[PathBuf]) -> Result<Vec<String>, WriteError> {
    let mut lines = Vec::new();
    for path in paths {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| WriteError::Read(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), bytes = content.len(), "Read expired tile file");
        lines.extend(content.lines().map(str::to_string));
    }
    Ok(lines)
}

/// Deletes files whose tiles have been enqueued.
pub async fn remove_consumed(paths: &[PathBuf]) -> Result<(), WriteError> {
    for path in paths {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| WriteError::Remove(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Removed consumed expired tile file");
    }
    Ok(())
}
