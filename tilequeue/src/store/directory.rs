//! Filesystem blob store.

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use super::{BlobStore, StorageKey, StoreError, StoreOptions};

/// Writes each key as a file below a root directory.
///
/// Payloads are written to a temporary sibling and renamed into place, so a
/// reader never sees a half-written tile and overwrites replace atomically.
/// Storage class has no meaning on a local disk and is ignored.
#[derive(Debug)]
pub struct DirectoryStore {
    root: PathBuf,
    sequence: AtomicU64,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path for `key`, or `None` if the key would escape the root.
    pub fn path_for(&self, key: &StorageKey) -> Option<PathBuf> {
        let relative = Path::new(key.as_str());
        let confined = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !confined || key.as_str().is_empty() {
            return None;
        }
        Some(self.root.join(relative))
    }

    /// Creates the root and writes then removes a marker file, failing if
    /// the directory cannot take writes.
    pub async fn check_writable(&self) -> Result<(), StoreError> {
        let marker = self
            .root
            .join(format!(".tilequeue-check-{}", std::process::id()));
        let unavailable = |e: std::io::Error| StoreError::Unavailable {
            key: marker.display().to_string(),
            reason: e.to_string(),
        };
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(unavailable)?;
        tokio::fs::write(&marker, b"ok").await.map_err(unavailable)?;
        tokio::fs::remove_file(&marker).await.map_err(unavailable)?;
        trace!(root = %self.root.display(), "Store root is writable");
        Ok(())
    }
}

impl BlobStore for DirectoryStore {
    async fn put(
        &self,
        key: &StorageKey,
        payload: &[u8],
        options: &StoreOptions,
    ) -> Result<(), StoreError> {
        let path = self.path_for(key).ok_or_else(|| StoreError::Rejected {
            key: key.to_string(),
            reason: "key escapes the store root".to_string(),
        })?;
        let unavailable = |e: std::io::Error| StoreError::Unavailable {
            key: key.to_string(),
            reason: e.to_string(),
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(unavailable)?;
        }

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let mut temp = path.clone().into_os_string();
        temp.push(format!(".tmp-{}-{}", std::process::id(), sequence));
        let temp = PathBuf::from(temp);

        if let Err(e) = tokio::fs::write(&temp, payload).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(unavailable(e));
        }
        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(unavailable(e));
        }

        trace!(
            key = %key,
            bytes = payload.len(),
            storage_class = %options.storage_class,
            "Blob written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TileCoord;
    use crate::render::OutputFormat;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_writes_file_at_key() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryStore::new(dir.path());
        let tile = TileCoord::new(3, 2, 1).unwrap();
        let key = StorageKey::new("tiles", "all", tile, OutputFormat::Mvt);

        store
            .put(&key, b"payload", &StoreOptions::default())
            .await
            .unwrap();

        let written = std::fs::read(dir.path().join("tiles/all/3/2/1.mvt")).unwrap();
        assert_eq!(written, b"payload");
    }

    #[tokio::test]
    async fn test_overwrite_replaces_and_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryStore::new(dir.path());
        let key = StorageKey::new("", "all", TileCoord::ROOT, OutputFormat::Json);

        store.put(&key, b"one", &StoreOptions::default()).await.unwrap();
        store.put(&key, b"two", &StoreOptions::default()).await.unwrap();

        let target = store.path_for(&key).unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"two");
        let entries: Vec<_> = std::fs::read_dir(target.parent().unwrap())
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_check_writable_creates_root_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("nested").join("tiles");
        let store = DirectoryStore::new(&root);

        store.check_writable().await.unwrap();

        assert!(root.is_dir());
        assert_eq!(std::fs::read_dir(&root).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_check_writable_fails_when_root_is_a_file() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("occupied");
        std::fs::write(&root, b"not a directory").unwrap();

        let err = DirectoryStore::new(&root).check_writable().await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { .. }));
    }

    #[test]
    fn test_path_for_rejects_escaping_keys() {
        let store = DirectoryStore::new("/srv/tiles");
        let key = StorageKey::new("../etc", "all", TileCoord::ROOT, OutputFormat::Json);
        assert!(store.path_for(&key).is_none());
    }
}
