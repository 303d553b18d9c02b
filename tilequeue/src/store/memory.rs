//! In-memory blob store.

use std::collections::BTreeMap;

use dashmap::DashMap;

use super::{BlobStore, StorageKey, StoreError, StoreOptions};

#[derive(Debug, Clone)]
struct StoredBlob {
    payload: Vec<u8>,
    options: StoreOptions,
}

/// Blob store held in a concurrent map, for single-process runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: DashMap<String, StoredBlob>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.get(key).map(|b| b.payload.clone())
    }

    /// Options the blob under `key` was last written with.
    pub fn options(&self, key: &str) -> Option<StoreOptions> {
        self.blobs.get(key).map(|b| b.options)
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Every key and payload, ordered by key.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        self.blobs
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().payload.clone()))
            .collect()
    }
}

impl BlobStore for MemoryStore {
    async fn put(
        &self,
        key: &StorageKey,
        payload: &[u8],
        options: &StoreOptions,
    ) -> Result<(), StoreError> {
        self.blobs.insert(
            key.as_str().to_string(),
            StoredBlob {
                payload: payload.to_vec(),
                options: *options,
            },
        );
        Ok(())
    }
}
