//! Blob store contract for rendered tiles.
//!
//! Every rendered payload is written under a [`StorageKey`] derived only from
//! the tile and format, so writing the same tile again replaces the previous
//! payload. Overwriting is always allowed.

mod directory;
mod key;
mod memory;

pub use directory::DirectoryStore;
pub use key::StorageKey;
pub use memory::MemoryStore;

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use thiserror::Error;

/// Durability class requested for a write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StorageClass {
    #[default]
    Standard,
    ReducedRedundancy,
}

impl StorageClass {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::ReducedRedundancy => "reduced_redundancy",
        }
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StorageClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "reduced_redundancy" | "reduced-redundancy" => Ok(Self::ReducedRedundancy),
            other => Err(format!(
                "unknown storage class '{}' (expected standard or reduced_redundancy)",
                other
            )),
        }
    }
}

/// Which blob store implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreKind {
    /// Files below a root directory
    #[default]
    Directory,
    /// Process memory; results are discarded on exit
    Memory,
}

impl StoreKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::Memory => "memory",
        }
    }
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "directory" => Ok(Self::Directory),
            "memory" => Ok(Self::Memory),
            other => Err(format!(
                "unknown store type '{}' (expected directory or memory)",
                other
            )),
        }
    }
}

/// Blob store selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub kind: StoreKind,
    /// Root directory for directory stores
    pub target: std::path::PathBuf,
    /// Key prefix
    pub path: String,
    pub storage_class: StorageClass,
}

/// Per-write options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    pub storage_class: StorageClass,
    /// MIME type of the payload, if known
    pub content_type: Option<&'static str>,
}

/// Errors raised by blob store writes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not complete the write; worth retrying
    #[error("Store unavailable writing '{key}': {reason}")]
    Unavailable { key: String, reason: String },

    /// The store refused the write; retrying will not help
    #[error("Store rejected '{key}': {reason}")]
    Rejected { key: String, reason: String },
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Destination for rendered payloads.
pub trait BlobStore: Send + Sync + 'static {
    /// Writes `payload` under `key`, replacing any existing payload.
    fn put(
        &self,
        key: &StorageKey,
        payload: &[u8],
        options: &StoreOptions,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_class_parsing() {
        assert_eq!(
            "reduced_redundancy".parse::<StorageClass>().unwrap(),
            StorageClass::ReducedRedundancy
        );
        assert_eq!(
            "Standard".parse::<StorageClass>().unwrap(),
            StorageClass::Standard
        );
        assert!("glacier".parse::<StorageClass>().is_err());
    }

    #[test]
    fn test_error_classification() {
        let unavailable = StoreError::Unavailable {
            key: "k".to_string(),
            reason: "timeout".to_string(),
        };
        let rejected = StoreError::Rejected {
            key: "k".to_string(),
            reason: "denied".to_string(),
        };
        assert!(unavailable.is_retryable());
        assert!(!rejected.is_retryable());
    }
}
