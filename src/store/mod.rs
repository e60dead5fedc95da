//! Object storage abstraction.
//!
//! The [`ObjectStore`] trait is the only I/O surface the quarantine
//! controller touches: read an object, copy it into another container under
//! the same key, and delete it. Backends:
//!
//! | Backend | Module | Use |
//! |---------|--------|-----|
//! | Amazon S3 / S3-compatible | [`s3`] | production |
//! | Local directories | [`fs`] | local runs, integration tests |
//! | In-memory map | [`memory`] | unit tests |
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod fs;
pub mod memory;
pub mod s3;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::StorageConfig;
use crate::models::ObjectRef;

/// Failure of a single storage primitive.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object not found: {container}/{key}")]
    NotFound { container: String, key: String },

    #[error("credentials unavailable: {0}")]
    Credentials(String),

    #[error("{op} request failed: {message}")]
    Request { op: &'static str, message: String },

    #[error("{op} failed (HTTP {status}): {message}")]
    Status {
        op: &'static str,
        status: u16,
        message: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn not_found(object: &ObjectRef) -> Self {
        StorageError::NotFound {
            container: object.container.clone(),
            key: object.key.clone(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Read, copy and delete primitives over named containers.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Backend identifier (e.g. `"s3"`, `"filesystem"`, `"memory"`).
    fn backend(&self) -> &str;

    /// Fetch the full content of an object.
    ///
    /// Returns [`StorageError::NotFound`] when the object does not exist.
    async fn read(&self, object: &ObjectRef) -> Result<Vec<u8>, StorageError>;

    /// Copy an object, unchanged, to `dest_container` under the same key.
    async fn copy(&self, object: &ObjectRef, dest_container: &str) -> Result<(), StorageError>;

    /// Remove an object from its container.
    ///
    /// Deleting an object that does not exist succeeds, as S3 DeleteObject
    /// does; only transport or permission failures are errors.
    async fn delete(&self, object: &ObjectRef) -> Result<(), StorageError>;
}

/// Build the backend named in `[storage].backend`.
pub fn build_store(config: &StorageConfig) -> Result<Box<dyn ObjectStore>> {
    match config.backend.as_str() {
        "s3" => Ok(Box::new(s3::S3Store::from_env(config)?)),
        "filesystem" => {
            let root = config
                .root
                .clone()
                .context("storage.root must be set when backend is 'filesystem'")?;
            Ok(Box::new(fs::FsStore::new(root)))
        }
        other => anyhow::bail!(
            "Unknown storage backend: '{}'. Must be s3 or filesystem.",
            other
        ),
    }
}
