//! Local filesystem [`ObjectStore`].
//!
//! Containers are directories directly under `root`; object keys are
//! relative paths inside them (`<root>/<container>/<key>`). Keys may contain
//! `/` and nested directories are created on copy.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::models::ObjectRef;

use super::{ObjectStore, StorageError};

pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map an object to its path, refusing names that escape the root.
    fn path_for(&self, object: &ObjectRef) -> Result<PathBuf, StorageError> {
        for part in [object.container.as_str(), object.key.as_str()] {
            let escapes = part.is_empty()
                || Path::new(part)
                    .components()
                    .any(|c| !matches!(c, Component::Normal(_)));
            if escapes {
                return Err(StorageError::Request {
                    op: "resolve",
                    message: format!("invalid object name: {}", object),
                });
            }
        }
        Ok(self.root.join(&object.container).join(&object.key))
    }
}

fn map_io(object: &ObjectRef, err: std::io::Error) -> StorageError {
    if err.kind() == ErrorKind::NotFound {
        StorageError::not_found(object)
    } else {
        StorageError::Io(err)
    }
}

#[async_trait]
impl ObjectStore for FsStore {
    fn backend(&self) -> &str {
        "filesystem"
    }

    async fn read(&self, object: &ObjectRef) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(object)?;
        tokio::fs::read(&path).await.map_err(|e| map_io(object, e))
    }

    async fn copy(&self, object: &ObjectRef, dest_container: &str) -> Result<(), StorageError> {
        let src = self.path_for(object)?;
        let dest = self.path_for(&object.in_container(dest_container))?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&src, &dest)
            .await
            .map_err(|e| map_io(object, e))?;
        Ok(())
    }

    async fn delete(&self, object: &ObjectRef) -> Result<(), StorageError> {
        let path = self.path_for(object)?;
        match tokio::fs::remove_file(&path).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(map_io(object, e)),
            _ => Ok(()),
        }
    }
}
