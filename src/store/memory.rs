//! In-memory [`ObjectStore`] implementation for tests.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`. Copies and deletes can be
//! made to fail on demand, and every primitive call is recorded so tests
//! can assert which operations ran and in what order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::models::ObjectRef;

use super::{ObjectStore, StorageError};

/// A primitive invoked on an [`InMemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Read(ObjectRef),
    Copy(ObjectRef, String),
    Delete(ObjectRef),
}

/// In-memory object store.
#[derive(Default)]
pub struct InMemoryStore {
    objects: RwLock<HashMap<ObjectRef, Vec<u8>>>,
    calls: RwLock<Vec<StoreCall>>,
    fail_copy: AtomicBool,
    fail_delete: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, object: &ObjectRef, content: impl Into<Vec<u8>>) {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(object.clone(), content.into());
    }

    pub fn get(&self, object: &ObjectRef) -> Option<Vec<u8>> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(object)
            .cloned()
    }

    pub fn contains(&self, object: &ObjectRef) -> bool {
        self.get(object).is_some()
    }

    /// Number of objects currently held in `container`.
    pub fn count_in(&self, container: &str) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|o| o.container == container)
            .count()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Make every subsequent copy fail with an HTTP 500 style error.
    pub fn fail_copies(&self, fail: bool) {
        self.fail_copy.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent delete fail with an HTTP 500 style error.
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: StoreCall) {
        self.calls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn read(&self, object: &ObjectRef) -> Result<Vec<u8>, StorageError> {
        self.record(StoreCall::Read(object.clone()));
        self.get(object)
            .ok_or_else(|| StorageError::not_found(object))
    }

    async fn copy(&self, object: &ObjectRef, dest_container: &str) -> Result<(), StorageError> {
        self.record(StoreCall::Copy(object.clone(), dest_container.to_string()));
        if self.fail_copy.load(Ordering::SeqCst) {
            return Err(StorageError::Status {
                op: "CopyObject",
                status: 500,
                message: "injected copy failure".to_string(),
            });
        }
        let content = self
            .get(object)
            .ok_or_else(|| StorageError::not_found(object))?;
        self.put(&object.in_container(dest_container), content);
        Ok(())
    }

    async fn delete(&self, object: &ObjectRef) -> Result<(), StorageError> {
        self.record(StoreCall::Delete(object.clone()));
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StorageError::Status {
                op: "DeleteObject",
                status: 500,
                message: "injected delete failure".to_string(),
            });
        }
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(object);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_copy_keeps_source_and_key() {
        let store = InMemoryStore::new();
        let src = ObjectRef::new("billing", "2023/jan.csv");
        store.put(&src, "a,b\n");

        store.copy(&src, "errors").await.unwrap();

        assert!(store.contains(&src));
        assert_eq!(
            store.get(&ObjectRef::new("errors", "2023/jan.csv")),
            Some(b"a,b\n".to_vec())
        );
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.read(&ObjectRef::new("billing", "nope.csv")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_missing_object_succeeds() {
        let store = InMemoryStore::new();
        let src = ObjectRef::new("billing", "gone.csv");
        store.put(&src, "x");

        store.delete(&src).await.unwrap();
        store.delete(&src).await.unwrap();
        assert!(!store.contains(&src));
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = InMemoryStore::new();
        let src = ObjectRef::new("billing", "f.csv");
        store.put(&src, "x");
        store.fail_copies(true);
        store.fail_deletes(true);

        assert!(store.copy(&src, "errors").await.is_err());
        assert!(store.delete(&src).await.is_err());
        assert!(store.contains(&src));
        assert_eq!(store.count_in("errors"), 0);
        assert_eq!(store.calls().len(), 2);
    }
}
