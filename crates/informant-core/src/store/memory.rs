//! In-memory [`ObjectStore`] implementation for tests and local dry runs.
//!
//! Uses a `BTreeMap` behind `std::sync::RwLock`, so `list` returns keys in
//! the same lexicographic order S3 does. Individual keys can be made to
//! fail on write to exercise partial-failure paths.

use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{PublishError, Result};

use super::{Acl, ObjectStore, PutObject};

/// A stored object as the website bucket would hold it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
    pub acl: Acl,
    pub redirect_location: Option<String>,
}

impl StoredObject {
    pub fn is_redirect(&self) -> bool {
        self.redirect_location.is_some()
    }

    pub fn body_str(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

/// In-memory bucket.
pub struct InMemoryStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    failing_puts: RwLock<HashSet<String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            failing_puts: RwLock::new(HashSet::new()),
        }
    }

    /// Snapshot of the object at `key`.
    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().unwrap().get(key).cloned()
    }

    /// All keys currently stored.
    pub fn keys(&self) -> Vec<String> {
        self.objects.read().unwrap().keys().cloned().collect()
    }

    /// Full snapshot of the bucket, for state comparisons.
    pub fn snapshot(&self) -> BTreeMap<String, StoredObject> {
        self.objects.read().unwrap().clone()
    }

    /// Make every future `put` to `key` fail with a store error.
    pub fn fail_puts_to(&self, key: &str) {
        self.failing_puts.write().unwrap().insert(key.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing_puts.write().unwrap().clear();
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let objects = self.objects.read().unwrap();
        objects
            .get(key)
            .map(|o| o.body.clone())
            .ok_or_else(|| PublishError::StoreNotFound(key.to_string()))
    }

    async fn put(&self, object: PutObject) -> Result<()> {
        if self.failing_puts.read().unwrap().contains(&object.key) {
            return Err(PublishError::store(
                object.key,
                anyhow::anyhow!("injected write failure"),
            ));
        }
        let mut objects = self.objects.write().unwrap();
        objects.insert(
            object.key,
            StoredObject {
                body: object.body,
                content_type: object.content_type,
                acl: object.acl,
                redirect_location: object.redirect_location,
            },
        );
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let objects = self.objects.read().unwrap();
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.write().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.get("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_is_prefix_bounded_and_sorted() {
        let store = InMemoryStore::new();
        for key in ["2018/5/12-b", "2018/5/123-a", "2018/5/12-a", "2018/6/12-a"] {
            store.put(PutObject::html(key, "x")).await.unwrap();
        }
        let keys = store.list("2018/5/12-").await.unwrap();
        assert_eq!(keys, vec!["2018/5/12-a", "2018/5/12-b"]);
    }

    #[tokio::test]
    async fn test_injected_put_failure() {
        let store = InMemoryStore::new();
        store.fail_puts_to("k");
        assert!(store.put(PutObject::html("k", "x")).await.is_err());
        store.clear_failures();
        store.put(PutObject::html("k", "x")).await.unwrap();
        assert_eq!(store.object("k").unwrap().acl, Acl::PublicRead);
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_ok() {
        let store = InMemoryStore::new();
        store.delete("nope").await.unwrap();
    }
}
