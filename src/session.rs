//! Request-scoped session storage used between redirect and callback.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::http::BoxError;

/// Key/value storage that survives the browser round-trip to the provider.
///
/// Implementations are expected to be scoped to one user session (a cookie
/// session, a server-side session row, ...). Flows only ever touch the keys
/// they own.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, BoxError>;

    async fn put(&self, key: &str, value: Value) -> Result<(), BoxError>;

    /// Remove a key, returning the previous value if there was one.
    async fn remove(&self, key: &str) -> Result<Option<Value>, BoxError>;
}

/// In-memory implementation of [`SessionStore`]
#[derive(Default)]
pub struct InMemorySessionStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, BoxError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), BoxError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<Option<Value>, BoxError> {
        Ok(self.entries.write().await.remove(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn put_get_remove() {
        let store = InMemorySessionStore::new();

        store.put("state", json!("abc")).await.unwrap();
        assert_eq!(store.get("state").await.unwrap(), Some(json!("abc")));

        let removed = store.remove("state").await.unwrap();
        assert_eq!(removed, Some(json!("abc")));

        // Removing twice yields nothing
        assert_eq!(store.remove("state").await.unwrap(), None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn put_overwrites_existing_value() {
        let store = InMemorySessionStore::new();
        store.put("k", json!(1)).await.unwrap();
        store.put("k", json!(2)).await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(json!(2)));
        assert_eq!(store.len().await, 1);
    }
}
