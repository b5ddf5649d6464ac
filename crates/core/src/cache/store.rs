//! The cache store seam used by the engine.

use async_trait::async_trait;

use super::connection::CacheDb;
use super::entries::CachedEntry;
use crate::Error;
use crate::http::{RequestKey, Response};

/// Durable, namespaced key-value store of captured responses.
///
/// All operations may fail (I/O, quota). Callers decide whether a failure
/// is fatal; the store never swallows one.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Create the namespace if absent.
    async fn open(&self, namespace: &str) -> Result<(), Error>;

    /// Look up the entry for a request identity.
    async fn match_entry(&self, namespace: &str, key: &RequestKey) -> Result<Option<CachedEntry>, Error>;

    /// Store a response, replacing any previous entry for the identity.
    async fn put(&self, namespace: &str, key: &RequestKey, response: &Response) -> Result<(), Error>;

    /// Store every response or none of them.
    async fn put_all(&self, namespace: &str, entries: &[(RequestKey, Response)]) -> Result<(), Error>;

    /// Names of all existing namespaces.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Delete a namespace and its entries; false if it did not exist.
    async fn delete(&self, namespace: &str) -> Result<bool, Error>;

    /// Request identities stored in a namespace.
    async fn entries(&self, namespace: &str) -> Result<Vec<RequestKey>, Error>;
}

#[async_trait]
impl CacheStore for CacheDb {
    async fn open(&self, namespace: &str) -> Result<(), Error> {
        self.open_namespace(namespace).await
    }

    async fn match_entry(&self, namespace: &str, key: &RequestKey) -> Result<Option<CachedEntry>, Error> {
        self.get_entry(namespace, key).await
    }

    async fn put(&self, namespace: &str, key: &RequestKey, response: &Response) -> Result<(), Error> {
        self.put_entry(namespace, key, response).await
    }

    async fn put_all(&self, namespace: &str, entries: &[(RequestKey, Response)]) -> Result<(), Error> {
        self.put_entries(namespace, entries).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.namespace_names().await
    }

    async fn delete(&self, namespace: &str) -> Result<bool, Error> {
        self.delete_namespace(namespace).await
    }

    async fn entries(&self, namespace: &str) -> Result<Vec<RequestKey>, Error> {
        self.list_entries(namespace).await
    }
}
