//! Cache namespace operations.
//!
//! A namespace is a named, versioned bucket of entries. Deleting one
//! cascades to every entry stored under it.

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;

impl CacheDb {
    /// Create the namespace if it does not exist yet.
    pub async fn open_namespace(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO namespaces (name, created_at) VALUES (?1, ?2)
                     ON CONFLICT(name) DO NOTHING",
                    params![name, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Whether a namespace with this name exists.
    #[cfg(test)]
    pub(crate) async fn has_namespace(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM namespaces WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// List namespace names in creation order.
    pub async fn namespace_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM namespaces ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a namespace and all of its entries.
    ///
    /// Returns false if no namespace had that name.
    pub async fn delete_namespace(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM namespaces WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_namespace("pwa-test-cache-v1").await.unwrap();
        db.open_namespace("pwa-test-cache-v1").await.unwrap();

        let names = db.namespace_names().await.unwrap();
        assert_eq!(names, vec!["pwa-test-cache-v1".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_namespace() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_namespace("v1").await.unwrap();
        db.open_namespace("v2").await.unwrap();

        assert!(db.delete_namespace("v1").await.unwrap());
        assert!(!db.delete_namespace("v1").await.unwrap());
        assert!(!db.has_namespace("v1").await.unwrap());
        assert!(db.has_namespace("v2").await.unwrap());
    }

    #[tokio::test]
    async fn test_names_empty() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.namespace_names().await.unwrap().is_empty());
    }
}
