//! Cache entry operations.
//!
//! Entries are whole-response snapshots. Writing an existing identity
//! replaces every column of the row; nothing is patched in place.

use super::connection::CacheDb;
use crate::Error;
use crate::http::{Method, RequestKey, Response, ResponseType};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, Connection};
use url::Url;

/// A response stored under a request identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    pub namespace: String,
    pub key: RequestKey,
    pub response: Response,
    pub stored_at: String,
}

/// Owned column values for one row, built before handing off to the
/// connection thread.
struct EncodedEntry {
    key_hash: String,
    method: String,
    url: String,
    status: u16,
    status_text: String,
    response_type: &'static str,
    headers_json: String,
    body: Vec<u8>,
    response_url: Option<String>,
}

impl EncodedEntry {
    fn new(key: &RequestKey, response: &Response) -> Result<Self, Error> {
        Ok(Self {
            key_hash: key.hash(),
            method: key.method().as_str().to_string(),
            url: key.url().to_string(),
            status: response.status,
            status_text: response.status_text.clone(),
            response_type: response.kind.as_str(),
            headers_json: serde_json::to_string(&response.headers)?,
            body: response.body.to_vec(),
            response_url: response.url.as_ref().map(Url::to_string),
        })
    }
}

struct EntryRow {
    method: String,
    url: String,
    status: u16,
    status_text: String,
    response_type: String,
    headers_json: String,
    body: Vec<u8>,
    response_url: Option<String>,
    stored_at: String,
}

impl EntryRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            method: row.get(0)?,
            url: row.get(1)?,
            status: row.get(2)?,
            status_text: row.get(3)?,
            response_type: row.get(4)?,
            headers_json: row.get(5)?,
            body: row.get(6)?,
            response_url: row.get(7)?,
            stored_at: row.get(8)?,
        })
    }

    fn into_entry(self, namespace: String) -> Result<CachedEntry, Error> {
        let method: Method = self.method.parse()?;
        let url = parse_stored_url(&self.url)?;
        let kind = ResponseType::parse(&self.response_type)
            .ok_or_else(|| Error::CorruptEntry(format!("unknown response type: {}", self.response_type)))?;
        let headers: Vec<(String, String)> = serde_json::from_str(&self.headers_json)?;
        let response_url = self.response_url.as_deref().map(parse_stored_url).transpose()?;

        Ok(CachedEntry {
            namespace,
            key: RequestKey::new(method, &url),
            response: Response {
                status: self.status,
                status_text: self.status_text,
                headers,
                body: self.body.into(),
                kind,
                url: response_url,
            },
            stored_at: self.stored_at,
        })
    }
}

fn parse_stored_url(raw: &str) -> Result<Url, Error> {
    Url::parse(raw).map_err(|e| Error::CorruptEntry(format!("{raw}: {e}")))
}

fn upsert(conn: &Connection, namespace: &str, entry: &EncodedEntry, stored_at: &str) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO namespaces (name, created_at) VALUES (?1, ?2)
         ON CONFLICT(name) DO NOTHING",
        params![namespace, stored_at],
    )?;
    conn.execute(
        "INSERT INTO entries (
            namespace, key_hash, method, url, status, status_text,
            response_type, headers_json, body, response_url, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT(namespace, key_hash) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            status = excluded.status,
            status_text = excluded.status_text,
            response_type = excluded.response_type,
            headers_json = excluded.headers_json,
            body = excluded.body,
            response_url = excluded.response_url,
            stored_at = excluded.stored_at",
        params![
            namespace,
            &entry.key_hash,
            &entry.method,
            &entry.url,
            entry.status,
            &entry.status_text,
            entry.response_type,
            &entry.headers_json,
            &entry.body,
            &entry.response_url,
            stored_at,
        ],
    )?;
    Ok(())
}

impl CacheDb {
    /// Store a response under a request identity, creating the namespace if needed.
    pub async fn put_entry(&self, namespace: &str, key: &RequestKey, response: &Response) -> Result<(), Error> {
        let namespace = namespace.to_string();
        let entry = EncodedEntry::new(key, response)?;
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.unchecked_transaction()?;
                upsert(&tx, &namespace, &entry, &now)?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Store a batch of responses in a single transaction.
    ///
    /// Either every entry is written or none is.
    pub async fn put_entries(&self, namespace: &str, entries: &[(RequestKey, Response)]) -> Result<(), Error> {
        let namespace = namespace.to_string();
        let encoded = entries
            .iter()
            .map(|(key, response)| EncodedEntry::new(key, response))
            .collect::<Result<Vec<_>, _>>()?;
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.unchecked_transaction()?;
                for entry in &encoded {
                    upsert(&tx, &namespace, entry, &now)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get the entry stored for a request identity.
    ///
    /// Returns None if the namespace or the entry doesn't exist.
    pub async fn get_entry(&self, namespace: &str, key: &RequestKey) -> Result<Option<CachedEntry>, Error> {
        let namespace = namespace.to_string();
        let key_hash = key.hash();
        let row = {
            let namespace = namespace.clone();
            self.conn
                .call(move |conn| -> Result<Option<EntryRow>, Error> {
                    let result = conn.query_row(
                        "SELECT method, url, status, status_text, response_type,
                                headers_json, body, response_url, stored_at
                         FROM entries WHERE namespace = ?1 AND key_hash = ?2",
                        params![namespace, key_hash],
                        EntryRow::from_row,
                    );

                    match result {
                        Ok(row) => Ok(Some(row)),
                        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                        Err(e) => Err(e.into()),
                    }
                })
                .await
                .map_err(Error::from)?
        };

        row.map(|row| row.into_entry(namespace)).transpose()
    }

    /// List the request identities stored in a namespace, oldest first.
    pub async fn list_entries(&self, namespace: &str) -> Result<Vec<RequestKey>, Error> {
        let namespace = namespace.to_string();
        let rows = self
            .conn
            .call(move |conn| -> Result<Vec<(String, String)>, Error> {
                let mut stmt = conn.prepare("SELECT method, url FROM entries WHERE namespace = ?1 ORDER BY rowid ASC")?;
                let rows = stmt
                    .query_map(params![namespace], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        rows.into_iter()
            .map(|(method, url)| -> Result<RequestKey, Error> {
                Ok(RequestKey::new(method.parse()?, &parse_stored_url(&url)?))
            })
            .collect()
    }
}
