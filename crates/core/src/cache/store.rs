//! Partition-scoped access to cached entries.
//!
//! Partitions are key namespaces inside one database. A [`PartitionStore`]
//! only ever reads and writes rows carrying its own partition name.

use super::connection::CacheDb;
use super::entry::CachedEntry;
use super::key::CacheKey;
use crate::Error;
use crate::http::HttpResponse;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

impl CacheDb {
    /// Handle to a partition. No I/O happens until it is used.
    pub fn partition(&self, name: impl Into<String>) -> PartitionStore {
        PartitionStore { db: self.clone(), name: name.into() }
    }

    /// Handle to a partition, creating it (empty) if it does not exist yet.
    pub async fn open_partition(&self, name: &str) -> Result<PartitionStore, Error> {
        let store = self.partition(name);
        let owned = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
                    params![owned, chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;
        Ok(store)
    }

    /// Names of every persisted partition, oldest first.
    pub async fn partition_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM partitions ORDER BY rowid")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a partition and all of its entries.
    ///
    /// Returns false if the partition did not exist.
    pub async fn delete_partition(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM entries WHERE partition = ?1", params![name])?;
                let removed = tx.execute("DELETE FROM partitions WHERE name = ?1", params![name])?;
                tx.commit()?;
                Ok(removed > 0)
            })
            .await
            .map_err(Error::from)
    }
}

/// Get/put/delete/enumerate scoped to one partition.
#[derive(Clone, Debug)]
pub struct PartitionStore {
    db: CacheDb,
    name: String,
}

impl PartitionStore {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up an entry. Returns None if the key (or the partition) is absent.
    pub async fn get(&self, key: &CacheKey) -> Result<Option<CachedEntry>, Error> {
        let partition = self.name.clone();
        let key_hash = key.digest();
        let row = self
            .db
            .conn
            .call(move |conn| -> Result<Option<StoredRow>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT status, status_text, headers_json, body
                     FROM entries WHERE partition = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![partition, key_hash], |row| {
                    Ok(StoredRow {
                        status: row.get(0)?,
                        status_text: row.get(1)?,
                        headers_json: row.get(2)?,
                        body: row.get(3)?,
                    })
                });

                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(StoredRow::into_entry).transpose()
    }

    /// Insert or replace the entry for `key`.
    ///
    /// The whole row is replaced in one statement. A write stamped earlier than
    /// the entry already stored is dropped, keeping `stored-at` non-decreasing;
    /// returns whether the write was applied.
    pub async fn put(&self, key: &CacheKey, entry: &CachedEntry) -> Result<bool, Error> {
        let applied = self.put_all(&[(key.clone(), entry.clone())]).await?;
        Ok(applied.first().copied().unwrap_or(false))
    }

    /// Write a batch of entries in one transaction.
    ///
    /// Either every row is written or, on error, none is. Returns, per entry and
    /// in input order, whether the `stored-at` guard let the write through.
    pub async fn put_all(&self, entries: &[(CacheKey, CachedEntry)]) -> Result<Vec<bool>, Error> {
        let partition = self.name.clone();
        let rows = entries
            .iter()
            .map(|(key, entry)| EntryRow::new(key, entry))
            .collect::<Result<Vec<_>, _>>()?;

        self.db
            .conn
            .call(move |conn| -> Result<Vec<bool>, Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
                    params![partition, chrono::Utc::now().to_rfc3339()],
                )?;
                let applied = rows
                    .iter()
                    .map(|row| row.upsert(&tx, &partition).map(|changed| changed > 0))
                    .collect::<Result<Vec<_>, _>>()?;
                tx.commit()?;
                Ok(applied)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the entry for `key`. Returns false if it was not present.
    pub async fn delete(&self, key: &CacheKey) -> Result<bool, Error> {
        let partition = self.name.clone();
        let key_hash = key.digest();
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "DELETE FROM entries WHERE partition = ?1 AND key_hash = ?2",
                    params![partition, key_hash],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// URLs of every entry in this partition, in insertion order.
    pub async fn keys(&self) -> Result<Vec<String>, Error> {
        let partition = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE partition = ?1 ORDER BY rowid")?;
                let urls = stmt
                    .query_map(params![partition], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}

const UPSERT_ENTRY: &str = "INSERT INTO entries (
        partition, key_hash, url, method, status, status_text, headers_json, body, stored_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT(partition, key_hash) DO UPDATE SET
        url = excluded.url,
        method = excluded.method,
        status = excluded.status,
        status_text = excluded.status_text,
        headers_json = excluded.headers_json,
        body = excluded.body,
        stored_at = excluded.stored_at
    WHERE excluded.stored_at >= entries.stored_at";

/// An entry flattened into owned column values, ready to move onto the DB thread.
struct EntryRow {
    key_hash: String,
    url: String,
    method: String,
    status: i64,
    status_text: String,
    headers_json: String,
    body: Vec<u8>,
    stored_at: i64,
}

impl EntryRow {
    fn new(key: &CacheKey, entry: &CachedEntry) -> Result<Self, Error> {
        let stored = entry.stored();
        Ok(Self {
            key_hash: key.digest(),
            url: key.url().to_string(),
            method: key.method().to_string(),
            status: i64::from(stored.status),
            status_text: stored.status_text.clone(),
            headers_json: serde_json::to_string(&stored.headers)?,
            body: stored.body.to_vec(),
            stored_at: entry.stored_at(),
        })
    }

    fn upsert(&self, conn: &rusqlite::Connection, partition: &str) -> rusqlite::Result<usize> {
        conn.execute(
            UPSERT_ENTRY,
            params![
                partition,
                self.key_hash,
                self.url,
                self.method,
                self.status,
                self.status_text,
                self.headers_json,
                self.body,
                self.stored_at
            ],
        )
    }
}

struct StoredRow {
    status: i64,
    status_text: String,
    headers_json: String,
    body: Vec<u8>,
}

impl StoredRow {
    fn into_entry(self) -> Result<CachedEntry, Error> {
        let status =
            u16::try_from(self.status).map_err(|_| Error::CorruptEntry(format!("status {} out of range", self.status)))?;
        let headers: Vec<(String, String)> = serde_json::from_str(&self.headers_json)?;
        Ok(CachedEntry::from_stored(HttpResponse {
            status,
            status_text: self.status_text,
            headers,
            body: self.body.into(),
        }))
    }
}
