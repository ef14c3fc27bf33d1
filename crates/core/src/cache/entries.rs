//! Entry CRUD operations within a partition.
//!
//! Entries are keyed by request identity (see `hash.rs`). Writes overwrite,
//! so concurrent writers for the same key resolve as last write wins.

use std::time::Duration;

use super::hash::compute_cache_key;
use super::partitions::{Partition, timestamp};
use crate::http::{Headers, Request, Response};
use crate::Error;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::{params, rusqlite};
use url::Url;

/// Listing metadata for a stored entry.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EntryMeta {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub stored_at: String,
    pub size: u64,
}

/// Row shape before decoding into a [`Response`].
struct RawEntry {
    status: i64,
    response_url: String,
    headers_json: String,
    body: Vec<u8>,
}

impl RawEntry {
    fn decode(self) -> Result<Response, Error> {
        let status = u16::try_from(self.status)
            .map_err(|_| Error::CorruptEntry(format!("status out of range: {}", self.status)))?;
        let url = Url::parse(&self.response_url).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        let headers: Headers =
            serde_json::from_str(&self.headers_json).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        Ok(Response { url, status, headers, body: Bytes::from(self.body) })
    }
}

/// Owned column values for one insert.
struct NewEntry {
    key_hash: String,
    method: String,
    url: String,
    status: i64,
    response_url: String,
    headers_json: String,
    body: Vec<u8>,
}

impl NewEntry {
    fn new(request: &Request, response: Response) -> Result<Self, Error> {
        let headers_json =
            serde_json::to_string(&response.headers).map_err(|e| Error::InvalidInput(e.to_string()))?;
        Ok(Self {
            key_hash: compute_cache_key(&request.method, &request.url),
            method: request.method.clone(),
            url: request.url.to_string(),
            status: i64::from(response.status),
            response_url: response.url.to_string(),
            headers_json,
            body: response.body.to_vec(),
        })
    }

    fn insert(&self, conn: &rusqlite::Connection, partition: &str, stored_at: &str) -> Result<(), Error> {
        conn.execute(
            "INSERT INTO entries (
                partition, key_hash, method, url, status, response_url, headers_json, body, stored_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(partition, key_hash) DO UPDATE SET
                method = excluded.method,
                url = excluded.url,
                status = excluded.status,
                response_url = excluded.response_url,
                headers_json = excluded.headers_json,
                body = excluded.body,
                stored_at = excluded.stored_at",
            params![
                partition,
                &self.key_hash,
                &self.method,
                &self.url,
                self.status,
                &self.response_url,
                &self.headers_json,
                &self.body,
                stored_at,
            ],
        )?;
        Ok(())
    }
}

fn ensure_partition(conn: &rusqlite::Connection, partition: &str, now: &str) -> Result<(), Error> {
    conn.execute(
        "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
        params![partition, now],
    )?;
    Ok(())
}

fn cutoff(max_age: Duration) -> String {
    let age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
    let at = chrono::Utc::now()
        .checked_sub_signed(age)
        .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC);
    timestamp(at)
}

impl Partition {
    /// Look up the stored response for a request.
    ///
    /// With `max_age`, entries stored longer ago than that are treated as
    /// misses. Returns None on a miss.
    pub async fn match_request(&self, request: &Request, max_age: Option<Duration>) -> Result<Option<Response>, Error> {
        let partition = self.name.clone();
        let key_hash = compute_cache_key(&request.method, &request.url);
        let not_before = max_age.map(cutoff);

        let raw = self
            .db
            .conn
            .call(move |conn| -> Result<Option<RawEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT status, response_url, headers_json, body FROM entries
                    WHERE partition = ?1 AND key_hash = ?2
                    AND (?3 IS NULL OR stored_at >= ?3)",
                )?;

                let result = stmt.query_row(params![partition, key_hash, not_before], |row| {
                    Ok(RawEntry {
                        status: row.get(0)?,
                        response_url: row.get(1)?,
                        headers_json: row.get(2)?,
                        body: row.get(3)?,
                    })
                });

                match result {
                    Ok(raw) => Ok(Some(raw)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        raw.map(RawEntry::decode).transpose()
    }

    /// Store a response for a request, overwriting any existing entry.
    pub async fn put(&self, request: &Request, response: Response) -> Result<(), Error> {
        let entry = NewEntry::new(request, response)?;
        let partition = self.name.clone();
        let now = timestamp(chrono::Utc::now());

        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                ensure_partition(conn, &partition, &now)?;
                entry.insert(conn, &partition, &now)
            })
            .await
            .map_err(Error::from)
    }

    /// Store several entries atomically: either all are written or none.
    pub async fn put_all(&self, items: Vec<(Request, Response)>) -> Result<usize, Error> {
        let entries = items
            .into_iter()
            .map(|(request, response)| NewEntry::new(&request, response))
            .collect::<Result<Vec<_>, _>>()?;
        let partition = self.name.clone();
        let now = timestamp(chrono::Utc::now());

        self.db
            .conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                ensure_partition(&tx, &partition, &now)?;
                for entry in &entries {
                    entry.insert(&tx, &partition, &now)?;
                }
                tx.commit()?;
                Ok(entries.len())
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the entry for a request. Returns false if none was stored.
    pub async fn delete(&self, request: &Request) -> Result<bool, Error> {
        let partition = self.name.clone();
        let key_hash = compute_cache_key(&request.method, &request.url);
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE partition = ?1 AND key_hash = ?2",
                    params![partition, key_hash],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// List entry metadata, oldest first.
    pub async fn keys(&self) -> Result<Vec<EntryMeta>, Error> {
        let partition = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<EntryMeta>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, status, stored_at, length(body) FROM entries
                    WHERE partition = ?1 ORDER BY stored_at ASC, url ASC",
                )?;
                let rows = stmt
                    .query_map(params![partition], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, i64>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, i64>(4)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                rows.into_iter()
                    .map(|(method, url, status, stored_at, size)| {
                        let status = u16::try_from(status)
                            .map_err(|_| Error::CorruptEntry(format!("status out of range: {status}")))?;
                        Ok(EntryMeta { method, url, status, stored_at, size: size.max(0) as u64 })
                    })
                    .collect()
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in the partition.
    pub async fn count(&self) -> Result<u64, Error> {
        let partition = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE partition = ?1", params![partition], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete entries stored longer ago than `max_age`.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_older_than(&self, max_age: Duration) -> Result<u64, Error> {
        let partition = self.name.clone();
        let not_before = cutoff(max_age);
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM entries WHERE partition = ?1 AND stored_at < ?2",
                    params![partition, not_before],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
