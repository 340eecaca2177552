//! SQLite-backed partition storage.
//!
//! Partitions are rows in `partitions`; entries hang off them with a
//! cascading foreign key, so deleting a partition drops its entries in the
//! same statement. Entries are addressed by `(partition, key_hash)` where the
//! hash is [`RequestKey::hash`].

use super::connection::CacheDb;
use super::hash::RequestKey;
use super::storage::CacheStorage;
use crate::Error;
use crate::snapshot::{ResponseKind, ResponseSnapshot};
use std::collections::BTreeSet;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Raw column values of one stored entry.
struct StoredRow {
    response_url: String,
    status: i64,
    kind: String,
    headers_json: String,
    body: Vec<u8>,
}

impl StoredRow {
    fn into_snapshot(self) -> Result<ResponseSnapshot, Error> {
        let status =
            u16::try_from(self.status).map_err(|_| Error::CorruptEntry(format!("status {} out of range", self.status)))?;
        let kind =
            ResponseKind::parse(&self.kind).ok_or_else(|| Error::CorruptEntry(format!("unknown kind {}", self.kind)))?;
        let headers: Vec<(String, String)> = serde_json::from_str(&self.headers_json)?;

        Ok(ResponseSnapshot { url: self.response_url, status, kind, headers, body: self.body.into() })
    }
}

fn ensure_partition(conn: &rusqlite::Connection, name: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
        params![name, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

fn require_partition(conn: &rusqlite::Connection, name: &str) -> Result<(), Error> {
    let exists: bool =
        conn.query_row("SELECT EXISTS(SELECT 1 FROM partitions WHERE name = ?1)", params![name], |row| row.get(0))?;
    if exists { Ok(()) } else { Err(Error::UnknownPartition(name.to_string())) }
}

fn upsert_entry(
    conn: &rusqlite::Connection, partition: &str, key: &RequestKey, response: &ResponseSnapshot, headers_json: &str,
    stored_at: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO entries (
            partition, key_hash, method, url, response_url, status, kind, headers_json, body, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(partition, key_hash) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            response_url = excluded.response_url,
            status = excluded.status,
            kind = excluded.kind,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            partition,
            key.hash(),
            key.method(),
            key.url(),
            &response.url,
            response.status as i64,
            response.kind.as_str(),
            headers_json,
            response.body.as_ref(),
            stored_at,
        ],
    )?;
    Ok(())
}

#[async_trait::async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, partition: &str) -> Result<(), Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                ensure_partition(conn, &partition)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn get(&self, partition: &str, key: &RequestKey) -> Result<Option<ResponseSnapshot>, Error> {
        let partition = partition.to_string();
        let key_hash = key.hash();
        self.conn
            .call(move |conn| -> Result<Option<ResponseSnapshot>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT response_url, status, kind, headers_json, body
                    FROM entries WHERE partition = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![partition, key_hash], |row| {
                    Ok(StoredRow {
                        response_url: row.get(0)?,
                        status: row.get(1)?,
                        kind: row.get(2)?,
                        headers_json: row.get(3)?,
                        body: row.get(4)?,
                    })
                });

                match result {
                    Ok(row) => Ok(Some(row.into_snapshot()?)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, partition: &str, key: &RequestKey, response: &ResponseSnapshot) -> Result<(), Error> {
        let partition = partition.to_string();
        let key = key.clone();
        let response = response.clone();
        let headers_json = serde_json::to_string(&response.headers)?;
        let stored_at = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.unchecked_transaction()?;
                require_partition(&tx, &partition)?;
                upsert_entry(&tx, &partition, &key, &response, &headers_json, &stored_at)?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn put_all(&self, partition: &str, entries: &[(RequestKey, ResponseSnapshot)]) -> Result<(), Error> {
        let partition = partition.to_string();
        let stored_at = chrono::Utc::now().to_rfc3339();
        let mut rows = Vec::with_capacity(entries.len());
        for (key, response) in entries {
            rows.push((key.clone(), response.clone(), serde_json::to_string(&response.headers)?));
        }

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.unchecked_transaction()?;
                require_partition(&tx, &partition)?;
                for (key, response, headers_json) in &rows {
                    upsert_entry(&tx, &partition, key, response, headers_json, &stored_at)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self, partition: &str) -> Result<Vec<RequestKey>, Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<RequestKey>, Error> {
                let mut stmt = conn.prepare("SELECT method, url FROM entries WHERE partition = ?1 ORDER BY method, url")?;
                let keys = stmt
                    .query_map(params![partition], |row| {
                        let method: String = row.get(0)?;
                        let url: String = row.get(1)?;
                        Ok(RequestKey::new(&method, url))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    async fn partition_names(&self) -> Result<BTreeSet<String>, Error> {
        self.conn
            .call(|conn| -> Result<BTreeSet<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM partitions")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<BTreeSet<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, partition: &str) -> Result<bool, Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM partitions WHERE name = ?1", params![partition])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::storage::contract;

    #[tokio::test]
    async fn test_storage_contract() {
        let db = CacheDb::open_in_memory().await.unwrap();
        contract::exercise(&db).await;
    }

    #[tokio::test]
    async fn test_delete_cascades_to_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let key = RequestKey::get("https://app.test/app.js");
        let response = ResponseSnapshot::new("https://app.test/app.js", 200, ResponseKind::Basic).with_body("js");
        db.open("snipmaster-static-v1").await.unwrap();
        db.put("snipmaster-static-v1", &key, &response).await.unwrap();

        assert!(db.delete("snipmaster-static-v1").await.unwrap());

        let orphans: i64 = db
            .conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn test_corrupt_kind_is_reported() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let key = RequestKey::get("https://app.test/");
        let response = ResponseSnapshot::new("https://app.test/", 200, ResponseKind::Basic);
        db.open("p").await.unwrap();
        db.put("p", &key, &response).await.unwrap();

        db.conn
            .call(|conn| conn.execute("UPDATE entries SET kind = 'bogus'", []))
            .await
            .unwrap();

        let result = db.get("p", &key).await;
        assert!(matches!(result, Err(Error::CorruptEntry(_))));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.sqlite");
        let key = RequestKey::get("https://app.test/index.html");

        {
            let db = CacheDb::open(&path).await.unwrap();
            db.open("snipmaster-static-v1").await.unwrap();
            let response = ResponseSnapshot::new("https://app.test/index.html", 200, ResponseKind::Basic)
                .with_header("content-type", "text/html")
                .with_body("<html></html>");
            db.put("snipmaster-static-v1", &key, &response).await.unwrap();
        }

        let db = CacheDb::open(&path).await.unwrap();
        let stored = db.get("snipmaster-static-v1", &key).await.unwrap().unwrap();
        assert_eq!(stored.text(), "<html></html>");
        assert_eq!(stored.content_type(), Some("text/html"));
    }

    #[tokio::test]
    async fn test_write_after_delete_does_not_recreate() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let key = RequestKey::get("https://app.test/about");
        let response = ResponseSnapshot::new("https://app.test/about", 200, ResponseKind::Basic).with_body("about");
        db.open("snipmaster-dynamic-v1").await.unwrap();
        db.delete("snipmaster-dynamic-v1").await.unwrap();

        let result = db.put("snipmaster-dynamic-v1", &key, &response).await;

        assert!(matches!(result, Err(Error::UnknownPartition(_))));
        assert!(db.partition_names().await.unwrap().is_empty());
    }
}
