//! SQLite result sink.
//!
//! One row per input key. Appending to an existing key merges the new
//! results into the stored set and bumps `last_updated`, so repeated runs
//! only ever grow a key's results.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};

use subsift_core::{CoreError, LookupMode, Sink};

use crate::error::{AppError, Result};

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS lookups (
    key          TEXT PRIMARY KEY,
    mode         TEXT NOT NULL,      -- kebab-case LookupMode
    results      TEXT NOT NULL,      -- JSON array of strings, sorted
    result_count INTEGER NOT NULL DEFAULT 0,
    last_updated TEXT NOT NULL       -- RFC 3339 UTC
);
"#;

/// A stored row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRow {
    /// Input key.
    pub key: String,
    /// Lookup mode the key was queried with.
    pub mode: String,
    /// Distinct results, sorted.
    pub results: Vec<String>,
    /// RFC 3339 timestamp of the last write.
    pub last_updated: String,
}

/// SQLite-backed result sink.
///
/// Thread-safe via an internal `Mutex<Connection>`; every write runs under
/// the lock, which also serializes concurrent key completions.
pub struct SqliteSink {
    path: PathBuf,
    mode: LookupMode,
    conn: Mutex<Connection>,
}

impl SqliteSink {
    /// Open (or create) the database at `path` and apply the schema.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Sink`] if the directory, database, or schema
    /// cannot be created.
    pub fn open(path: impl Into<PathBuf>, mode: LookupMode) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Sink(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(&path).map_err(sqlite_err)?;
        conn.execute_batch(SCHEMA_SQL).map_err(sqlite_err)?;
        Ok(Self {
            path,
            mode,
            conn: Mutex::new(conn),
        })
    }

    /// The database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fetch the stored row for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Sink`] on query or decode failure.
    pub fn get(&self, key: &str) -> Result<Option<LookupRow>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT key, mode, results, last_updated FROM lookups WHERE key = ?1",
                params![key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(sqlite_err)?;

        row.map(|(key, mode, results, last_updated)| {
            let results: Vec<String> = serde_json::from_str(&results)
                .map_err(|e| AppError::Sink(format!("corrupt results for {key}: {e}")))?;
            Ok(LookupRow {
                key,
                mode,
                results,
                last_updated,
            })
        })
        .transpose()
    }

    /// Number of stored keys.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Sink`] on query failure.
    pub fn key_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM lookups", [], |row| row.get(0))
            .map_err(sqlite_err)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| AppError::Sink(format!("connection lock poisoned: {e}")))
    }

    fn upsert(&self, key: &str, results: &BTreeSet<String>) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(sqlite_err)?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT results FROM lookups WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(sqlite_err)?;

        let mut merged: BTreeSet<String> = match existing {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| AppError::Sink(format!("corrupt results for {key}: {e}")))?,
            None => BTreeSet::new(),
        };
        merged.extend(results.iter().cloned());

        let json = serde_json::to_string(&merged)
            .map_err(|e| AppError::Sink(format!("cannot encode results: {e}")))?;
        let now = chrono::Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO lookups (key, mode, results, result_count, last_updated) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(key) DO UPDATE SET \
                mode = excluded.mode, \
                results = excluded.results, \
                result_count = excluded.result_count, \
                last_updated = excluded.last_updated",
            params![key, self.mode.name(), json, merged.len() as i64, now],
        )
        .map_err(sqlite_err)?;
        tx.commit().map_err(sqlite_err)
    }
}

#[async_trait]
impl Sink for SqliteSink {
    fn destination(&self) -> String {
        format!("sqlite://{}", self.path.display())
    }

    async fn append(&self, key: &str, results: &BTreeSet<String>) -> subsift_core::Result<()> {
        self.upsert(key, results).map_err(CoreError::from)
    }
}

fn sqlite_err(e: rusqlite::Error) -> AppError {
    AppError::Sink(format!("sqlite: {e}"))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn upsert_merges_results_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let sink = SqliteSink::open(dir.path().join("db").join("results.db"), LookupMode::Subdomain)
            .unwrap();

        sink.append("example.com", &set(&["www.example.com"]))
            .await
            .unwrap();
        let first = sink.get("example.com").unwrap().unwrap();

        sink.append("example.com", &set(&["api.example.com", "www.example.com"]))
            .await
            .unwrap();
        sink.append("other.org", &set(&["mail.other.org"]))
            .await
            .unwrap();

        let row = sink.get("example.com").unwrap().unwrap();
        assert_eq!(row.results, vec!["api.example.com", "www.example.com"]);
        assert_eq!(row.mode, "subdomain");
        assert!(row.last_updated >= first.last_updated);
        assert_eq!(sink.key_count().unwrap(), 2);
    }

    #[test]
    fn unknown_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let sink = SqliteSink::open(dir.path().join("results.db"), LookupMode::ReverseIp).unwrap();
        assert!(sink.get("10.0.0.1").unwrap().is_none());
        assert_eq!(sink.key_count().unwrap(), 0);
    }

    #[test]
    fn reopen_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.db");
        {
            let sink = SqliteSink::open(&path, LookupMode::ReverseIp).unwrap();
            sink.upsert("10.0.0.1", &set(&["example.com"])).unwrap();
        }
        let sink = SqliteSink::open(&path, LookupMode::ReverseIp).unwrap();
        let row = sink.get("10.0.0.1").unwrap().unwrap();
        assert_eq!(row.mode, "reverse-ip");
        assert_eq!(row.results, vec!["example.com"]);
    }

    #[test]
    fn destination_names_the_database() {
        let dir = tempfile::tempdir().unwrap();
        let sink = SqliteSink::open(dir.path().join("r.db"), LookupMode::Subdomain).unwrap();
        assert!(sink.destination().starts_with("sqlite://"));
        assert!(sink.destination().ends_with("r.db"));
    }
}
