//! SQLite Backing Store
//!
//! Concrete [`Backend`] implementation on a SQLite database, shareable by
//! independent processes through the database file. WAL journaling plus a
//! busy timeout handle cross-process contention; within a process the
//! connection is serialized behind a mutex.
//!
//! Schema provisioning is an explicit one-time operator step via
//! [`SqliteBackend::create_schema`], never performed by the engine.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::backend::{Backend, PurgeFilter};
use crate::cache::{namespace_prefix, prefix_upper_bound, Entry};
use crate::error::Result;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_COLUMNS: &str = "key, value, compression, version, created_at, expires_at";

const UPSERT_SQL: &str = "INSERT INTO cache_entries (key, value, compression, version, created_at, expires_at) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
     ON CONFLICT(key) DO UPDATE SET \
         value = excluded.value, \
         compression = excluded.compression, \
         version = excluded.version, \
         expires_at = excluded.expires_at";

// The insert races an existing row into an add; CAST of non-integer bytes
// yields 0, so the stored representation must be ASCII-decimal.
const ATOMIC_ADD_SQL: &str = "INSERT INTO cache_entries (key, value, compression, version, created_at, expires_at) \
     VALUES (?1, ?2, NULL, ?3, ?4, ?5) \
     ON CONFLICT(key) DO UPDATE SET \
         value = CAST(CAST(value AS INTEGER) + ?6 AS BLOB)";

// == Durability ==
/// Write-durability level of the database, the knob cache tables usually
/// relax: a cache can afford to lose the last writes on power failure in
/// exchange for faster commits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Durability {
    /// Synchronous commits; survives power loss
    #[default]
    Durable,
    /// Asynchronous commits; recent writes may be lost on power failure
    Relaxed,
}

impl Durability {
    fn synchronous_pragma(&self) -> &'static str {
        match self {
            Durability::Durable => "FULL",
            Durability::Relaxed => "OFF",
        }
    }
}

// == SQLite Backend ==
/// SQLite-backed durable store.
#[derive(Debug)]
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Opens (creating if needed) a database file.
    ///
    /// WAL journaling is enabled so concurrent readers never block the
    /// writer, and a busy timeout covers short cross-process lock waits.
    pub fn open<P: AsRef<Path>>(path: P, durability: Durability) -> Result<Self> {
        let conn = Connection::open(path)?;
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", durability.synchronous_pragma())?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a private in-memory database, useful for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// One-time schema setup. Safe to call repeatedly.
    ///
    /// `expires_at` and `version` get partial indexes since both columns
    /// are null for most cache workloads.
    pub fn create_schema(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cache_entries (
                 key         BLOB PRIMARY KEY,
                 value       BLOB NOT NULL,
                 compression TEXT,
                 version     TEXT,
                 created_at  INTEGER NOT NULL,
                 expires_at  INTEGER
             );
             CREATE INDEX IF NOT EXISTS cache_entries_created_at
                 ON cache_entries (created_at);
             CREATE INDEX IF NOT EXISTS cache_entries_expires_at
                 ON cache_entries (expires_at) WHERE expires_at IS NOT NULL;
             CREATE INDEX IF NOT EXISTS cache_entries_version
                 ON cache_entries (version) WHERE version IS NOT NULL;",
        )?;
        Ok(())
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    async fn get(&self, key: &[u8]) -> Result<Option<Entry>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {SELECT_COLUMNS} FROM cache_entries WHERE key = ?1");
        let entry = conn
            .query_row(&sql, params![key], row_to_entry)
            .optional()?;
        Ok(entry)
    }

    async fn get_many(&self, keys: &[Vec<u8>]) -> Result<Vec<Entry>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock();
        let placeholders = vec!["?"; keys.len()].join(", ");
        let sql =
            format!("SELECT {SELECT_COLUMNS} FROM cache_entries WHERE key IN ({placeholders})");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params_from_iter(keys.iter().map(|key| key.as_slice())),
            row_to_entry,
        )?;
        let mut entries = Vec::with_capacity(keys.len());
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    async fn upsert(&self, entry: &Entry) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(UPSERT_SQL, upsert_params(entry))?;
        Ok(())
    }

    async fn upsert_many(&self, entries: &[Entry]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(UPSERT_SQL)?;
            for entry in entries {
                stmt.execute(upsert_params(entry))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
        Ok(())
    }

    async fn delete_where(&self, filter: &PurgeFilter) -> Result<usize> {
        let mut time_preds: Vec<&str> = Vec::new();
        let mut params: Vec<SqlValue> = Vec::new();

        if let Some(at) = filter.expired_at {
            time_preds.push("(expires_at IS NOT NULL AND expires_at <= ?)");
            params.push(SqlValue::Integer(at.timestamp_millis()));
        }
        if let Some(cutoff) = filter.created_before {
            time_preds.push("created_at < ?");
            params.push(SqlValue::Integer(cutoff.timestamp_millis()));
        }

        let mut clauses: Vec<String> = Vec::new();
        if !time_preds.is_empty() {
            clauses.push(format!("({})", time_preds.join(" OR ")));
        }
        if let Some(ns) = &filter.namespace {
            push_namespace_clauses(ns, &mut clauses, &mut params);
        }
        if clauses.is_empty() {
            return Ok(0);
        }

        let conn = self.conn.lock();
        let sql = format!("DELETE FROM cache_entries WHERE {}", clauses.join(" AND "));
        let deleted = conn.execute(&sql, params_from_iter(params))?;
        Ok(deleted)
    }

    async fn count(&self, namespace: Option<&str>, include_expired: bool) -> Result<u64> {
        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<SqlValue> = Vec::new();

        if !include_expired {
            clauses.push("(expires_at IS NULL OR expires_at > ?)".to_string());
            params.push(SqlValue::Integer(Utc::now().timestamp_millis()));
        }
        if let Some(ns) = namespace {
            push_namespace_clauses(ns, &mut clauses, &mut params);
        }

        let mut sql = String::from("SELECT COUNT(*) FROM cache_entries");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        let conn = self.conn.lock();
        let count: i64 = conn.query_row(&sql, params_from_iter(params), |row| row.get(0))?;
        Ok(count as u64)
    }

    async fn truncate(&self) -> Result<()> {
        let conn = self.conn.lock();
        // An unqualified DELETE takes SQLite's truncate optimization path
        conn.execute("DELETE FROM cache_entries", [])?;
        Ok(())
    }

    async fn oldest_keys(&self, limit: usize) -> Result<Vec<Vec<u8>>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT key FROM cache_entries ORDER BY created_at ASC LIMIT ?1")?;
        let rows = stmt.query_map(params![limit as i64], |row| row.get::<_, Vec<u8>>(0))?;
        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?);
        }
        Ok(keys)
    }

    async fn atomic_add(&self, initial: &Entry, delta: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            ATOMIC_ADD_SQL,
            params![
                initial.key,
                initial.value,
                initial.version,
                initial.created_at.timestamp_millis(),
                initial.expires_at.map(|at| at.timestamp_millis()),
                delta,
            ],
        )?;
        Ok(())
    }
}

type UpsertParams<'a> = (
    &'a Vec<u8>,
    &'a Vec<u8>,
    &'a Option<String>,
    &'a Option<String>,
    i64,
    Option<i64>,
);

fn upsert_params(entry: &Entry) -> UpsertParams<'_> {
    (
        &entry.key,
        &entry.value,
        &entry.compression,
        &entry.version,
        entry.created_at.timestamp_millis(),
        entry.expires_at.map(|at| at.timestamp_millis()),
    )
}

fn push_namespace_clauses(namespace: &str, clauses: &mut Vec<String>, params: &mut Vec<SqlValue>) {
    let prefix = namespace_prefix(namespace);
    let upper = prefix_upper_bound(&prefix);
    clauses.push("key >= ?".to_string());
    params.push(SqlValue::Blob(prefix));
    if let Some(upper) = upper {
        clauses.push("key < ?".to_string());
        params.push(SqlValue::Blob(upper));
    }
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<Entry> {
    let created_ms: i64 = row.get(4)?;
    let expires_ms: Option<i64> = row.get(5)?;
    let expires_at = match expires_ms {
        Some(ms) => Some(millis_to_datetime(5, ms)?),
        None => None,
    };
    Ok(Entry {
        key: row.get(0)?,
        value: row.get(1)?,
        compression: row.get(2)?,
        version: row.get(3)?,
        created_at: millis_to_datetime(4, created_ms)?,
        expires_at,
    })
}

fn millis_to_datetime(column: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(column, millis))
}
