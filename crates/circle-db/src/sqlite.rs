use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;
use tracing::info;

use circle_types::RecordId;

use crate::adapter::{DocumentStore, Kind};
use crate::migrations;

/// SQLite-backed document store. One connection behind a mutex; each trait
/// call holds the lock for its whole read-modify-write.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent readers from other processes (backups, sqlite3 shell)
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }
}

fn query_body(conn: &Connection, kind: Kind, id: &str) -> Result<Option<Value>> {
    let body: Option<String> = conn
        .prepare_cached("SELECT body FROM documents WHERE kind = ?1 AND id = ?2")?
        .query_row((kind.as_str(), id), |row| row.get(0))
        .optional()?;
    Ok(match body {
        Some(b) => Some(serde_json::from_str(&b)?),
        None => None,
    })
}

fn write_body(conn: &Connection, kind: Kind, id: &str, doc: &Value) -> Result<()> {
    conn.prepare_cached(
        "INSERT INTO documents (kind, id, body) VALUES (?1, ?2, ?3)
         ON CONFLICT (kind, id) DO UPDATE SET body = excluded.body",
    )?
    .execute((kind.as_str(), id, doc.to_string()))?;
    Ok(())
}

impl DocumentStore for Database {
    fn get(&self, kind: Kind, id: &str) -> Result<Option<Value>> {
        self.with_conn(|conn| query_body(conn, kind, id))
    }

    fn get_many(&self, kind: Kind, ids: &[RecordId]) -> Result<Vec<Value>> {
        self.with_conn(|conn| {
            let mut docs = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(doc) = query_body(conn, kind, id)? {
                    docs.push(doc);
                }
            }
            Ok(docs)
        })
    }

    fn put(&self, kind: Kind, id: &str, doc: &Value) -> Result<()> {
        self.with_conn(|conn| write_body(conn, kind, id, doc))
    }

    fn insert(&self, kind: Kind, id: &str, doc: &Value) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn
                .prepare_cached(
                    "INSERT INTO documents (kind, id, body) VALUES (?1, ?2, ?3)
                     ON CONFLICT (kind, id) DO NOTHING",
                )?
                .execute((kind.as_str(), id, doc.to_string()))?;
            Ok(inserted == 1)
        })
    }

    fn delete(&self, kind: Kind, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn
                .prepare_cached("DELETE FROM documents WHERE kind = ?1 AND id = ?2")?
                .execute((kind.as_str(), id))?;
            Ok(deleted > 0)
        })
    }

    fn modify(
        &self,
        kind: Kind,
        id: &str,
        f: &mut dyn FnMut(&mut Value) -> bool,
    ) -> Result<Option<bool>> {
        self.with_conn(|conn| {
            let Some(mut doc) = query_body(conn, kind, id)? else {
                return Ok(None);
            };
            if !f(&mut doc) {
                return Ok(Some(false));
            }
            write_body(conn, kind, id, &doc)?;
            Ok(Some(true))
        })
    }

    fn find_by_field(&self, kind: Kind, field: &str, value: &str) -> Result<Option<Value>> {
        let path = format!("$.{field}");
        self.with_conn(|conn| {
            let body: Option<String> = conn
                .prepare_cached(
                    "SELECT body FROM documents
                     WHERE kind = ?1 AND json_extract(body, ?2) = ?3
                     ORDER BY seq LIMIT 1",
                )?
                .query_row((kind.as_str(), path.as_str(), value), |row| row.get(0))
                .optional()?;
            Ok(match body {
                Some(b) => Some(serde_json::from_str(&b)?),
                None => None,
            })
        })
    }

    fn scan(&self, kind: Kind, visit: &mut dyn FnMut(&Value) -> bool) -> Result<()> {
        // Read everything up front so `visit` never runs under the connection lock.
        let bodies: Vec<String> = self.with_conn(|conn| {
            let mut stmt =
                conn.prepare_cached("SELECT body FROM documents WHERE kind = ?1 ORDER BY seq")?;
            let rows = stmt.query_map([kind.as_str()], |row| row.get(0))?;
            Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
        })?;

        for body in bodies {
            let doc: Value = serde_json::from_str(&body)?;
            if !visit(&doc) {
                break;
            }
        }
        Ok(())
    }
}
