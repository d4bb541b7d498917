use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::SessionStore;

/// SQLite-backed store. The connection mutex serializes every per-key
/// read-modify-write, which is all the dialogue engine requires.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn get(&self, key: &str, field: &str) -> anyhow::Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1 AND field = ?2",
                params![key, field],
                |row| row.get(0),
            )
            .optional()
            .context("failed to read field")?;
        Ok(value)
    }

    async fn get_all(&self, key: &str) -> anyhow::Result<HashMap<String, String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT field, value FROM kv_entries WHERE key = ?1")
            .context("failed to prepare field scan")?;
        let rows = stmt
            .query_map(params![key], |row| Ok((row.get(0)?, row.get(1)?)))
            .context("failed to read fields")?;

        let mut fields = HashMap::new();
        for row in rows {
            let (field, value): (String, String) = row?;
            fields.insert(field, value);
        }
        Ok(fields)
    }

    async fn set(&self, key: &str, field: &str, value: &str) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO kv_entries (key, field, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(key, field) DO UPDATE SET
               value = excluded.value,
               updated_at = datetime('now')",
            params![key, field, value],
        )
        .context("failed to write field")?;
        Ok(())
    }

    async fn delete(&self, key: &str, field: &str) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM kv_entries WHERE key = ?1 AND field = ?2",
            params![key, field],
        )
        .context("failed to delete field")?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let exists = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM kv_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .context("failed to check key")?;
        Ok(exists)
    }

    async fn delete_key(&self, key: &str) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])
            .context("failed to delete key")?;
        Ok(())
    }
}
