use anyhow::Context;
use rusqlite::Connection;

/// Open the database and apply the store schema. One flat hash table backs
/// the whole key-value contract: sessions, drafts and reservations are all
/// `(key, field) -> value` rows.
pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path).context("failed to open database")?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .context("failed to set database pragmas")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv_entries (
            key TEXT NOT NULL,
            field TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (key, field)
        );",
    )
    .context("failed to apply store schema")?;

    Ok(conn)
}
