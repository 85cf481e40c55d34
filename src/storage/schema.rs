//! SQLite layout for the harvest database

/// Tables for checkpoints and records. Every statement is `IF NOT EXISTS`.
pub const SCHEMA_SQL: &str = r#"
-- Progress checkpoints, one namespace per pass
CREATE TABLE IF NOT EXISTS checkpoints (
    namespace TEXT NOT NULL,
    key TEXT NOT NULL,
    value INTEGER NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (namespace, key)
);

-- Append-only results collection
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    iter INTEGER NOT NULL,
    url TEXT NOT NULL,
    title TEXT,
    error TEXT,
    recorded_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_records_kind ON records(kind);
CREATE INDEX IF NOT EXISTS idx_records_iter ON records(iter);
"#;

/// Creates any missing tables and indexes
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_reopening_keeps_existing_tables() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO checkpoints (namespace, key, value, updated_at) VALUES ('d', 'max_iter', 4, 'now')",
            [],
        )
        .unwrap();

        initialize_schema(&conn).unwrap();

        let value: i64 = conn
            .query_row("SELECT value FROM checkpoints WHERE key = 'max_iter'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(value, 4);
    }

    #[test]
    fn test_harvest_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["checkpoints", "records"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {}", table);
        }
    }
}
