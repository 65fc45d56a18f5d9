//! Checkpoint database schema definitions

/// SQL schema for the checkpoint database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    coverage_achieved REAL,
    coverage_target REAL
);

-- One row per (store, category) pair; progress is the next cursor to fetch
CREATE TABLE IF NOT EXISTS units (
    store_id TEXT NOT NULL,
    category_id INTEGER NOT NULL,
    state TEXT NOT NULL,
    next_cursor INTEGER NOT NULL DEFAULT 1,
    retry_count INTEGER NOT NULL DEFAULT 0,
    error_message TEXT,
    updated_at TEXT,
    PRIMARY KEY (store_id, category_id)
);

CREATE INDEX IF NOT EXISTS idx_units_state ON units(state);

-- Canonical product records, one row per product id for the whole run
CREATE TABLE IF NOT EXISTS products (
    product_id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    price_cents INTEGER,
    url TEXT,
    first_seen_at TEXT NOT NULL
);

-- Where each product was sighted; extends without duplicating products
CREATE TABLE IF NOT EXISTS sightings (
    product_id TEXT NOT NULL REFERENCES products(product_id),
    store_id TEXT NOT NULL,
    category_id INTEGER NOT NULL,
    PRIMARY KEY (product_id, store_id, category_id)
);

CREATE INDEX IF NOT EXISTS idx_sightings_category ON sightings(category_id);
CREATE INDEX IF NOT EXISTS idx_sightings_store ON sightings(store_id);

-- Pages already ingested; the replay fence for idempotent ingestion
CREATE TABLE IF NOT EXISTS page_origins (
    store_id TEXT NOT NULL,
    category_id INTEGER NOT NULL,
    cursor INTEGER NOT NULL,
    product_count INTEGER NOT NULL,
    recorded_at TEXT NOT NULL,
    PRIMARY KEY (store_id, category_id, cursor)
);
"#;

/// Initializes the checkpoint database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["runs", "units", "products", "sightings", "page_origins"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }
}
