//! SQLite schema definition

/// DDL for the append-only record table. Safe to run repeatedly.
pub fn schema_sql(table: &str) -> String {
    format!(
        r#"
-- Records: one row per extracted heading, paragraph or field
CREATE TABLE IF NOT EXISTS {table} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    origin_tag TEXT NOT NULL,
    source_url TEXT NOT NULL,
    record_type TEXT NOT NULL,
    text TEXT NOT NULL,
    scraped_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_{table}_origin ON {table}(origin_tag);
"#
    )
}

/// Parameterized insert for one record
pub fn insert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {table} (origin_tag, source_url, record_type, text, scraped_at) \
         VALUES (?, ?, ?, ?, ?)"
    )
}
