//! Relational record storage using SQLite
//!
//! The record table is a write-only log: rows are appended inside one
//! transaction per persist call and never updated or deleted. Each call opens
//! its own connection and closes it before returning, so no handle outlives a
//! cycle.

mod schema;

pub use schema::*;

use crate::config::{is_valid_identifier, DatabaseConfig};
use crate::error::{Error, Result};
use crate::models::Record;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode};
use sqlx::{ConnectOptions, Connection, FromRow};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// A row read back from the record table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: i64,
    pub origin_tag: String,
    pub source_url: String,
    pub record_type: String,
    pub text: String,
    pub scraped_at: String,
}

/// Row count for one origin
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OriginCount {
    pub origin_tag: String,
    pub row_count: i64,
}

/// Handle describing where records live; holds no open connection
#[derive(Debug, Clone)]
pub struct RecordDb {
    path: PathBuf,
    table: String,
    options: SqliteConnectOptions,
}

impl RecordDb {
    pub fn new(path: &Path, config: &DatabaseConfig) -> Result<Self> {
        if !is_valid_identifier(&config.table) {
            return Err(Error::Config(format!(
                "database.table '{}' must be a plain SQL identifier",
                config.table
            )));
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(config.busy_timeout_secs));

        Ok(Self {
            path: path.to_path_buf(),
            table: config.table.clone(),
            options,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Open a fresh connection. Callers release it with [`RecordDb::release`].
    pub async fn connect(&self) -> Result<SqliteConnection> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        debug!("Connecting to SQLite database at {:?}", self.path);
        Ok(self.options.connect().await?)
    }

    /// Close a connection, logging rather than failing on close errors
    pub async fn release(conn: SqliteConnection) {
        if let Err(e) = conn.close().await {
            warn!("Failed to close database connection cleanly: {}", e);
        }
    }

    async fn ensure_schema(&self, conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(&schema_sql(&self.table))
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Create the record table if it does not exist
    pub async fn init_schema(&self) -> Result<()> {
        info!("Ensuring table '{}' exists", self.table);
        let mut conn = self.connect().await?;
        let result = self.ensure_schema(&mut conn).await;
        Self::release(conn).await;
        result
    }

    /// Append records in one transaction; all rows land or none do
    pub async fn insert_records(&self, records: &[Record]) -> Result<usize> {
        let mut conn = self
            .connect()
            .await
            .map_err(|e| Error::Persistence(format!("could not open database: {}", e)))?;
        let result = self.insert_in_transaction(&mut conn, records).await;
        Self::release(conn).await;
        result
    }

    async fn insert_in_transaction(
        &self,
        conn: &mut SqliteConnection,
        records: &[Record],
    ) -> Result<usize> {
        self.ensure_schema(conn)
            .await
            .map_err(|e| Error::Persistence(format!("table setup failed: {}", e)))?;

        let sql = insert_sql(&self.table);
        let scraped_at = Utc::now().to_rfc3339();
        let mut tx = conn.begin().await?;

        for (index, record) in records.iter().enumerate() {
            let inserted = sqlx::query(&sql)
                .bind(record.origin_tag())
                .bind(record.source_url().as_str())
                .bind(record.record_type().as_str())
                .bind(record.text())
                .bind(&scraped_at)
                .execute(&mut *tx)
                .await;

            if let Err(e) = inserted {
                if let Err(rb) = tx.rollback().await {
                    warn!("Rollback failed: {}", rb);
                }
                return Err(Error::Persistence(format!(
                    "insert {} of {} failed, transaction rolled back: {}",
                    index + 1,
                    records.len(),
                    e
                )));
            }
        }

        tx.commit()
            .await
            .map_err(|e| Error::Persistence(format!("commit failed: {}", e)))?;
        debug!("Committed {} rows to {}", records.len(), self.table);
        Ok(records.len())
    }

    /// Total rows in the record table
    pub async fn count_records(&self) -> Result<i64> {
        let mut conn = self.connect().await?;
        let result = async {
            self.ensure_schema(&mut conn).await?;
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.table))
                .fetch_one(&mut conn)
                .await?;
            Ok::<i64, Error>(count)
        }
        .await;
        Self::release(conn).await;
        result
    }

    /// Row counts grouped by origin
    pub async fn count_by_origin(&self) -> Result<Vec<OriginCount>> {
        let mut conn = self.connect().await?;
        let result = async {
            self.ensure_schema(&mut conn).await?;
            let rows = sqlx::query_as::<_, OriginCount>(&format!(
                "SELECT origin_tag, COUNT(*) AS row_count FROM {} GROUP BY origin_tag ORDER BY origin_tag",
                self.table
            ))
            .fetch_all(&mut conn)
            .await?;
            Ok::<_, Error>(rows)
        }
        .await;
        Self::release(conn).await;
        result
    }

    /// Rows for one origin in insertion order
    pub async fn list_records(&self, origin_tag: &str) -> Result<Vec<StoredRecord>> {
        let mut conn = self.connect().await?;
        let result = async {
            self.ensure_schema(&mut conn).await?;
            let rows = sqlx::query_as::<_, StoredRecord>(&format!(
                "SELECT * FROM {} WHERE origin_tag = ? ORDER BY id",
                self.table
            ))
            .bind(origin_tag)
            .fetch_all(&mut conn)
            .await?;
            Ok::<_, Error>(rows)
        }
        .await;
        Self::release(conn).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordType;
    use tempfile::TempDir;
    use url::Url;

    fn setup_test_db() -> (RecordDb, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db = RecordDb::new(&tmp.path().join("test.db"), &DatabaseConfig::default()).unwrap();
        (db, tmp)
    }

    fn records(texts: &[&str]) -> Vec<Record> {
        let url = Url::parse("http://test/page").unwrap();
        texts
            .iter()
            .map(|t| Record::new("demo", url.clone(), RecordType::Paragraph, *t).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_schema_setup_is_idempotent() {
        let (db, _tmp) = setup_test_db();
        db.init_schema().await.unwrap();
        db.init_schema().await.unwrap();

        let mut conn = db.connect().await.unwrap();
        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'scraped_data'",
        )
        .fetch_one(&mut conn)
        .await
        .unwrap();
        RecordDb::release(conn).await;

        assert_eq!(tables, 1);
        assert_eq!(db.count_records().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_preserves_order() {
        let (db, _tmp) = setup_test_db();
        let written = db.insert_records(&records(&["one", "two", "three"])).await.unwrap();
        assert_eq!(written, 3);

        let stored = db.list_records("demo").await.unwrap();
        let texts: Vec<_> = stored.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
        assert_eq!(stored[0].record_type, "paragraph");
        assert_eq!(stored[0].source_url, "http://test/page");
    }

    #[tokio::test]
    async fn test_failed_insert_rolls_back_everything() {
        let (db, _tmp) = setup_test_db();
        db.init_schema().await.unwrap();

        let mut conn = db.connect().await.unwrap();
        sqlx::query(
            "CREATE TRIGGER fail_on_boom BEFORE INSERT ON scraped_data \
             WHEN NEW.text = 'boom' BEGIN SELECT RAISE(ABORT, 'forced failure'); END;",
        )
        .execute(&mut conn)
        .await
        .unwrap();
        RecordDb::release(conn).await;

        let err = db
            .insert_records(&records(&["a", "b", "boom", "d"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
        assert!(err.to_string().contains("insert 3 of 4"));
        assert_eq!(db.count_records().await.unwrap(), 0);

        db.insert_records(&records(&["fine"])).await.unwrap();
        assert_eq!(db.count_records().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_appends_across_calls() {
        let (db, _tmp) = setup_test_db();
        db.insert_records(&records(&["a"])).await.unwrap();
        db.insert_records(&records(&["a"])).await.unwrap();

        let counts = db.count_by_origin().await.unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].origin_tag, "demo");
        assert_eq!(counts[0].row_count, 2);
    }

    #[test]
    fn test_rejects_bad_table_name() {
        let tmp = TempDir::new().unwrap();
        let config = DatabaseConfig {
            table: "x; DROP TABLE y".to_string(),
            ..DatabaseConfig::default()
        };
        assert!(RecordDb::new(&tmp.path().join("t.db"), &config).is_err());
    }
}
