//! Persistence sink
//!
//! Each batch of records goes to two places: a CSV snapshot for the source,
//! overwritten every cycle, and the append-only relational table. The two
//! writes are independent; a failure in one does not undo or skip the other.

mod snapshot;

pub use snapshot::*;

use crate::config::OutputConfig;
use crate::error::{Error, Result};
use crate::meta::RecordDb;
use crate::models::{PersistOutcome, Record};
use std::path::Path;
use tracing::{debug, error, info};

/// What a persist call wrote, and the first failure if either write failed.
///
/// The outcome is filled in even on failure, so rows already committed to the
/// table are still counted when only the CSV write failed.
#[derive(Debug)]
pub struct PersistReport {
    pub outcome: PersistOutcome,
    pub error: Option<Error>,
}

impl PersistReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Collapse into a `Result`, dropping the partial outcome on failure
    pub fn into_result(self) -> Result<PersistOutcome> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.outcome),
        }
    }
}

/// Writes records to the flat file and the relational store
#[derive(Debug, Clone)]
pub struct RecordSink {
    db: RecordDb,
    output: OutputConfig,
}

impl RecordSink {
    pub fn new(db: RecordDb, output: OutputConfig) -> Self {
        Self { db, output }
    }

    pub fn db(&self) -> &RecordDb {
        &self.db
    }

    /// Persist one source's records.
    ///
    /// An empty batch touches neither the file nor the table. Otherwise the
    /// CSV at `csv_path` is replaced and the rows are appended to the table in
    /// one transaction. Both writes are attempted; the report carries what
    /// landed and the first failure.
    pub async fn persist(&self, records: &[Record], csv_path: &Path) -> PersistReport {
        let mut outcome = PersistOutcome::default();

        if records.is_empty() {
            debug!("No records to persist for {:?}", csv_path);
            return PersistReport {
                outcome,
                error: None,
            };
        }

        let csv_error = match write_snapshot(csv_path, records, self.output.include_origin) {
            Ok(rows) => {
                outcome.csv_rows = rows;
                outcome.csv_path = Some(csv_path.display().to_string());
                None
            }
            Err(e) => {
                error!("Failed to write {:?}: {}", csv_path, e);
                Some(Error::Persistence(format!(
                    "CSV write to {} failed: {}",
                    csv_path.display(),
                    e
                )))
            }
        };

        let db_error = match self.db.insert_records(records).await {
            Ok(rows) => {
                outcome.rows_written = rows;
                None
            }
            Err(e) => {
                error!("Failed to write records to {}: {}", self.db.table(), e);
                Some(e)
            }
        };

        let error = csv_error.or(db_error);
        if error.is_none() {
            info!(
                "Persisted {} records to {:?} and {}",
                records.len(),
                csv_path,
                self.db.table()
            );
        }

        PersistReport { outcome, error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::models::RecordType;
    use tempfile::TempDir;
    use url::Url;

    fn sink(tmp: &TempDir, table: &str) -> RecordSink {
        let config = DatabaseConfig {
            table: table.to_string(),
            ..DatabaseConfig::default()
        };
        let db = RecordDb::new(&tmp.path().join("records.db"), &config).unwrap();
        RecordSink::new(db, OutputConfig::default())
    }

    fn records(texts: &[&str]) -> Vec<Record> {
        let url = Url::parse("http://test/page").unwrap();
        texts
            .iter()
            .map(|t| Record::new("demo", url.clone(), RecordType::Paragraph, *t).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let tmp = TempDir::new().unwrap();
        let sink = sink(&tmp, "scraped_data");
        let csv_path = tmp.path().join("data").join("demo.csv");

        let outcome = sink.persist(&[], &csv_path).await.into_result().unwrap();
        assert_eq!(outcome, PersistOutcome::default());
        assert!(!csv_path.exists());
        assert!(!tmp.path().join("records.db").exists());
    }

    #[tokio::test]
    async fn test_file_overwritten_table_appended() {
        let tmp = TempDir::new().unwrap();
        let sink = sink(&tmp, "scraped_data");
        let csv_path = tmp.path().join("demo.csv");

        sink.persist(&records(&["a", "b"]), &csv_path).await.into_result().unwrap();
        let outcome = sink.persist(&records(&["c"]), &csv_path).await.into_result().unwrap();
        assert_eq!(outcome.rows_written, 1);
        assert_eq!(outcome.csv_rows, 1);

        let content = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.ends_with("demo,http://test/page,paragraph,c\n"));

        assert_eq!(sink.db().count_records().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_table_failure_keeps_csv() {
        let tmp = TempDir::new().unwrap();
        let sink = sink(&tmp, "scraped_data");
        let csv_path = tmp.path().join("demo.csv");
        sink.db().init_schema().await.unwrap();

        let mut conn = sink.db().connect().await.unwrap();
        sqlx::query(
            "CREATE TRIGGER reject_all BEFORE INSERT ON scraped_data \
             BEGIN SELECT RAISE(ABORT, 'read only'); END;",
        )
        .execute(&mut conn)
        .await
        .unwrap();
        RecordDb::release(conn).await;

        let report = sink.persist(&records(&["a", "b"]), &csv_path).await;
        assert!(!report.is_ok());
        assert_eq!(report.outcome.rows_written, 0);
        assert_eq!(report.outcome.csv_rows, 2);
        assert!(matches!(report.error, Some(Error::Persistence(_))));

        let content = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert_eq!(sink.db().count_records().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_csv_failure_still_writes_table() {
        let tmp = TempDir::new().unwrap();
        let sink = sink(&tmp, "scraped_data");
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let report = sink.persist(&records(&["a", "b"]), &blocker.join("demo.csv")).await;
        assert_eq!(report.outcome.rows_written, 2);
        assert_eq!(report.outcome.csv_rows, 0);
        assert!(report.outcome.csv_path.is_none());
        let err = report.into_result().unwrap_err();
        assert!(err.to_string().contains("CSV write"));
        assert_eq!(sink.db().count_records().await.unwrap(), 2);
    }
}
