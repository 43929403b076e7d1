//! Table setup command

use crate::config::Config;
use crate::error::Result;
use crate::meta::RecordDb;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Where the record table was set up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitDbInfo {
    pub db_path: String,
    pub table: String,
    pub row_count: i64,
}

/// Create the record table if needed. Safe to run repeatedly.
pub async fn cmd_init_db(config: &Config) -> Result<InitDbInfo> {
    let db = RecordDb::new(&config.db_path(), &config.database)?;
    db.init_schema().await?;
    let row_count = db.count_records().await?;

    info!("Table '{}' ready with {} rows", db.table(), row_count);

    Ok(InitDbInfo {
        db_path: db.path().display().to_string(),
        table: db.table().to_string(),
        row_count,
    })
}

pub fn print_init_db(info: &InitDbInfo) {
    println!("✓ Table '{}' ready in {}", info.table, info.db_path);
    println!("  Existing rows: {}", info.row_count);
}
