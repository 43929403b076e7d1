//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::meta::{OriginCount, RecordDb};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One configured source as shown by `status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceStatus {
    pub name: String,
    pub kind: String,
    pub csv_path: String,
    pub stored_rows: i64,
}

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub table: String,
    pub query: Option<String>,
    pub schedule: String,
    pub db_reachable: bool,
    pub total_rows: i64,
    pub sources: Vec<SourceStatus>,
}

/// Gather configured sources and stored row counts
pub async fn cmd_status(config: &Config) -> Result<StatusInfo> {
    info!("Getting status");

    let spec = config.schedule.to_spec()?;
    let schedule = match spec.interval_secs() {
        Some(secs) => format!("{:?} every {}s", spec.mode(), secs),
        None => format!("{:?}", spec.mode()),
    };
    let schedule = match spec.max_iterations() {
        Some(max) => format!("{}, at most {} cycles", schedule, max),
        None => schedule,
    };

    let db = RecordDb::new(&config.db_path(), &config.database)?;
    let (db_reachable, counts) = match db.count_by_origin().await {
        Ok(counts) => (true, counts),
        Err(e) => {
            debug!("Database unavailable: {:?}", e);
            (false, Vec::new())
        }
    };

    let rows_for = |name: &str| {
        counts
            .iter()
            .find(|c: &&OriginCount| c.origin_tag == name)
            .map(|c| c.row_count)
            .unwrap_or(0)
    };

    let sources = config
        .sources
        .iter()
        .map(|s| SourceStatus {
            name: s.name.clone(),
            kind: s.kind_label().to_string(),
            csv_path: config.csv_path(s).display().to_string(),
            stored_rows: rows_for(&s.name),
        })
        .collect();

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: db.path().display().to_string(),
        table: db.table().to_string(),
        query: config.query.clone(),
        schedule,
        db_reachable,
        total_rows: counts.iter().map(|c| c.row_count).sum(),
        sources,
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 harvest Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {} (table '{}')", status.db_path, status.table);
    if !status.db_reachable {
        println!("  ✗ Not reachable");
    }
    println!("Schedule: {}", status.schedule);
    println!("Query: {}", status.query.as_deref().unwrap_or("(none)"));
    println!("Stored rows: {}", status.total_rows);

    println!("\nSources:");
    for source in &status.sources {
        println!("• {} [{}]", source.name, source.kind);
        println!("  CSV: {}", source.csv_path);
        println!("  Rows: {}", source.stored_rows);
    }
}
