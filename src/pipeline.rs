//! One scrape cycle over every configured source
//!
//! Sources run sequentially in configuration order. Each one is fetched,
//! extracted and persisted on its own; a failure is logged, recorded in the
//! cycle's [`RunResult`] and the cycle moves on to the next source.

use crate::config::Config;
use crate::crawl::Fetcher;
use crate::error::Result;
use crate::meta::RecordDb;
use crate::models::{Record, RunResult};
use crate::parse::extract;
use crate::schedule::CycleRunner;
use crate::source::{build_source, Source};
use crate::store::{versioned_path, PersistReport, RecordSink};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// A source paired with the CSV file it writes
pub struct PipelineSource {
    source: Box<dyn Source>,
    csv_path: PathBuf,
}

impl PipelineSource {
    pub fn new(source: Box<dyn Source>, csv_path: PathBuf) -> Self {
        Self { source, csv_path }
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

/// Fetch, extract and persist for every source
pub struct Pipeline {
    sources: Vec<PipelineSource>,
    fetcher: Fetcher,
    sink: RecordSink,
    query: Option<String>,
    versioned: bool,
}

impl Pipeline {
    pub fn new(
        sources: Vec<PipelineSource>,
        fetcher: Fetcher,
        sink: RecordSink,
        query: Option<String>,
    ) -> Self {
        Self {
            sources,
            fetcher,
            sink,
            query,
            versioned: false,
        }
    }

    /// Build the pipeline described by a validated config
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = Fetcher::new(&config.fetch)?;
        let db = RecordDb::new(&config.db_path(), &config.database)?;
        let sink = RecordSink::new(db, config.output.clone());

        let sources = config
            .sources
            .iter()
            .map(|s| PipelineSource::new(build_source(s), config.csv_path(s)))
            .collect();

        let mut pipeline = Self::new(sources, fetcher, sink, config.query.clone());
        pipeline.versioned = config.output.versioned;
        Ok(pipeline)
    }

    pub fn sources(&self) -> &[PipelineSource] {
        &self.sources
    }

    pub fn sink(&self) -> &RecordSink {
        &self.sink
    }

    pub fn set_query(&mut self, query: Option<String>) {
        self.query = query;
    }

    /// Fetch and extract one source without persisting
    pub async fn collect(&self, entry: &PipelineSource) -> Result<Vec<Record>> {
        let fetched = entry
            .source
            .fetch(&self.fetcher, self.query.as_deref())
            .await?;
        let options = entry.source.extract_options();

        let mut records = Vec::new();
        for payload in &fetched.payloads {
            records.extend(extract(payload, entry.name(), &fetched.url, &options)?);
        }
        debug!(
            source = entry.name(),
            records = records.len(),
            "Extracted records from {}",
            fetched.url
        );
        Ok(records)
    }

    async fn run_source(
        &self,
        entry: &PipelineSource,
        started: DateTime<Utc>,
    ) -> Result<PersistReport> {
        let records = self.collect(entry).await?;

        let csv_path = if self.versioned {
            versioned_path(entry.csv_path(), started)
        } else {
            entry.csv_path().to_path_buf()
        };
        Ok(self.sink.persist(&records, &csv_path).await)
    }
}

#[async_trait]
impl CycleRunner for Pipeline {
    async fn run_cycle(&self, cycle: u64) -> RunResult {
        let started = Utc::now();
        let mut result = RunResult::new(cycle);

        for entry in &self.sources {
            let failure = match self.run_source(entry, started).await {
                Ok(report) => {
                    // Committed rows count even when the CSV write failed
                    result.records_written += report.outcome.rows_written;
                    if report.is_ok() {
                        info!(
                            source = entry.name(),
                            cycle,
                            rows = report.outcome.rows_written,
                            "Source complete"
                        );
                    }
                    report.error
                }
                Err(e) => Some(e),
            };

            if let Some(e) = failure {
                error!(
                    source = entry.name(),
                    cycle,
                    kind = e.kind(),
                    "Source failed: {}",
                    e
                );
                result.record_error(entry.name(), &e);
            }
        }

        result.completed_at = Utc::now();
        result
    }
}
