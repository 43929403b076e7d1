//! Scheduled run command

use crate::config::Config;
use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::schedule::{Orchestrator, RunSummary};
use tracing::{info, warn};

/// Command-line overrides for one run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Run a single cycle regardless of the configured schedule
    pub once: bool,
    pub interval_secs: Option<u64>,
    pub max_iterations: Option<u64>,
    /// Replaces the configured query
    pub query: Option<String>,
}

/// Run cycles until the schedule ends or Ctrl-C is pressed
pub async fn cmd_run(config: &Config, options: RunOptions) -> Result<RunSummary> {
    let spec = config.schedule.to_spec()?.with_overrides(
        options.once,
        options.interval_secs,
        options.max_iterations,
    )?;

    let mut pipeline = Pipeline::from_config(config)?;
    if options.query.is_some() {
        pipeline.set_query(options.query);
    }
    pipeline.sink().db().init_schema().await?;

    info!(
        sources = pipeline.sources().len(),
        mode = ?spec.mode(),
        "Starting harvest"
    );

    let mut orchestrator = Orchestrator::new(pipeline, spec);
    let shutdown = orchestrator.shutdown_handle();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current cycle");
            shutdown.trigger();
        }
    });

    let summary = orchestrator.run().await;
    signal.abort();
    summary
}

pub fn print_run_summary(summary: &RunSummary) {
    println!("\n✓ Harvest finished\n");
    println!("Cycles: {}", summary.cycles);
    println!("Records written: {}", summary.records_written);
    println!("Source failures: {}", summary.failed_sources);

    if let Some(last) = &summary.last {
        if !last.per_source_errors.is_empty() {
            println!("\nLast cycle errors:");
            for (source, error) in &last.per_source_errors {
                println!("  • {}: {}", source, error);
            }
        }
    }
}
