//! Cycle scheduling
//!
//! The orchestrator runs one cycle immediately, then repeats on the configured
//! cadence until the schedule is exhausted or a shutdown is requested:
//!
//! `Idle -> Running(1) -> Waiting -> Running(2) -> ... -> Stopped`
//!
//! Cycles never overlap and are never interrupted; a shutdown request is
//! honoured between cycles.

use crate::error::{Error, Result};
use crate::models::RunResult;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, warn};

/// How cycles repeat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleMode {
    Once,
    #[serde(alias = "fixed_interval")]
    Interval,
    Daily,
}

/// Validated schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSpec {
    mode: ScheduleMode,
    interval_secs: Option<u64>,
    max_iterations: Option<u64>,
    daily_at: NaiveTime,
}

impl ScheduleSpec {
    pub fn new(
        mode: ScheduleMode,
        interval_secs: Option<u64>,
        max_iterations: Option<u64>,
        daily_at: NaiveTime,
    ) -> Result<Self> {
        if mode == ScheduleMode::Interval && !matches!(interval_secs, Some(n) if n > 0) {
            return Err(Error::Config(
                "schedule.interval_secs must be a positive integer for interval mode".to_string(),
            ));
        }
        if max_iterations == Some(0) {
            return Err(Error::Config(
                "schedule.max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            mode,
            interval_secs,
            max_iterations,
            daily_at,
        })
    }

    /// Run a single cycle
    pub fn once() -> Self {
        Self {
            mode: ScheduleMode::Once,
            interval_secs: None,
            max_iterations: None,
            daily_at: NaiveTime::MIN,
        }
    }

    /// Repeat every `secs` seconds
    pub fn every(secs: u64, max_iterations: Option<u64>) -> Result<Self> {
        Self::new(ScheduleMode::Interval, Some(secs), max_iterations, NaiveTime::MIN)
    }

    pub fn mode(&self) -> ScheduleMode {
        self.mode
    }

    pub fn interval_secs(&self) -> Option<u64> {
        self.interval_secs
    }

    pub fn max_iterations(&self) -> Option<u64> {
        self.max_iterations
    }

    pub fn daily_at(&self) -> NaiveTime {
        self.daily_at
    }

    /// Apply command-line overrides on top of the configured schedule
    pub fn with_overrides(
        mut self,
        once: bool,
        interval_secs: Option<u64>,
        max_iterations: Option<u64>,
    ) -> Result<Self> {
        if once {
            self.mode = ScheduleMode::Once;
        } else if let Some(secs) = interval_secs {
            self.mode = ScheduleMode::Interval;
            self.interval_secs = Some(secs);
        }
        if max_iterations.is_some() {
            self.max_iterations = max_iterations;
        }
        Self::new(self.mode, self.interval_secs, self.max_iterations, self.daily_at)
    }

    /// Whether another cycle should follow cycle number `completed`
    pub fn has_next(&self, completed: u64) -> bool {
        if self.mode == ScheduleMode::Once {
            return false;
        }
        match self.max_iterations {
            Some(max) => completed < max,
            None => true,
        }
    }
}

/// Time from `now` until the next occurrence of `at` (UTC)
pub fn until_next_daily(now: DateTime<Utc>, at: NaiveTime) -> Duration {
    let today = now.date_naive().and_time(at).and_utc();
    let next = if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    };
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

/// Orchestrator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OrchestratorState {
    Idle,
    Running { cycle: u64 },
    Waiting { next_cycle: u64 },
    Stopped,
}

/// One fetch-extract-persist pass over every source
#[async_trait]
pub trait CycleRunner: Send + Sync {
    async fn run_cycle(&self, cycle: u64) -> RunResult;
}

/// Requests a graceful stop from outside the orchestrator
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Totals across a whole run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub cycles: u64,
    pub records_written: usize,
    pub failed_sources: usize,
    pub last: Option<RunResult>,
}

/// Drives cycles according to a schedule
pub struct Orchestrator<R: CycleRunner> {
    runner: R,
    spec: ScheduleSpec,
    state: OrchestratorState,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<R: CycleRunner> Orchestrator<R> {
    pub fn new(runner: R, spec: ScheduleSpec) -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            runner,
            spec,
            state: OrchestratorState::Idle,
            shutdown_tx: Arc::new(tx),
            shutdown_rx: rx,
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    #[cfg(test)]
    fn runner(&self) -> &R {
        &self.runner
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Run cycles until the schedule ends or shutdown is requested
    pub async fn run(&mut self) -> Result<RunSummary> {
        if self.state != OrchestratorState::Idle {
            return Err(Error::Other(
                "orchestrator has already run; construct a new one".to_string(),
            ));
        }

        let mut summary = RunSummary::default();
        let mut cycle = 1u64;

        loop {
            self.state = OrchestratorState::Running { cycle };
            let started = Instant::now();
            info!(cycle, "Starting cycle");

            let result = self.runner.run_cycle(cycle).await;
            summary.cycles = cycle;
            summary.records_written += result.records_written;
            summary.failed_sources += result.per_source_errors.len();
            if result.is_clean() {
                info!(cycle, records = result.records_written, "Cycle complete");
            } else {
                warn!(
                    cycle,
                    records = result.records_written,
                    failed = result.per_source_errors.len(),
                    "Cycle complete with source failures"
                );
            }
            summary.last = Some(result);

            if !self.spec.has_next(cycle) {
                info!(cycle, "Schedule exhausted");
                break;
            }
            if self.shutdown_requested() {
                info!(cycle, "Shutdown requested");
                break;
            }

            self.state = OrchestratorState::Waiting {
                next_cycle: cycle + 1,
            };
            let deadline = self.next_start(started);
            info!(
                next_cycle = cycle + 1,
                wait_secs = deadline.saturating_duration_since(Instant::now()).as_secs(),
                "Waiting for next cycle"
            );

            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {}
                _ = self.shutdown_rx.wait_for(|stop| *stop) => {
                    info!(cycle, "Shutdown requested while waiting");
                    break;
                }
            }

            cycle += 1;
        }

        self.state = OrchestratorState::Stopped;
        Ok(summary)
    }

    fn next_start(&self, started: Instant) -> Instant {
        match self.spec.mode {
            ScheduleMode::Interval => {
                started + Duration::from_secs(self.spec.interval_secs.unwrap_or_default())
            }
            ScheduleMode::Daily => Instant::now() + until_next_daily(Utc::now(), self.spec.daily_at),
            ScheduleMode::Once => Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRunner {
        starts: Mutex<Vec<Instant>>,
        stop_after: Option<(u64, ShutdownHandleSlot)>,
    }

    type ShutdownHandleSlot = Arc<Mutex<Option<ShutdownHandle>>>;

    #[async_trait]
    impl CycleRunner for RecordingRunner {
        async fn run_cycle(&self, cycle: u64) -> RunResult {
            self.starts.lock().unwrap().push(Instant::now());
            if let Some((at, slot)) = &self.stop_after {
                if *at == cycle {
                    if let Some(handle) = slot.lock().unwrap().as_ref() {
                        handle.trigger();
                    }
                }
            }
            let mut result = RunResult::new(cycle);
            result.records_written = 2;
            result
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_interval_runs_bounded_cycles() {
        let spec = ScheduleSpec::every(5, Some(3)).unwrap();
        let mut orchestrator = Orchestrator::new(RecordingRunner::default(), spec);
        assert_eq!(orchestrator.state(), OrchestratorState::Idle);

        let summary = orchestrator.run().await.unwrap();

        assert_eq!(summary.cycles, 3);
        assert_eq!(summary.records_written, 6);
        assert_eq!(orchestrator.state(), OrchestratorState::Stopped);

        let starts = orchestrator.runner().starts.lock().unwrap().clone();
        assert_eq!(starts.len(), 3);
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(5));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_daily_waits_until_next_run_time() {
        let at = (Utc::now() + ChronoDuration::hours(2)).time();
        let expected = until_next_daily(Utc::now(), at);
        let spec = ScheduleSpec::new(ScheduleMode::Daily, None, Some(2), at).unwrap();
        let mut orchestrator = Orchestrator::new(RecordingRunner::default(), spec);

        let summary = orchestrator.run().await.unwrap();

        assert_eq!(summary.cycles, 2);
        assert_eq!(orchestrator.state(), OrchestratorState::Stopped);

        let starts = orchestrator.runner().starts.lock().unwrap().clone();
        assert_eq!(starts.len(), 2);
        let gap = starts[1] - starts[0];
        assert!(gap + Duration::from_secs(1) >= expected, "gap {:?} < {:?}", gap, expected);
        assert!(gap <= expected + Duration::from_secs(1), "gap {:?} > {:?}", gap, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_once_runs_single_cycle() {
        let mut orchestrator = Orchestrator::new(RecordingRunner::default(), ScheduleSpec::once());
        let summary = orchestrator.run().await.unwrap();
        assert_eq!(summary.cycles, 1);
        assert_eq!(orchestrator.state(), OrchestratorState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_is_terminal() {
        let mut orchestrator = Orchestrator::new(RecordingRunner::default(), ScheduleSpec::once());
        orchestrator.run().await.unwrap();
        assert!(orchestrator.run().await.is_err());
        assert_eq!(orchestrator.runner().starts.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_cycle_finishes_cycle_then_stops() {
        let slot: ShutdownHandleSlot = Arc::new(Mutex::new(None));
        let runner = RecordingRunner {
            starts: Mutex::new(Vec::new()),
            stop_after: Some((2, Arc::clone(&slot))),
        };
        let mut orchestrator = Orchestrator::new(runner, ScheduleSpec::every(60, None).unwrap());
        *slot.lock().unwrap() = Some(orchestrator.shutdown_handle());

        let summary = orchestrator.run().await.unwrap();
        assert_eq!(summary.cycles, 2);
        assert_eq!(orchestrator.state(), OrchestratorState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_while_waiting() {
        let mut orchestrator =
            Orchestrator::new(RecordingRunner::default(), ScheduleSpec::every(3600, None).unwrap());
        let handle = orchestrator.shutdown_handle();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            handle.trigger();
        });

        let summary = orchestrator.run().await.unwrap();
        assert_eq!(summary.cycles, 1);
        assert_eq!(orchestrator.state(), OrchestratorState::Stopped);
    }

    #[test]
    fn test_spec_validation() {
        assert!(ScheduleSpec::every(0, None).is_err());
        assert!(ScheduleSpec::every(5, Some(0)).is_err());
        assert!(ScheduleSpec::new(ScheduleMode::Interval, None, None, NaiveTime::MIN).is_err());
        assert!(ScheduleSpec::new(ScheduleMode::Daily, None, Some(2), NaiveTime::MIN).is_ok());
    }

    #[test]
    fn test_has_next() {
        let once = ScheduleSpec::once();
        assert!(!once.has_next(1));

        let bounded = ScheduleSpec::every(5, Some(3)).unwrap();
        assert!(bounded.has_next(1));
        assert!(bounded.has_next(2));
        assert!(!bounded.has_next(3));

        let unbounded = ScheduleSpec::every(5, None).unwrap();
        assert!(unbounded.has_next(10_000));
    }

    #[test]
    fn test_overrides() {
        let spec = ScheduleSpec::every(5, Some(3)).unwrap();
        let once = spec.clone().with_overrides(true, None, None).unwrap();
        assert_eq!(once.mode(), ScheduleMode::Once);

        let faster = spec.with_overrides(false, Some(1), Some(10)).unwrap();
        assert_eq!(faster.interval_secs(), Some(1));
        assert_eq!(faster.max_iterations(), Some(10));

        assert!(ScheduleSpec::once().with_overrides(false, Some(0), None).is_err());
    }

    #[test]
    fn test_until_next_daily() {
        let at = NaiveTime::from_hms_opt(6, 0, 0).unwrap();

        let before = Utc.with_ymd_and_hms(2024, 3, 1, 5, 30, 0).unwrap();
        assert_eq!(until_next_daily(before, at), Duration::from_secs(30 * 60));

        let after = Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap();
        assert_eq!(until_next_daily(after, at), Duration::from_secs(23 * 3600));

        let exact = Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap();
        assert_eq!(until_next_daily(exact, at), Duration::from_secs(24 * 3600));
    }
}
