use crate::cycle::Pipeline;
use std::time::Duration;
use tokio::time::{
    sleep_until,
    Instant,
};
use tokio_util::sync::CancellationToken;

/// Fixed-rate ticks at `epoch + n * period`.
///
/// Ticks that pass while a cycle is still running are dropped rather than
/// queued, and lateness never shifts the grid.
#[derive(Debug, Clone)]
pub struct TickSchedule {
    epoch: Instant,
    period: Duration,
    next: u64,
}

impl TickSchedule {
    pub fn new(epoch: Instant, period: Duration) -> Self {
        assert!(!period.is_zero(), "tick period must be non-zero");
        Self { epoch, period, next: 0 }
    }

    fn deadline(&self, index: u64) -> Instant {
        self.epoch + self.period.saturating_mul(index.min(u32::MAX as u64) as u32)
    }

    /// Deadline of the next tick to wait for, given that the caller is free
    /// at `now`. Returns the deadline and how many ticks were dropped.
    ///
    /// A tick whose deadline is exactly `now` is still taken.
    pub fn next_tick(&mut self, now: Instant) -> (Instant, u64) {
        let mut index = self.next;
        if now > self.deadline(index) {
            let behind = now.duration_since(self.epoch).as_nanos() / self.period.as_nanos();
            index = (behind as u64).max(index);
            if self.deadline(index) < now {
                index += 1;
            }
        }
        let skipped = index - self.next;
        self.next = index + 1;
        (self.deadline(index), skipped)
    }
}

/// Totals returned when the scheduler stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerSummary {
    pub cycles: u64,
    pub failures: u64,
    pub skipped_ticks: u64,
}

/// Drives the pipeline once per tick until cancelled. Cycles never overlap.
pub struct Scheduler {
    pipeline: Pipeline,
    interval: Duration,
}

impl Scheduler {
    pub fn new(pipeline: Pipeline, interval: Duration) -> Self {
        Self { pipeline, interval }
    }

    pub async fn run(mut self, cancel: CancellationToken) -> (Pipeline, SchedulerSummary) {
        let mut schedule = TickSchedule::new(Instant::now(), self.interval);
        let mut summary = SchedulerSummary::default();

        info!(
            source = %self.pipeline.fetcher().describe(),
            interval_secs = self.interval.as_secs(),
            "Collection scheduler started"
        );

        loop {
            let (deadline, skipped) = schedule.next_tick(Instant::now());
            if skipped > 0 {
                warn!(skipped, "Previous cycle overran the poll interval, dropping ticks");
                summary.skipped_ticks += skipped;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = sleep_until(deadline) => {}
            }

            summary.cycles += 1;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Shutdown requested during a cycle, abandoning it");
                    break;
                }
                result = self.pipeline.run_cycle() => match result {
                    Ok(report) => info!(
                        metrics = report.emit.lines,
                        bytes = report.emit.bytes,
                        dry_run = report.emit.dry_run,
                        fetch_ms = report.fetch_elapsed.as_millis() as u64,
                        timestamp = report.timestamp,
                        "Cycle complete"
                    ),
                    Err(err) => {
                        summary.failures += 1;
                        warn!(stage = %err.stage(), reason = %err, "Cycle aborted, waiting for the next tick");
                    }
                },
            }
        }

        self.pipeline.mark_idle();
        info!(cycles = summary.cycles, failures = summary.failures, "Collection scheduler stopped");
        (self.pipeline, summary)
    }
}
