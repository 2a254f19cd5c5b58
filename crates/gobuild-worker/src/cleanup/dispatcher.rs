//! Periodic, concurrent cleanup of all registered cleaners.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{CleanError, Cleaner};

/// A cleaner that failed during a cycle.
#[derive(Debug, Clone)]
pub struct CleanupFailure {
    pub cleaner: String,
    pub error: String,
}

/// Outcome of a single cleanup cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Failures other than cancellation, in registration order.
    pub failures: Vec<CleanupFailure>,
    pub elapsed: Duration,
    /// The cycle took longer than the dispatch interval.
    pub overran: bool,
}

/// Runs every registered [`Cleaner`] on a fixed interval.
///
/// Each cycle fans out one task per cleaner. All tasks share a cancellation
/// token that fires when the interval elapses, so a cycle never outlives
/// its slot by more than the time the cleaners take to notice.
pub struct CleanupDispatcher {
    interval: Duration,
    cleaners: Vec<Arc<dyn Cleaner>>,
}

impl CleanupDispatcher {
    pub fn new(interval: Duration, cleaners: Vec<Arc<dyn Cleaner>>) -> Self {
        Self { interval, cleaners }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run cycles until `cancel` fires. The first cycle starts one interval
    /// after the call.
    pub async fn start(&self, cancel: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            cleaners = self.cleaners.len(),
            "cleanup dispatcher started"
        );

        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.run_cycle(&cancel).await;
                }
            }
        }

        info!("cleanup dispatcher stopped");
    }

    /// Run every cleaner once, concurrently, bounded by the interval.
    pub async fn run_cycle(&self, parent: &CancellationToken) -> CycleReport {
        let started = Instant::now();
        let cycle = parent.child_token();

        let deadline = {
            let cycle = cycle.clone();
            let interval = self.interval;
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => cycle.cancel(),
                    _ = cycle.cancelled() => {}
                }
            })
        };

        let mut tasks = JoinSet::new();
        for (index, cleaner) in self.cleaners.iter().enumerate() {
            let cleaner = Arc::clone(cleaner);
            let token = cycle.clone();
            tasks.spawn(async move { (index, cleaner.clean(token).await) });
        }

        let mut results: Vec<Option<Result<(), CleanError>>> =
            (0..self.cleaners.len()).map(|_| None).collect();
        // A panicked task leaves its slot empty and is reported below.
        while let Some(joined) = tasks.join_next().await {
            if let Ok((index, result)) = joined {
                results[index] = Some(result);
            }
        }

        // Stop the deadline timer.
        cycle.cancel();
        let _ = deadline.await;

        let mut report = CycleReport::default();
        for (cleaner, result) in self.cleaners.iter().zip(results) {
            let err = match result {
                Some(Ok(())) => continue,
                Some(Err(e)) if e.is_cancelled() => {
                    debug!(cleaner = cleaner.name(), "cleanup cancelled");
                    continue;
                }
                Some(Err(e)) => e.to_string(),
                None => "cleanup task panicked".to_string(),
            };

            error!(cleaner = cleaner.name(), error = %err, "cleanup failed");
            report.failures.push(CleanupFailure {
                cleaner: cleaner.name().to_string(),
                error: err,
            });
        }

        report.elapsed = started.elapsed();
        if report.elapsed > self.interval {
            report.overran = true;
            warn!(
                elapsed_ms = report.elapsed.as_millis() as u64,
                interval_ms = self.interval.as_millis() as u64,
                "cleanup cycle took longer than the dispatch interval"
            );
        } else {
            debug!(
                elapsed_ms = report.elapsed.as_millis() as u64,
                "cleanup cycle finished"
            );
        }

        report
    }
}
