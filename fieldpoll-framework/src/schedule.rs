//! The periodic collect-post-purge loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::client::ClientFactory;
use crate::collection::CollectionRun;
use crate::forwarder::Forwarder;
use crate::resolver::DeviceTargets;

/// What one cycle did.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub devices: usize,
    pub points: usize,
    /// Whether the forwarder accepted the payload.
    pub delivered: bool,
    /// Wall-clock time of collection plus delivery.
    pub elapsed: Duration,
    /// Time to wait before the next cycle.
    pub sleep: Duration,
}

/// Time left in the interval after a cycle, floored at zero.
///
/// An overrunning cycle is followed immediately by the next one, without a
/// burst of catch-up cycles.
pub fn sleep_after(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// Runs a [`CollectionRun`] every polling interval, one cycle at a time.
pub struct SchedulingLoop {
    collection: CollectionRun,
    targets: DeviceTargets,
    factory: Arc<dyn ClientFactory>,
    forwarder: Arc<dyn Forwarder>,
    interval: Duration,
}

impl SchedulingLoop {
    pub fn new(
        collection: CollectionRun,
        targets: DeviceTargets,
        factory: Arc<dyn ClientFactory>,
        forwarder: Arc<dyn Forwarder>,
        interval: Duration,
    ) -> Self {
        Self {
            collection,
            targets,
            factory,
            forwarder,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn targets(&self) -> &DeviceTargets {
        &self.targets
    }

    /// Collect, post, and purge once.
    ///
    /// The backlog is only purged after the fresh payload was delivered.
    pub async fn run_cycle(&self) -> CycleReport {
        let started = Instant::now();

        let payload = self.collection.run(&self.targets, &self.factory).await;
        let delivered = self.forwarder.post(&payload).await;
        if delivered {
            self.forwarder.purge().await;
        } else {
            tracing::warn!("Payload not delivered, deferring purge");
        }

        let elapsed = started.elapsed();
        let sleep = sleep_after(self.interval, elapsed);

        if sleep.is_zero() {
            tracing::warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                interval_secs = self.interval.as_secs(),
                "Cycle overran the polling interval"
            );
        }

        CycleReport {
            devices: payload.device_point_sets.len(),
            points: payload.point_count(),
            delivered,
            elapsed,
            sleep,
        }
    }

    /// Run `cycles` cycles, sleeping between them but not after the last.
    pub async fn run_cycles(&self, cycles: usize) -> Vec<CycleReport> {
        let mut reports = Vec::with_capacity(cycles);
        for cycle in 0..cycles {
            let report = self.run_cycle().await;
            let sleep = report.sleep;
            reports.push(report);
            if cycle + 1 < cycles {
                tokio::time::sleep(sleep).await;
            }
        }
        reports
    }

    /// Run forever. Stopped by dropping the future.
    pub async fn run(&self) {
        tracing::info!(
            devices = self.targets.len(),
            interval_secs = self.interval.as_secs(),
            "Scheduling loop started"
        );

        loop {
            let report = self.run_cycle().await;
            tracing::debug!(
                points = report.points,
                delivered = report.delivered,
                sleep_ms = report.sleep.as_millis() as u64,
                "Cycle finished"
            );
            tokio::time::sleep(report.sleep).await;
        }
    }
}
