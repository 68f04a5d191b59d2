use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::client::DirectoryClient;
use super::probe::ProbeExecutor;
use super::result::{Phase, as_millis};
use crate::metrics::MetricsSink;
use crate::mimir::RemoteWrite;

/// Drives the probe loop: one cycle at a time, a fixed pause after each.
pub struct ProbeScheduler<C> {
    executor: ProbeExecutor<C>,
    sink: Arc<MetricsSink>,
    interval: Duration,
    remote_write: Option<RemoteWrite>,
}

impl<C: DirectoryClient> ProbeScheduler<C> {
    pub fn new(executor: ProbeExecutor<C>, sink: Arc<MetricsSink>) -> Self {
        let interval = executor.config().interval;
        Self {
            executor,
            sink,
            interval,
            remote_write: None,
        }
    }

    pub fn with_remote_write(mut self, remote_write: Option<RemoteWrite>) -> Self {
        self.remote_write = remote_write;
        self
    }

    /// Probe until `shutdown` is cancelled.
    ///
    /// The interval is measured from the end of a cycle, so a slow directory
    /// delays the next cycle instead of overlapping it. Failed cycles are
    /// recorded like any other and never stop the loop.
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            url = %self.executor.config().url,
            interval_secs = self.interval.as_secs(),
            "Probe scheduler started"
        );

        while !shutdown.is_cancelled() {
            let result = self.executor.probe_once(&shutdown).await;
            self.sink.record(&result);
            tracing::info!(
                success = result.is_success(),
                failed_phase = result.failed_phase().map(Phase::as_str),
                total_ms = as_millis(result.total),
                "Probe cycle finished"
            );

            if let Some(remote_write) = &self.remote_write {
                remote_write.push(&self.sink.snapshot()).await;
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(self.interval) => {}
            }
        }

        tracing::info!("Probe scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;
    use crate::config::ProbeConfig;
    use crate::ldap_probe::fake::{Cycle, FakeDirectory, Step};

    const SEC: Duration = Duration::from_secs(1);

    fn scheduler(directory: &FakeDirectory, sink: &Arc<MetricsSink>) -> ProbeScheduler<FakeDirectory> {
        let executor = ProbeExecutor::new(directory.clone(), Arc::new(ProbeConfig::sample()));
        ProbeScheduler::new(executor, Arc::clone(sink))
    }

    fn gaps(starts: &[Instant]) -> Vec<Duration> {
        starts.windows(2).map(|w| w[1] - w[0]).collect()
    }

    fn assert_gap(actual: Duration, expected: Duration) {
        let tolerance = Duration::from_millis(20);
        assert!(
            actual >= expected && actual <= expected + tolerance,
            "expected a gap of {expected:?}, got {actual:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_counts_from_cycle_end() {
        // Each cycle takes 3s, so cycles start every 3s + 10s.
        let directory = FakeDirectory::always(Cycle::ok(SEC));
        let sink = Arc::new(MetricsSink::new().unwrap());
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(scheduler(&directory, &sink).run(shutdown.clone()));
        sleep(Duration::from_millis(13_000 * 3 + 6_500)).await;
        shutdown.cancel();
        task.await.unwrap();

        let starts = directory.calls.lock().unwrap().connect_started.clone();
        assert_eq!(starts.len(), 4);
        for gap in gaps(&starts) {
            assert_gap(gap, SEC * 13);
        }
        assert!(sink.snapshot().search_ms >= 1000.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_never_stop_the_loop() {
        let failing_bind = Cycle {
            bind: Step::Fail(SEC, 49),
            ..Cycle::ok(SEC)
        };
        let failing_connect = Cycle {
            connect: Step::Fail(SEC * 2, 91),
            ..Cycle::ok(SEC)
        };
        let script = [
            Cycle::ok(SEC),
            failing_bind,
            Cycle::ok(SEC),
            failing_connect,
            Cycle::ok(SEC),
            failing_bind,
        ];
        // Cycle lengths: ok 3s, failed bind 2s, failed connect 2s.
        let lengths: [u32; 6] = [3, 2, 3, 2, 3, 2];

        let directory = FakeDirectory::new(script, Cycle::ok(SEC));
        let sink = Arc::new(MetricsSink::new().unwrap());
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(scheduler(&directory, &sink).run(shutdown.clone()));
        let busy: u32 = lengths.iter().sum();
        sleep(SEC * (busy + 10 * 5) + Duration::from_millis(500)).await;
        shutdown.cancel();
        task.await.unwrap();

        let calls = directory.calls.lock().unwrap();
        assert_eq!(calls.connect_started.len(), 6);
        for (gap, length) in gaps(&calls.connect_started).into_iter().zip(lengths) {
            assert_gap(gap, SEC * (length + 10));
        }
        assert_eq!(calls.open_sessions(), 0);
        assert_eq!(sink.failures(Phase::Bind), 2);
        assert_eq!(sink.failures(Phase::Connect), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_bind_publishes_its_duration_and_keeps_search_gauge() {
        let script = [
            Cycle {
                search: Step::Ok(SEC * 2),
                ..Cycle::ok(SEC)
            },
            Cycle {
                bind: Step::Fail(SEC * 3, 49),
                ..Cycle::ok(SEC)
            },
        ];
        let directory = FakeDirectory::new(script, Cycle::ok(SEC));
        let sink = Arc::new(MetricsSink::new().unwrap());
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(scheduler(&directory, &sink).run(shutdown.clone()));
        // First cycle ends at 4s, second starts at 14s and ends at 18s.
        sleep(SEC * 20).await;
        shutdown.cancel();
        task.await.unwrap();

        let snapshot = sink.snapshot();
        assert!((snapshot.search_ms - 2000.0).abs() < 5.0);
        assert!((snapshot.bind_ms - 3000.0).abs() < 5.0);
        assert_eq!(sink.failures(Phase::Bind), 1);
        assert_eq!(directory.calls.lock().unwrap().connect_started.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_sleep_stops_promptly() {
        let directory = FakeDirectory::always(Cycle::ok(SEC));
        let sink = Arc::new(MetricsSink::new().unwrap());
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(scheduler(&directory, &sink).run(shutdown.clone()));
        sleep(SEC * 5).await;
        let cancelled_at = Instant::now();
        shutdown.cancel();
        task.await.unwrap();

        assert!(Instant::now() - cancelled_at < SEC);
        assert_eq!(directory.calls.lock().unwrap().connect_started.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_cycle_still_closes_session() {
        let directory = FakeDirectory::always(Cycle {
            search: Step::Ok(SEC * 8),
            ..Cycle::ok(SEC)
        });
        let sink = Arc::new(MetricsSink::new().unwrap());
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(scheduler(&directory, &sink).run(shutdown.clone()));
        sleep(SEC * 4).await;
        shutdown.cancel();
        task.await.unwrap();

        let calls = directory.calls.lock().unwrap();
        assert_eq!(calls.closed, 1);
        assert_eq!(calls.open_sessions(), 0);
        assert_eq!(sink.snapshot().search_ms, 0.0);
    }
}
