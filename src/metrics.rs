use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use serde::Serialize;

/// Process-wide request and error counters.
pub(crate) struct Metrics {
    requests: AtomicU64,
    errors: AtomicU64,
    started_at: Instant,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct MetricsSnapshot {
    pub(crate) requests_total: u64,
    pub(crate) errors_total: u64,
    pub(crate) uptime_seconds: f64,
    pub(crate) target_host: String,
}

impl Metrics {
    pub(crate) fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub(crate) fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub(crate) fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub(crate) fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub(crate) fn snapshot(&self, target_host: &str) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests(),
            errors_total: self.errors(),
            uptime_seconds: self.uptime().as_secs_f64(),
            target_host: target_host.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::Metrics;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_are_not_lost() {
        let metrics = Arc::new(Metrics::new());
        let tasks = (0..64)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                tokio::spawn(async move {
                    for _ in 0..100 {
                        metrics.record_request();
                    }
                    metrics.record_error();
                })
            })
            .collect::<Vec<_>>();

        for task in tasks {
            task.await.expect("increment task");
        }

        assert_eq!(metrics.requests(), 6400);
        assert_eq!(metrics.errors(), 64);
    }

    #[test]
    fn snapshot_reports_counters_and_target() {
        let metrics = Metrics::new();
        metrics.record_request();
        metrics.record_request();
        metrics.record_error();

        let snapshot = metrics.snapshot("localhost:9222");
        assert_eq!(snapshot.requests_total, 2);
        assert_eq!(snapshot.errors_total, 1);
        assert_eq!(snapshot.target_host, "localhost:9222");
        assert!(snapshot.uptime_seconds >= 0.0);
    }
}
