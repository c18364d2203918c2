// Dispatcher metrics
//
// Lock-free counters updated from both sides of the dispatcher. They are
// logged when the dispatcher shuts down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters for one dispatcher.
///
/// Uses atomic operations so the worker thread and the foreground thread
/// can both record events without taking the queue locks.
#[derive(Debug)]
pub struct DispatcherMetrics {
    /// Commands accepted by `enqueue`
    pub commands_enqueued: AtomicU64,

    /// Commands whose `execute` returned
    pub commands_executed: AtomicU64,

    /// Executed commands that reported failure
    pub commands_failed: AtomicU64,

    /// Commands discarded unexecuted at shutdown
    pub commands_abandoned: AtomicU64,

    /// Responses pushed to the outbound queue
    pub responses_posted: AtomicU64,

    /// Responses handed to the foreground thread
    pub responses_drained: AtomicU64,

    /// Cumulative time spent inside `execute`, in microseconds
    pub engine_time_us: AtomicU64,

    start_time: Instant,
}

impl DispatcherMetrics {
    pub fn new() -> Self {
        Self {
            commands_enqueued: AtomicU64::new(0),
            commands_executed: AtomicU64::new(0),
            commands_failed: AtomicU64::new(0),
            commands_abandoned: AtomicU64::new(0),
            responses_posted: AtomicU64::new(0),
            responses_drained: AtomicU64::new(0),
            engine_time_us: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_enqueued(&self) {
        self.commands_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one finished `execute` call.
    pub fn record_executed(&self, success: bool, elapsed: Duration) {
        self.commands_executed.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.commands_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.engine_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_abandoned(&self, count: usize) {
        self.commands_abandoned
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_posted(&self) {
        self.responses_posted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drained(&self, count: usize) {
        self.responses_drained
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn executed(&self) -> u64 {
        self.commands_executed.load(Ordering::Relaxed)
    }

    pub fn abandoned(&self) -> u64 {
        self.commands_abandoned.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average time per executed command in milliseconds
    pub fn avg_engine_time_ms(&self) -> f64 {
        let total = self.engine_time_us.load(Ordering::Relaxed);
        let count = self.commands_executed.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64 / 1000.0
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!(
            "Dispatcher metrics: uptime {:.2}s, commands {} enqueued / {} executed / {} failed / {} abandoned",
            self.uptime().as_secs_f64(),
            self.commands_enqueued.load(Ordering::Relaxed),
            self.commands_executed.load(Ordering::Relaxed),
            self.commands_failed.load(Ordering::Relaxed),
            self.commands_abandoned.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Dispatcher metrics: responses {} posted / {} drained, avg engine time {:.2}ms",
            self.responses_posted.load(Ordering::Relaxed),
            self.responses_drained.load(Ordering::Relaxed),
            self.avg_engine_time_ms()
        );
    }
}

impl Default for DispatcherMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_metrics_creation() {
        let metrics = DispatcherMetrics::new();
        assert_eq!(metrics.executed(), 0);
        assert_eq!(metrics.abandoned(), 0);
    }

    #[test]
    fn test_record_executed() {
        let metrics = DispatcherMetrics::new();

        metrics.record_executed(true, Duration::from_millis(2));
        metrics.record_executed(false, Duration::from_millis(4));

        assert_eq!(metrics.executed(), 2);
        assert_eq!(metrics.commands_failed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.avg_engine_time_ms(), 3.0);
    }

    #[test]
    fn test_avg_engine_time_nothing_executed() {
        let metrics = DispatcherMetrics::new();
        assert_eq!(metrics.avg_engine_time_ms(), 0.0);
    }

    #[test]
    fn test_queue_counters() {
        let metrics = DispatcherMetrics::new();

        metrics.record_enqueued();
        metrics.record_enqueued();
        metrics.record_posted();
        metrics.record_drained(1);
        metrics.record_abandoned(3);

        assert_eq!(metrics.commands_enqueued.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.responses_posted.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.responses_drained.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.abandoned(), 3);
    }

    #[test]
    fn test_uptime() {
        let metrics = DispatcherMetrics::new();
        thread::sleep(Duration::from_millis(10));
        assert!(metrics.uptime().as_millis() >= 10);
    }
}
