//! In-process counters feeding the orchestrator's metrics pump. Unlike the
//! teacher's module-level `Lazy<MetricsCollector>` static, this collector is
//! a field owned by each `Orchestrator` instance — tests construct their own
//! orchestrator and therefore their own collector, with no global mutable
//! state to reset between runs.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

const MAX_PROCESSING_TIMES: usize = 1000;

#[derive(Debug, Default)]
pub struct MetricsCollector {
    tasks_received: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
    tasks_cancelled: AtomicU64,
    agents_created: AtomicU64,
    agents_removed: AtomicU64,
    capacity_rejections: AtomicU64,
    messages_published: AtomicU64,
    messages_dropped: AtomicU64,
    processing_times_ms: Mutex<Vec<u64>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_received(&self) {
        self.tasks_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn task_completed(&self, duration_ms: u64) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
        self.record_processing_time(duration_ms);
    }

    pub fn task_failed(&self, duration_ms: u64) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
        self.record_processing_time(duration_ms);
    }

    pub fn task_cancelled(&self) {
        self.tasks_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn agent_created(&self) {
        self.agents_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn agent_removed(&self) {
        self.agents_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn capacity_rejected(&self) {
        self.capacity_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_published(&self) {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn record_processing_time(&self, duration_ms: u64) {
        let mut times = self.processing_times_ms.lock().unwrap();
        times.push(duration_ms);
        if times.len() > MAX_PROCESSING_TIMES {
            times.remove(0);
        }
    }

    fn percentile(sorted: &[u64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }
        if sorted.len() == 1 {
            return sorted[0] as f64;
        }
        let rank = p * (sorted.len() - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = rank.ceil() as usize;
        if lower == upper {
            return sorted[lower] as f64;
        }
        let weight = rank - lower as f64;
        sorted[lower] as f64 * (1.0 - weight) + sorted[upper] as f64 * weight
    }

    pub fn snapshot(&self, live_agents: usize, active_workflows: usize) -> MetricsSnapshot {
        let mut sorted_times = self.processing_times_ms.lock().unwrap().clone();
        sorted_times.sort_unstable();

        let avg = if sorted_times.is_empty() {
            0.0
        } else {
            sorted_times.iter().sum::<u64>() as f64 / sorted_times.len() as f64
        };

        MetricsSnapshot {
            tasks_received: self.tasks_received.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_cancelled: self.tasks_cancelled.load(Ordering::Relaxed),
            agents_created: self.agents_created.load(Ordering::Relaxed),
            agents_removed: self.agents_removed.load(Ordering::Relaxed),
            capacity_rejections: self.capacity_rejections.load(Ordering::Relaxed),
            messages_published: self.messages_published.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            live_agents,
            active_workflows,
            avg_processing_time_ms: avg,
            p95_processing_time_ms: Self::percentile(&sorted_times, 0.95),
            p99_processing_time_ms: Self::percentile(&sorted_times, 0.99),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Serializable snapshot pushed to the `MetricsSink` on every pump tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsSnapshot {
    pub tasks_received: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub tasks_cancelled: u64,
    pub agents_created: u64,
    pub agents_removed: u64,
    pub capacity_rejections: u64,
    pub messages_published: u64,
    pub messages_dropped: u64,
    pub live_agents: usize,
    pub active_workflows: usize,
    pub avg_processing_time_ms: f64,
    pub p95_processing_time_ms: f64,
    pub p99_processing_time_ms: f64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_monotonic_and_independent() {
        let collector = MetricsCollector::new();
        collector.task_received();
        collector.task_received();
        collector.task_completed(10);
        collector.task_failed(20);

        let snapshot = collector.snapshot(1, 1);
        assert_eq!(snapshot.tasks_received, 2);
        assert_eq!(snapshot.tasks_completed, 1);
        assert_eq!(snapshot.tasks_failed, 1);
    }

    #[test]
    fn processing_times_cap_at_1000() {
        let collector = MetricsCollector::new();
        for i in 0..1500u64 {
            collector.task_completed(i);
        }
        let times = collector.processing_times_ms.lock().unwrap();
        assert_eq!(times.len(), MAX_PROCESSING_TIMES);
        // FIFO eviction: the earliest 500 values should be gone.
        assert_eq!(times[0], 500);
    }

    #[test]
    fn percentile_of_single_value_is_itself() {
        assert_eq!(MetricsCollector::percentile(&[42], 0.95), 42.0);
    }

    #[test]
    fn percentile_interpolates() {
        let sorted = vec![10, 20, 30, 40];
        let p50 = MetricsCollector::percentile(&sorted, 0.5);
        assert!((p50 - 25.0).abs() < 0.01);
    }

    #[test]
    fn two_independent_collectors_do_not_share_state() {
        let a = MetricsCollector::new();
        let b = MetricsCollector::new();
        a.task_received();
        assert_eq!(a.snapshot(0, 0).tasks_received, 1);
        assert_eq!(b.snapshot(0, 0).tasks_received, 0);
    }
}
