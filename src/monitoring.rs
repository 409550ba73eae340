//! Monitoring state: process-lifetime counters, derived rates, and connectivity
//! flags consumed by the health arbiter and the (external) metrics surface.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// 1-minute half-life for the exponentially weighted consumption rate.
const EWMA_HALF_LIFE_MS: f64 = 60_000.0;

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Process-lifetime counters and connectivity flags, updated by atomic ops
/// only so the metrics/health surface can read them without a critical section.
pub struct MonitoringState {
    total_consumed: AtomicU64,
    total_processed: AtomicU64,
    total_failed: AtomicU64,
    first_message_ts: AtomicI64,
    last_message_ts: AtomicI64,
    last_poll_ts: AtomicI64,
    processing_ms_sum: AtomicU64,
    processing_ms_count: AtomicU64,
    processing_ms_min: AtomicU64,
    processing_ms_max: AtomicU64,
    consumer_connected: AtomicBool,
    consumer_group_active: AtomicBool,
    topics_accessible: AtomicBool,
    consumption_rate_bits: AtomicU64,
    consumption_rate_ts: AtomicI64,
}

impl Default for MonitoringState {
    fn default() -> Self {
        Self {
            total_consumed: AtomicU64::new(0),
            total_processed: AtomicU64::new(0),
            total_failed: AtomicU64::new(0),
            first_message_ts: AtomicI64::new(0),
            last_message_ts: AtomicI64::new(0),
            last_poll_ts: AtomicI64::new(0),
            processing_ms_sum: AtomicU64::new(0),
            processing_ms_count: AtomicU64::new(0),
            processing_ms_min: AtomicU64::new(u64::MAX),
            processing_ms_max: AtomicU64::new(0),
            consumer_connected: AtomicBool::new(false),
            consumer_group_active: AtomicBool::new(false),
            topics_accessible: AtomicBool::new(false),
            consumption_rate_bits: AtomicU64::new(0.0_f64.to_bits()),
            consumption_rate_ts: AtomicI64::new(0),
        }
    }
}

/// Independently-callable snapshot, serializable for an external metrics surface.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MonitoringSnapshot {
    pub total_consumed: u64,
    pub total_processed: u64,
    pub total_failed: u64,
    pub first_message_ts: i64,
    pub last_message_ts: i64,
    pub last_poll_ts: i64,
    pub avg_processing_ms: f64,
    pub min_processing_ms: u64,
    pub max_processing_ms: u64,
    pub consumption_rate: f64,
    pub is_polling: bool,
    pub consumer_connected: bool,
    pub consumer_group_active: bool,
    pub topics_accessible: bool,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
    pub memory_max_mb: u64,
    pub success_rate: f64,
    pub error_rate: f64,
}

impl MonitoringState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_poll(&self, batch_size: u64) {
        let now = now_ms();
        self.last_poll_ts.store(now, Ordering::Relaxed);
        if batch_size > 0 {
            self.total_consumed.fetch_add(batch_size, Ordering::Relaxed);
            self.first_message_ts
                .compare_exchange(0, now, Ordering::Relaxed, Ordering::Relaxed)
                .ok();
            self.last_message_ts.store(now, Ordering::Relaxed);
            self.record_consumption_tick(batch_size, now);
        }
    }

    pub fn record_processed(&self, count: u64, latency_ms: u64) {
        self.total_processed.fetch_add(count, Ordering::Relaxed);
        self.record_latency(latency_ms);
    }

    pub fn record_failed(&self, count: u64) {
        self.total_failed.fetch_add(count, Ordering::Relaxed);
    }

    fn record_latency(&self, latency_ms: u64) {
        self.processing_ms_sum.fetch_add(latency_ms, Ordering::Relaxed);
        self.processing_ms_count.fetch_add(1, Ordering::Relaxed);
        self.processing_ms_min.fetch_min(latency_ms, Ordering::Relaxed);
        self.processing_ms_max.fetch_max(latency_ms, Ordering::Relaxed);
    }

    /// EWMA update: each poll contributes an instantaneous rate
    /// (`batch_size` over elapsed time since the previous poll), weighted by
    /// how much of the 1-minute half-life has elapsed.
    fn record_consumption_tick(&self, batch_size: u64, now: i64) {
        let prev_ts = self.consumption_rate_ts.swap(now, Ordering::Relaxed);
        if prev_ts == 0 {
            let initial = batch_size as f64 / 1.0;
            self.consumption_rate_bits.store(initial.to_bits(), Ordering::Relaxed);
            return;
        }

        let elapsed_ms = (now - prev_ts).max(1) as f64;
        let instantaneous = batch_size as f64 / (elapsed_ms / 1_000.0);
        let alpha = 1.0 - 0.5_f64.powf(elapsed_ms / EWMA_HALF_LIFE_MS);
        let prev_bits = self.consumption_rate_bits.load(Ordering::Relaxed);
        let prev_rate = f64::from_bits(prev_bits);
        let updated = prev_rate + alpha * (instantaneous - prev_rate);
        self.consumption_rate_bits.store(updated.to_bits(), Ordering::Relaxed);
    }

    pub fn set_consumer_connected(&self, connected: bool) {
        self.consumer_connected.store(connected, Ordering::Relaxed);
    }

    pub fn set_consumer_group_active(&self, active: bool) {
        self.consumer_group_active.store(active, Ordering::Relaxed);
    }

    pub fn set_topics_accessible(&self, accessible: bool) {
        self.topics_accessible.store(accessible, Ordering::Relaxed);
    }

    pub fn consumer_connected(&self) -> bool {
        self.consumer_connected.load(Ordering::Relaxed)
    }

    pub fn consumer_group_active(&self) -> bool {
        self.consumer_group_active.load(Ordering::Relaxed)
    }

    pub fn topics_accessible(&self) -> bool {
        self.topics_accessible.load(Ordering::Relaxed)
    }

    pub fn total_consumed(&self) -> u64 {
        self.total_consumed.load(Ordering::Relaxed)
    }

    pub fn last_poll_ts(&self) -> i64 {
        self.last_poll_ts.load(Ordering::Relaxed)
    }

    pub fn consumption_rate(&self) -> f64 {
        f64::from_bits(self.consumption_rate_bits.load(Ordering::Relaxed))
    }

    /// `true` if no message has ever been consumed (cold-start tolerance), or
    /// if the last poll is within `timeout_minutes` and the rate clears `min_rate`.
    pub fn is_consumption_healthy(&self, timeout_minutes: u64, min_rate: f64) -> bool {
        if self.total_consumed() == 0 {
            return true;
        }
        let elapsed_minutes = (now_ms() - self.last_poll_ts()) as f64 / 60_000.0;
        elapsed_minutes <= timeout_minutes as f64 && self.consumption_rate() >= min_rate
    }

    /// Zero every counter. Connectivity flags and timestamps are untouched:
    /// they reflect present state, not accumulated history.
    pub fn reset(&self) {
        self.total_consumed.store(0, Ordering::Relaxed);
        self.total_processed.store(0, Ordering::Relaxed);
        self.total_failed.store(0, Ordering::Relaxed);
        self.processing_ms_sum.store(0, Ordering::Relaxed);
        self.processing_ms_count.store(0, Ordering::Relaxed);
        self.processing_ms_min.store(u64::MAX, Ordering::Relaxed);
        self.processing_ms_max.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MonitoringSnapshot {
        let processed = self.total_processed.load(Ordering::Relaxed);
        let failed = self.total_failed.load(Ordering::Relaxed);
        let count = self.processing_ms_count.load(Ordering::Relaxed);
        let sum = self.processing_ms_sum.load(Ordering::Relaxed);
        let avg = if count > 0 { sum as f64 / count as f64 } else { 0.0 };
        let min = self.processing_ms_min.load(Ordering::Relaxed);
        let success_rate = processed as f64 / (processed + failed).max(1) as f64;
        let (memory_used_mb, memory_total_mb, memory_max_mb) = read_memory_mb();

        MonitoringSnapshot {
            total_consumed: self.total_consumed(),
            total_processed: processed,
            total_failed: failed,
            first_message_ts: self.first_message_ts.load(Ordering::Relaxed),
            last_message_ts: self.last_message_ts.load(Ordering::Relaxed),
            last_poll_ts: self.last_poll_ts(),
            avg_processing_ms: avg,
            min_processing_ms: if count > 0 { min } else { 0 },
            max_processing_ms: self.processing_ms_max.load(Ordering::Relaxed),
            consumption_rate: self.consumption_rate(),
            is_polling: true,
            consumer_connected: self.consumer_connected(),
            consumer_group_active: self.consumer_group_active(),
            topics_accessible: self.topics_accessible(),
            memory_used_mb,
            memory_total_mb,
            memory_max_mb,
            success_rate,
            error_rate: 1.0 - success_rate,
        }
    }
}

#[cfg(target_os = "linux")]
fn read_memory_mb() -> (u64, u64, u64) {
    let status = std::fs::read_to_string("/proc/self/status").unwrap_or_default();
    let used_kb = parse_proc_field(&status, "VmRSS:");
    let max_kb = parse_proc_field(&status, "VmHWM:");
    let meminfo = std::fs::read_to_string("/proc/meminfo").unwrap_or_default();
    let total_kb = parse_proc_field(&meminfo, "MemTotal:");
    (used_kb / 1024, total_kb / 1024, max_kb / 1024)
}

#[cfg(target_os = "linux")]
fn parse_proc_field(contents: &str, label: &str) -> u64 {
    contents
        .lines()
        .find(|line| line.starts_with(label))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}

#[cfg(not(target_os = "linux"))]
fn read_memory_mb() -> (u64, u64, u64) {
    (0, 0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_consumed_increases_by_batch_size() {
        let state = MonitoringState::new();
        state.record_poll(5);
        state.record_poll(3);
        assert_eq!(state.total_consumed(), 8);
    }

    #[test]
    fn processed_plus_failed_tracks_survivors() {
        let state = MonitoringState::new();
        state.record_processed(3, 10);
        state.record_failed(2);
        let snap = state.snapshot();
        assert_eq!(snap.total_processed, 3);
        assert_eq!(snap.total_failed, 2);
    }

    #[test]
    fn success_and_error_rate_sum_to_one() {
        let state = MonitoringState::new();
        state.record_processed(8, 1);
        state.record_failed(2);
        let snap = state.snapshot();
        assert!((snap.success_rate - 0.8).abs() < 1e-9);
        assert!((snap.error_rate - 0.2).abs() < 1e-9);
    }

    #[test]
    fn success_rate_with_no_activity_is_zero_not_nan() {
        let state = MonitoringState::new();
        let snap = state.snapshot();
        assert_eq!(snap.success_rate, 0.0);
    }

    #[test]
    fn no_messages_consumed_is_cold_start_healthy() {
        let state = MonitoringState::new();
        assert!(state.is_consumption_healthy(5, 100.0));
    }

    #[test]
    fn stale_poll_is_unhealthy() {
        let state = MonitoringState::new();
        state.record_poll(10);
        state.last_poll_ts.store(0, Ordering::Relaxed);
        assert!(!state.is_consumption_healthy(5, 0.0001));
    }

    #[test]
    fn reset_zeroes_counters_but_not_connectivity() {
        let state = MonitoringState::new();
        state.record_poll(5);
        state.record_processed(5, 10);
        state.set_consumer_connected(true);
        state.reset();
        let snap = state.snapshot();
        assert_eq!(snap.total_processed, 0);
        assert_eq!(snap.total_failed, 0);
        assert!(state.consumer_connected());
    }

    #[test]
    fn min_processing_ms_tracks_the_smallest_observed_latency() {
        let state = MonitoringState::new();
        state.record_processed(1, 50);
        state.record_processed(1, 10);
        state.record_processed(1, 30);
        assert_eq!(state.snapshot().min_processing_ms, 10);
    }
}
