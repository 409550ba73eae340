//! Health arbiter: derives liveness/readiness verdicts from monitoring state,
//! independent of however an HTTP surface serves them.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::monitoring::MonitoringState;

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: Verdict,
    pub reason: Option<String>,
}

/// Tracks the process-local heartbeat the liveness probe watches.
pub struct HealthArbiter {
    liveness_timeout_minutes: u64,
    consumption_timeout_minutes: u64,
    minimum_consumption_rate: f64,
    heartbeat_ts: AtomicI64,
    supervisor_crashed: AtomicBool,
}

impl HealthArbiter {
    pub fn new(
        liveness_timeout_minutes: u64,
        consumption_timeout_minutes: u64,
        minimum_consumption_rate: f64,
    ) -> Self {
        Self {
            liveness_timeout_minutes,
            consumption_timeout_minutes,
            minimum_consumption_rate,
            heartbeat_ts: AtomicI64::new(now_ms()),
            supervisor_crashed: AtomicBool::new(false),
        }
    }

    pub fn beat(&self) {
        self.heartbeat_ts.store(now_ms(), Ordering::Relaxed);
    }

    pub fn mark_supervisor_crashed(&self) {
        self.supervisor_crashed.store(true, Ordering::Relaxed);
    }

    pub fn liveness(&self) -> HealthReport {
        if self.supervisor_crashed.load(Ordering::Relaxed) {
            return HealthReport {
                status: Verdict::Down,
                reason: Some("supervisor crashed".to_string()),
            };
        }

        let elapsed_minutes =
            (now_ms() - self.heartbeat_ts.load(Ordering::Relaxed)) as f64 / 60_000.0;
        if elapsed_minutes > self.liveness_timeout_minutes as f64 {
            return HealthReport {
                status: Verdict::Down,
                reason: Some("heartbeat stalled".to_string()),
            };
        }

        HealthReport {
            status: Verdict::Up,
            reason: None,
        }
    }

    pub fn readiness(&self, monitoring: &MonitoringState) -> HealthReport {
        if !monitoring.consumer_connected() {
            return HealthReport {
                status: Verdict::Down,
                reason: Some("consumer not connected".to_string()),
            };
        }
        if !monitoring.consumer_group_active() {
            return HealthReport {
                status: Verdict::Down,
                reason: Some("consumer group not active".to_string()),
            };
        }
        if !monitoring.topics_accessible() {
            return HealthReport {
                status: Verdict::Down,
                reason: Some("topics not accessible".to_string()),
            };
        }
        if !monitoring
            .is_consumption_healthy(self.consumption_timeout_minutes, self.minimum_consumption_rate)
        {
            return HealthReport {
                status: Verdict::Down,
                reason: Some("consumption rate below threshold".to_string()),
            };
        }

        HealthReport {
            status: Verdict::Up,
            reason: None,
        }
    }
}
