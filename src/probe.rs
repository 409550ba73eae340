//! Plain, independently-callable functions backing the operational HTTP
//! surface's contract. No listener is stood up here; an external HTTP layer
//! would call these directly.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::delivery::DeliveryEngine;
use crate::transform;

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Response shape for the functional probe: encode one record and attempt
/// delivery, reporting the compression achieved.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessScanResult {
    pub status: String,
    pub message: String,
    pub original_message_size: usize,
    pub compressed_message_size: usize,
    pub compression_ratio: f64,
    pub timestamp: i64,
}

/// Runs the transformation pipeline (4.B) and, on survival, the delivery
/// engine (4.C) against a single raw record — the same path a scan-record
/// batch takes through the consumer loop, never a shortcut straight to the
/// codec.
pub async fn process_wifi_scan(
    delivery_engine: &Arc<DeliveryEngine>,
    max_record_size_bytes: usize,
    raw: &[u8],
) -> ProcessScanResult {
    let mut survivors = transform::transform(&[raw.to_vec()], max_record_size_bytes);
    let Some(record) = survivors.pop() else {
        return ProcessScanResult {
            status: "rejected".to_string(),
            message: "record dropped by transformation pipeline".to_string(),
            original_message_size: raw.len(),
            compressed_message_size: 0,
            compression_ratio: 0.0,
            timestamp: now_ms(),
        };
    };

    let compressed_message_size = record.encoded_size;
    let compression_ratio = if record.original_size == 0 {
        0.0
    } else {
        compressed_message_size as f64 / record.original_size as f64
    };

    let ok = delivery_engine.deliver_batch(&[record.data]).await;

    ProcessScanResult {
        status: if ok { "success".to_string() } else { "error".to_string() },
        message: if ok {
            "record delivered".to_string()
        } else {
            "delivery failed after retries".to_string()
        },
        original_message_size: raw.len(),
        compressed_message_size,
        compression_ratio,
        timestamp: now_ms(),
    }
}

/// Response shape for the reset endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ResetResult {
    pub status: String,
    pub message: String,
    pub timestamp: i64,
}

pub fn reset_monitoring(monitoring: &crate::monitoring::MonitoringState) -> ResetResult {
    monitoring.reset();
    ResetResult {
        status: "success".to_string(),
        message: "monitoring counters reset".to_string(),
        timestamp: now_ms(),
    }
}
