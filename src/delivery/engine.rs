//! Delivery engine: partitions encoded records into downstream-conformant
//! sub-batches, submits them, and retries failures with bounded backoff.

use std::sync::Arc;

use tracing::warn;

use super::retry::RetryConfig;
use super::sender::{Sender, SubmitOutcome};

#[derive(Clone, Debug)]
pub struct DeliveryEngineConfig {
    pub max_batch_size: usize,
    pub max_batch_size_bytes: usize,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub retry_backoff_max_ms: u64,
}

impl Default for DeliveryEngineConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 500,
            max_batch_size_bytes: 4 * 1024 * 1024,
            max_retries: 3,
            retry_backoff_ms: 1_000,
            retry_backoff_max_ms: 60_000,
        }
    }
}

impl DeliveryEngineConfig {
    fn retry_config(&self) -> RetryConfig {
        RetryConfig::exponential(self.max_retries, self.retry_backoff_ms, self.retry_backoff_max_ms)
    }
}

pub struct DeliveryEngine {
    sender: Arc<dyn Sender>,
    config: DeliveryEngineConfig,
}

impl DeliveryEngine {
    pub fn new(sender: Arc<dyn Sender>, config: DeliveryEngineConfig) -> Self {
        Self { sender, config }
    }

    /// Greedy left-to-right sub-batching: a record joins the current
    /// sub-batch iff both the count and byte caps still hold afterward.
    /// A record that alone exceeds the byte cap is dropped with a warning.
    fn sub_batches(&self, records: &[String]) -> Vec<Vec<String>> {
        let mut batches = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_bytes = 0usize;

        for record in records {
            let record_len = record.len();
            if record_len > self.config.max_batch_size_bytes {
                warn!(
                    size = record_len,
                    max = self.config.max_batch_size_bytes,
                    "dropping record: exceeds max-batch-size-bytes on its own"
                );
                continue;
            }

            let would_fit_count = current.len() + 1 <= self.config.max_batch_size;
            let would_fit_bytes = current_bytes + record_len <= self.config.max_batch_size_bytes;

            if !current.is_empty() && !(would_fit_count && would_fit_bytes) {
                batches.push(std::mem::take(&mut current));
                current_bytes = 0;
            }

            current_bytes += record_len;
            current.push(record.clone());
        }

        if !current.is_empty() {
            batches.push(current);
        }

        batches
    }

    /// Returns `true` iff every input record was accepted by the downstream,
    /// possibly across retries. Sub-batches are submitted sequentially.
    pub async fn deliver_batch(&self, records: &[String]) -> bool {
        let sub_batches = self.sub_batches(records);
        let mut all_succeeded = true;

        for sub_batch in sub_batches {
            if !self.deliver_sub_batch(sub_batch).await {
                all_succeeded = false;
            }
        }

        all_succeeded
    }

    async fn deliver_sub_batch(&self, sub_batch: Vec<String>) -> bool {
        let mut pending = sub_batch;
        let max_attempts = self.config.max_retries + 1;
        let retry_config = self.config.retry_config();

        for attempt in 1..=max_attempts {
            if pending.is_empty() {
                return true;
            }

            if attempt > 1 {
                let delay = retry_config.delay_for_attempt(attempt - 2);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying sub-batch after backoff"
                );
                tokio::time::sleep(delay).await;
            }

            match self.sender.submit(&pending).await {
                SubmitOutcome::Accepted => return true,
                SubmitOutcome::PartialFailure { failed_indices } => {
                    pending = failed_indices
                        .into_iter()
                        .filter_map(|i| pending.get(i).cloned())
                        .collect();
                }
                SubmitOutcome::WholeRequestFailure { retryable } => {
                    if !retryable {
                        warn!("sub-batch failed: non-retryable whole-request error");
                        return false;
                    }
                    // pending unchanged: whole sub-batch is retried as-is.
                }
            }
        }

        if !pending.is_empty() {
            warn!(
                remaining = pending.len(),
                "sub-batch failed: retry budget exhausted"
            );
            false
        } else {
            true
        }
    }
}
