//! Downstream submission contract, abstracted from the delivery engine's
//! sub-batching and retry logic so tests can substitute a fake sender.

use async_trait::async_trait;

/// Outcome of submitting one sub-batch to the downstream.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Every record in the sub-batch was durably accepted.
    Accepted,
    /// Some records failed with a retryable per-record status. Indices are
    /// positions within the submitted sub-batch, in input order.
    PartialFailure { failed_indices: Vec<usize> },
    /// The whole request failed (throttle, network, timeout) before any
    /// per-record status could be determined.
    WholeRequestFailure { retryable: bool },
}

/// Abstracts the Firehose-shaped `PutRecordBatch` call.
#[async_trait]
pub trait Sender: Send + Sync {
    async fn submit(&self, records: &[String]) -> SubmitOutcome;
}
