mod helpers;

use std::sync::Arc;
use std::time::Instant;

use helpers::{PoisonRecordSender, ScriptedSender};
use wifi_scan_ingest::delivery::sender::SubmitOutcome;
use wifi_scan_ingest::delivery::{DeliveryEngine, DeliveryEngineConfig};
use wifi_scan_ingest::transform;

fn config(max_retries: u32, backoff_ms: u64) -> DeliveryEngineConfig {
    DeliveryEngineConfig {
        max_batch_size: 500,
        max_batch_size_bytes: 4 * 1024 * 1024,
        max_retries,
        retry_backoff_ms: backoff_ms,
        retry_backoff_max_ms: 60_000,
    }
}

fn raw(s: &str) -> Vec<u8> {
    s.as_bytes().to_vec()
}

#[tokio::test]
async fn happy_path_small_batch() {
    let records = vec![raw(r#"{"a":1}"#), raw(r#"{"b":2}"#), raw(r#"{"c":3}"#)];
    let survivors = transform::transform(&records, 1_024_000);
    assert_eq!(survivors.len(), 3);

    let sender = Arc::new(ScriptedSender::accepts_everything());
    let engine = DeliveryEngine::new(sender.clone(), config(3, 1));
    let encoded: Vec<String> = survivors.iter().map(|r| r.data.clone()).collect();

    assert!(engine.deliver_batch(&encoded).await);
    assert_eq!(sender.call_count(), 1);
    assert_eq!(sender.calls()[0].len(), 3);
}

#[tokio::test]
async fn mixed_validity_batch_drops_malformed_records() {
    let records = vec![
        raw(r#"{"ok":1}"#),
        raw(r#""not json""#),
        raw("null"),
        raw(""),
        raw(r#"{"ok":2}"#),
    ];
    let survivors = transform::transform(&records, 1_024_000);
    assert_eq!(survivors.len(), 2);

    let sender = Arc::new(ScriptedSender::accepts_everything());
    let engine = DeliveryEngine::new(sender.clone(), config(3, 1));
    let encoded: Vec<String> = survivors.iter().map(|r| r.data.clone()).collect();

    assert!(engine.deliver_batch(&encoded).await);
    assert_eq!(sender.call_count(), 1);
    assert_eq!(sender.calls()[0].len(), 2);
}

#[tokio::test]
async fn full_batch_of_150_records_is_one_sub_batch() {
    let records: Vec<Vec<u8>> = (0..150)
        .map(|i| raw(&format!(r#"{{"i":{i}}}"#)))
        .collect();
    let survivors = transform::transform(&records, 1_024_000);
    assert_eq!(survivors.len(), 150);

    let sender = Arc::new(ScriptedSender::accepts_everything());
    let engine = DeliveryEngine::new(sender.clone(), config(3, 1));
    let encoded: Vec<String> = survivors.iter().map(|r| r.data.clone()).collect();

    let start = Instant::now();
    assert!(engine.deliver_batch(&encoded).await);
    let elapsed = start.elapsed();

    assert_eq!(sender.call_count(), 1);
    assert!(elapsed.as_millis() < 1_200, "expected well under the slow-batch threshold");
}

#[tokio::test]
async fn size_driven_split_across_multiple_sub_batches() {
    // ~20 KiB per encoded record, 1000 records: forces at least 10 sub-batches
    // under the 4 MiB byte cap even though the 500-record cap alone would allow two.
    let big_value = "x".repeat(20 * 1024);
    let records: Vec<Vec<u8>> = (0..1000)
        .map(|_| format!(r#"{{"payload":"{big_value}"}}"#).into_bytes())
        .collect();
    let survivors = transform::transform(&records, 1_024_000);
    assert_eq!(survivors.len(), 1000);

    let sender = Arc::new(ScriptedSender::accepts_everything());
    let engine = DeliveryEngine::new(sender.clone(), config(3, 1));
    let encoded: Vec<String> = survivors.iter().map(|r| r.data.clone()).collect();

    assert!(engine.deliver_batch(&encoded).await);

    let calls = sender.calls();
    assert!(calls.len() >= 2);
    let total: usize = calls.iter().map(|c| c.len()).sum();
    assert_eq!(total, 1000);
    for call in &calls {
        assert!(call.len() <= 500);
        let bytes: usize = call.iter().map(|r| r.len()).sum();
        assert!(bytes <= 4 * 1024 * 1024);
    }
}

#[tokio::test]
async fn throttle_recovery_after_two_whole_request_failures() {
    let sender = Arc::new(ScriptedSender::with_responses(vec![
        SubmitOutcome::WholeRequestFailure { retryable: true },
        SubmitOutcome::WholeRequestFailure { retryable: true },
        SubmitOutcome::Accepted,
    ]));
    let engine = DeliveryEngine::new(sender.clone(), config(3, 1));
    let records: Vec<String> = (0..3).map(|i| format!("record-{i}")).collect();

    assert!(engine.deliver_batch(&records).await);
    assert_eq!(sender.call_count(), 3);
}

#[tokio::test]
async fn poison_record_exhausts_retry_budget() {
    let records: Vec<Vec<u8>> = (0..10)
        .map(|i| raw(&format!(r#"{{"i":{i}}}"#)))
        .collect();
    let survivors = transform::transform(&records, 1_024_000);
    assert_eq!(survivors.len(), 10);

    let poison = survivors[5].data.clone();
    let sender = Arc::new(PoisonRecordSender::new(poison));
    let engine = DeliveryEngine::new(sender.clone(), config(3, 1));
    let encoded: Vec<String> = survivors.iter().map(|r| r.data.clone()).collect();

    assert!(!engine.deliver_batch(&encoded).await);
    // initial submission + 3 retries of the shrinking pending set
    assert_eq!(sender.call_count(), 4);
}
