#![allow(dead_code)] // Test helpers appear unused when compiled independently

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use wifi_scan_ingest::delivery::sender::{Sender, SubmitOutcome};

/// A downstream test double that can be scripted to fail specific records,
/// fail whole requests, or accept everything. Tracks every call it receives.
pub struct ScriptedSender {
    responses: Mutex<Vec<SubmitOutcome>>,
    calls: Mutex<Vec<Vec<String>>>,
    call_count: AtomicUsize,
}

impl ScriptedSender {
    pub fn with_responses(responses: Vec<SubmitOutcome>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn accepts_everything() -> Self {
        Self::with_responses(vec![])
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sender for ScriptedSender {
    async fn submit(&self, records: &[String]) -> SubmitOutcome {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(records.to_vec());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            SubmitOutcome::Accepted
        } else {
            responses.remove(0)
        }
    }
}

/// A downstream test double that permanently rejects one poison record by
/// value, accepting everything else. Used for the retry-exhaustion scenario.
pub struct PoisonRecordSender {
    poison: String,
    call_count: AtomicUsize,
}

impl PoisonRecordSender {
    pub fn new(poison: impl Into<String>) -> Self {
        Self {
            poison: poison.into(),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sender for PoisonRecordSender {
    async fn submit(&self, records: &[String]) -> SubmitOutcome {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        match records.iter().position(|r| r == &self.poison) {
            Some(idx) => SubmitOutcome::PartialFailure {
                failed_indices: vec![idx],
            },
            None => SubmitOutcome::Accepted,
        }
    }
}
