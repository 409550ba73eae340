//! Consumer loop: pulls bounded batches from the bus, drives the
//! transformation pipeline and delivery engine, and advances checkpoints.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use tracing::{error, warn};

use crate::config::{BusConfig, DeliveryConfig};
use crate::delivery::DeliveryEngine;
use crate::health::HealthArbiter;
use crate::monitoring::MonitoringState;
use crate::{control::ConsumerControl, transform};

pub struct ConsumerLoop {
    consumer: StreamConsumer,
    delivery_engine: Arc<DeliveryEngine>,
    monitoring: Arc<MonitoringState>,
    health: Arc<HealthArbiter>,
    control: Arc<ConsumerControl>,
    batch_size: usize,
    batch_timeout: Duration,
    max_record_size_bytes: usize,
    slow_batch_threshold: Duration,
    delivery_enabled: bool,
}

impl ConsumerLoop {
    pub fn new(
        bus: &BusConfig,
        delivery: &DeliveryConfig,
        delivery_engine: Arc<DeliveryEngine>,
        monitoring: Arc<MonitoringState>,
        health: Arc<HealthArbiter>,
        control: Arc<ConsumerControl>,
    ) -> anyhow::Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &bus.bootstrap_servers)
            .set("group.id", &bus.consumer_group)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(|e| anyhow::anyhow!("failed to construct bus consumer: {e}"))?;

        consumer
            .subscribe(&[&bus.topic])
            .map_err(|e| anyhow::anyhow!("failed to subscribe to topic {}: {e}", bus.topic))?;

        Ok(Self {
            consumer,
            delivery_engine,
            monitoring,
            health,
            control,
            batch_size: bus.batch_size,
            batch_timeout: Duration::from_millis(bus.batch_timeout_ms),
            max_record_size_bytes: delivery.max_record_size_bytes,
            slow_batch_threshold: Duration::from_millis(delivery.slow_batch_threshold_ms),
            delivery_enabled: delivery.enabled,
        })
    }

    /// Runs until `shutdown` resolves. Paused state is honored by skipping
    /// poll callbacks without tearing down the subscription.
    ///
    /// `shutdown` is only checked between iterations, never raced against an
    /// in-flight `poll_once()`: a callback that is mid-`deliver_batch` (or
    /// sleeping in a retry backoff) is allowed to finish and commit before
    /// the loop exits, per the shutdown contract.
    pub async fn run(&self, shutdown: impl std::future::Future<Output = ()> + Send + 'static) {
        let shutting_down = Arc::new(AtomicBool::new(false));
        let flag = shutting_down.clone();
        tokio::spawn(async move {
            shutdown.await;
            flag.store(true, Ordering::SeqCst);
        });

        while !shutting_down.load(Ordering::SeqCst) {
            if self.control.is_paused() {
                tokio::time::sleep(Duration::from_millis(50)).await;
                continue;
            }
            self.poll_once().await;
        }
    }

    async fn poll_once(&self) {
        let mut raw_records = Vec::new();
        let mut last_message = None;
        let mut poll_errored = false;
        let deadline = Instant::now() + self.batch_timeout;

        while raw_records.len() < self.batch_size {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, self.consumer.recv()).await {
                Ok(Ok(message)) => {
                    if let Some(payload) = message.payload() {
                        raw_records.push(payload.to_vec());
                    }
                    last_message = Some(message);
                }
                Ok(Err(e)) => {
                    error!(error = %e, "bus callback exception during poll");
                    poll_errored = true;
                    break;
                }
                Err(_) => break, // batch timeout elapsed
            }
        }

        self.health.beat();
        if poll_errored {
            self.monitoring.set_consumer_connected(false);
        } else {
            self.monitoring.set_consumer_connected(true);
            self.monitoring.set_consumer_group_active(true);
            self.monitoring.set_topics_accessible(true);
        }
        self.monitoring.record_poll(raw_records.len() as u64);

        if raw_records.is_empty() {
            return;
        }

        let start = Instant::now();
        let survivors = transform::transform(&raw_records, self.max_record_size_bytes);

        if survivors.is_empty() {
            self.commit(last_message.as_ref());
            return;
        }

        if !self.delivery_enabled {
            warn!(count = survivors.len(), "delivery disabled, dropping transformed batch");
            self.commit(last_message.as_ref());
            return;
        }

        let encoded: Vec<String> = survivors.iter().map(|r| r.data.clone()).collect();
        let ok = self.delivery_engine.deliver_batch(&encoded).await;
        let elapsed = start.elapsed();

        if ok {
            self.monitoring
                .record_processed(survivors.len() as u64, elapsed.as_millis() as u64);
            if elapsed > self.slow_batch_threshold {
                warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    threshold_ms = self.slow_batch_threshold.as_millis() as u64,
                    "batch processing exceeded slow-batch threshold"
                );
            }
        } else {
            self.monitoring.record_failed(survivors.len() as u64);
            warn!(count = survivors.len(), "batch failed delivery after retries");
        }

        self.commit(last_message.as_ref());
    }

    fn commit(&self, last_message: Option<&rdkafka::message::BorrowedMessage<'_>>) {
        if let Some(message) = last_message {
            if let Err(e) = self.consumer.commit_message(message, CommitMode::Async) {
                error!(error = %e, "failed to commit offset");
            }
        }
    }
}
