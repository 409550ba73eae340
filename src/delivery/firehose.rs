//! `Sender` implementation against a Firehose-shaped `PutRecordBatch` API.

use async_trait::async_trait;
use aws_sdk_firehose::error::ProvideErrorMetadata;
use aws_sdk_firehose::types::Record;
use aws_sdk_firehose::Client as AwsClient;
use tracing::{error, warn};

use super::sender::{Sender, SubmitOutcome};

/// Connection details for the downstream delivery stream. `endpoint_override`
/// lets integration tests point the client at a local test double.
#[derive(Clone, Debug)]
pub struct FirehoseConfig {
    pub delivery_stream_name: String,
    pub region: Option<String>,
    pub endpoint_override: Option<String>,
}

pub struct FirehoseSender {
    client: AwsClient,
    stream_name: String,
}

impl FirehoseSender {
    pub async fn new(config: FirehoseConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        let shared_config = loader.load().await;

        let mut firehose_builder =
            aws_sdk_firehose::config::Builder::from(&shared_config);
        if let Some(endpoint) = &config.endpoint_override {
            firehose_builder = firehose_builder.endpoint_url(endpoint);
        }

        Self {
            client: AwsClient::from_conf(firehose_builder.build()),
            stream_name: config.delivery_stream_name,
        }
    }
}

#[async_trait]
impl Sender for FirehoseSender {
    async fn submit(&self, records: &[String]) -> SubmitOutcome {
        let firehose_records: Result<Vec<Record>, _> = records
            .iter()
            .map(|encoded| {
                Record::builder()
                    .data(aws_sdk_firehose::primitives::Blob::new(
                        encoded.as_bytes().to_vec(),
                    ))
                    .build()
            })
            .collect();

        let firehose_records = match firehose_records {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "failed to build Firehose records");
                return SubmitOutcome::WholeRequestFailure { retryable: false };
            }
        };

        let response = match self
            .client
            .put_record_batch()
            .delivery_stream_name(&self.stream_name)
            .set_records(Some(firehose_records))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let request_id = e.meta().request_id().unwrap_or("unknown");
                error!(
                    error = %e,
                    request_id,
                    stream = self.stream_name,
                    "Firehose PutRecordBatch call failed"
                );
                return SubmitOutcome::WholeRequestFailure { retryable: true };
            }
        };

        if response.failed_put_count() == 0 {
            return SubmitOutcome::Accepted;
        }

        let mut failed_indices = Vec::new();
        for (idx, entry) in response.request_responses().iter().enumerate() {
            if let Some(code) = entry.error_code() {
                warn!(
                    error_code = code,
                    error_message = entry.error_message().unwrap_or("none"),
                    stream = self.stream_name,
                    "Firehose record failure"
                );
                failed_indices.push(idx);
            }
        }

        SubmitOutcome::PartialFailure { failed_indices }
    }
}
