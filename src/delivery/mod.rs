pub mod engine;
pub mod firehose;
pub mod retry;
pub mod sender;

pub use engine::{DeliveryEngine, DeliveryEngineConfig};
pub use firehose::{FirehoseConfig, FirehoseSender};
pub use sender::{Sender, SubmitOutcome};
