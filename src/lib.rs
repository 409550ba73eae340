pub mod codec;
pub mod config;
pub mod control;
pub mod consumer;
pub mod delivery;
pub mod health;
pub mod monitoring;
pub mod probe;
pub mod transform;

pub use config::Config;
pub use control::ConsumerControl;
pub use health::HealthArbiter;
pub use monitoring::MonitoringState;

// Re-export tracing for use by the composition root binary.
pub use tracing;

/// Initialize the process-wide tracing subscriber. `RUST_LOG` filters,
/// defaulting to `info`; JSON formatting for production runs.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().json().with_target(false))
        .with(filter)
        .init();
}
