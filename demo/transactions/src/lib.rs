//! Shared setup for the transaction demo binaries.
//!
//! Each binary plays one side of a notice, simplex or duplex exchange
//! between system `9999` (sender) and system `8888` (receiver).

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use amq_core::broker::BrokerConnection;
use amq_core::{AmqConfig, Error, Result};
use amq_nats::NatsBroker;

/// Sending system of the demo pair.
pub const SENDER_SYSTEM: &str = "9999";
/// Receiving system of the demo pair.
pub const RECEIVER_SYSTEM: &str = "8888";

/// Initialize tracing from `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

/// Open the broker connection named by the configuration.
///
/// Drivers are wired explicitly here; adding one means adding a match
/// arm, there is no runtime registry.
pub async fn connect(config: &AmqConfig) -> Result<Arc<dyn BrokerConnection>> {
    match config.provider.as_str() {
        "nats" => {
            let broker: Arc<dyn BrokerConnection> = NatsBroker::connect(
                config.param("brokerURL"),
                config.param("username"),
                config.param("password"),
            )
            .await?;
            Ok(broker)
        }
        other => Err(Error::Config(format!("unknown provider: {other}"))),
    }
}

/// Demo configuration: environment first, NATS on localhost as fallback.
pub fn demo_config() -> Result<AmqConfig> {
    let mut config = AmqConfig::from_env()?;
    if config.provider.is_empty() {
        config.provider = "nats".to_string();
    }
    if config.param("brokerURL").is_empty() {
        config
            .parameter
            .insert("brokerURL".to_string(), "nats://localhost:4222".to_string());
    }
    Ok(config)
}
