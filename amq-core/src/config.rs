//! Messaging layer configuration

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default signing secret when none is configured.
pub const DEFAULT_SECRET: &str = "sys_amq";

/// Configuration for one provider instance.
///
/// `parameter` holds driver-specific settings; the keys each driver reads
/// are documented on the driver crate (`amq-nats` reads `brokerURL`,
/// `username` and `password`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmqConfig {
    /// Driver name, e.g. `"nats"`
    pub provider: String,
    /// Driver-specific connection parameters
    #[serde(default)]
    pub parameter: HashMap<String, String>,
    /// Number of partitioned queues per node, 1 disables partitioning
    #[serde(default = "default_partitions")]
    pub partitions: u32,
    /// HMAC signing secret shared by all participating systems
    #[serde(default = "default_secret")]
    pub secret: String,
}

fn default_partitions() -> u32 {
    1
}

fn default_secret() -> String {
    DEFAULT_SECRET.to_string()
}

impl Default for AmqConfig {
    fn default() -> Self {
        Self {
            provider: String::new(),
            parameter: HashMap::new(),
            partitions: default_partitions(),
            secret: default_secret(),
        }
    }
}

impl AmqConfig {
    /// Parse from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(format!("failed to parse config: {}", e)))
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = AmqConfig::default();

        if let Ok(provider) = std::env::var("AMQ_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(url) = std::env::var("AMQ_BROKER_URL") {
            config.parameter.insert("brokerURL".to_string(), url);
        }

        if let Ok(username) = std::env::var("AMQ_USERNAME") {
            config.parameter.insert("username".to_string(), username);
        }

        if let Ok(password) = std::env::var("AMQ_PASSWORD") {
            config.parameter.insert("password".to_string(), password);
        }

        if let Ok(secret) = std::env::var("AMQ_SECRET") {
            config.secret = secret;
        }

        Ok(config)
    }

    /// Look up a driver parameter, empty string when absent.
    pub fn param(&self, key: &str) -> &str {
        self.parameter.get(key).map(String::as_str).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AmqConfig::default();
        assert_eq!(config.partitions, 1);
        assert_eq!(config.secret, DEFAULT_SECRET);
        assert_eq!(config.param("brokerURL"), "");
    }

    #[test]
    fn test_from_json() {
        let config = AmqConfig::from_json(
            r#"{
                "provider": "nats",
                "parameter": {
                    "brokerURL": "nats://localhost:4222",
                    "username": "amq",
                    "password": "amq"
                },
                "secret": "shared"
            }"#,
        )
        .unwrap();

        assert_eq!(config.provider, "nats");
        assert_eq!(config.param("brokerURL"), "nats://localhost:4222");
        assert_eq!(config.partitions, 1);
        assert_eq!(config.secret, "shared");
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            AmqConfig::from_json("not json"),
            Err(Error::Config(_))
        ));
    }
}
