//! Graph store configuration
//!
//! Loaded from the environment the lambda functions are deployed with.

use std::env;
use std::time::Duration;

use serde_derive::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// Connection settings for the Neptune cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Writer endpoint host
    pub writer: String,

    /// Reader endpoint host, used by read-only handlers when present
    #[serde(default)]
    pub reader: Option<String>,

    /// Gremlin port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_port() -> u16 {
    8182
}

fn default_timeout_secs() -> u64 {
    30
}

impl GraphConfig {
    pub fn new(writer: impl Into<String>) -> Self {
        Self {
            writer: writer.into(),
            reader: None,
            port: default_port(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Load configuration from `NEPTUNE_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let writer = lookup("NEPTUNE_WRITER")
            .filter(|host| !host.is_empty())
            .ok_or_else(|| Error::Config("NEPTUNE_WRITER is not set".into()))?;
        let mut config = Self::new(writer);

        config.reader = lookup("NEPTUNE_READER").filter(|host| !host.is_empty());

        if let Some(port) = lookup("NEPTUNE_PORT") {
            match port.parse::<u16>() {
                Ok(port) => config.port = port,
                Err(_) => warn!("Invalid NEPTUNE_PORT value: {}", port),
            }
        }

        if let Some(timeout) = lookup("NEPTUNE_TIMEOUT_SECS") {
            match timeout.parse::<u64>() {
                Ok(timeout) => config.timeout_secs = timeout,
                Err(_) => warn!("Invalid NEPTUNE_TIMEOUT_SECS value: {}", timeout),
            }
        }

        Ok(config)
    }

    pub fn writer_url(&self) -> String {
        gremlin_url(&self.writer, self.port)
    }

    pub fn reader_url(&self) -> String {
        gremlin_url(self.reader.as_deref().unwrap_or(&self.writer), self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn gremlin_url(host: &str, port: u16) -> String {
    format!("https://{}:{}/gremlin", host, port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::hashmap;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn load(vars: HashMap<&str, &str>) -> Result<GraphConfig> {
        GraphConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn writer_is_required() {
        assert!(matches!(load(HashMap::new()), Err(Error::Config(_))));
        assert!(matches!(
            load(hashmap! { "NEPTUNE_WRITER" => "" }),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn defaults_and_reader_fallback() {
        let config = load(hashmap! { "NEPTUNE_WRITER" => "writer.cluster" }).unwrap();

        assert_eq!(config.port, 8182);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.writer_url(), "https://writer.cluster:8182/gremlin");
        assert_eq!(config.reader_url(), "https://writer.cluster:8182/gremlin");
    }

    #[test]
    fn overrides_from_environment() {
        let config = load(hashmap! {
            "NEPTUNE_WRITER" => "writer.cluster",
            "NEPTUNE_READER" => "reader.cluster",
            "NEPTUNE_PORT" => "8183",
            "NEPTUNE_TIMEOUT_SECS" => "not-a-number",
        })
        .unwrap();

        assert_eq!(config.reader_url(), "https://reader.cluster:8183/gremlin");
        assert_eq!(config.timeout_secs, 30);
    }
}
