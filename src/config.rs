//! Node Configuration
//!
//! All tunables of a node, grouped per component. Every field has a default so a
//! node starts without a config file; a JSON file passed with `--config` overrides
//! any subset of fields.

use crate::routing::types::{Server, Shard};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub bind: SocketAddr,
    pub executor: ExecutorConfig,
    pub client: ClientConfig,
    pub status: StatusConfig,
    pub backpressure: BackPressureConfig,
    pub execution: ExecutionConfig,
    pub layout: Vec<ServerLayout>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 40020)),
            executor: ExecutorConfig::default(),
            client: ClientConfig::default(),
            status: StatusConfig::default(),
            backpressure: BackPressureConfig::default(),
            execution: ExecutionConfig::default(),
            layout: Vec::new(),
        }
    }
}

impl NodeConfig {
    /// Reads the config file when one is given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        };

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config file {}", path.display()))?;

        tracing::info!(
            "Loaded config from {} ({} servers in layout)",
            path.display(),
            config.layout.len()
        );
        Ok(config)
    }

    /// Rejects settings that would stall periodic tasks or defeat reconnects.
    pub fn validate(&self) -> Result<()> {
        let periods = [
            ("status.cleanup_interval_ms", self.status.cleanup_interval_ms),
            ("backpressure.check_interval_ms", self.backpressure.check_interval_ms),
            ("execution.retention_ms", self.execution.retention_ms),
        ];
        for (field, value) in periods {
            if value == 0 {
                bail!("{} must be greater than zero", field);
            }
        }

        // A peer answers "still running" after `wait_ms`; the request must outlive that.
        if self.client.request_timeout_ms <= self.execution.wait_ms {
            bail!(
                "client.request_timeout_ms ({}) must exceed execution.wait_ms ({})",
                self.client.request_timeout_ms,
                self.execution.wait_ms
            );
        }

        if self.executor.worker_count == 0 {
            bail!("executor.worker_count must be greater than zero");
        }

        Ok(())
    }
}

/// Shards served by one server, as listed in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerLayout {
    pub server: Server,
    pub shards: Vec<Shard>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Upper bound on concurrently running outbound calls.
    pub worker_count: usize,
    /// Ceiling on reconnect attempts for one call. `None` keeps reconnecting.
    pub reconnect_budget_ms: Option<u64>,
    pub max_argument_bytes: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_count: 32,
            reconnect_budget_ms: Some(60_000),
            max_argument_bytes: 1024 * 1024,
        }
    }
}

impl ExecutorConfig {
    pub fn reconnect_budget(&self) -> Option<Duration> {
        self.reconnect_budget_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub request_timeout_ms: u64,
    pub ping_attempts: usize,
    pub ping_timeout_ms: u64,
    pub max_idle_per_server: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            ping_attempts: 3,
            ping_timeout_ms: 500,
            max_idle_per_server: 8,
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// How often finished query statuses are swept.
    pub cleanup_interval_ms: u64,
    /// How long a finished status stays visible before it may be swept.
    pub cleanup_delay_ms: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_ms: 10_000,
            cleanup_delay_ms: 10_000,
        }
    }
}

impl StatusConfig {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }

    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_millis(self.cleanup_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackPressureConfig {
    pub enabled: bool,
    pub check_interval_ms: u64,
    /// Resident memory ceiling. `None` disables the watcher.
    pub memory_limit_bytes: Option<u64>,
    /// Fraction of the ceiling at which running queries are stopped.
    pub threshold: f64,
}

impl Default for BackPressureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_ms: 1_000,
            memory_limit_bytes: None,
            threshold: 0.9,
        }
    }
}

impl BackPressureConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }
}

/// Remote-side execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// How long a request waits for its execution before answering "still running".
    pub wait_ms: u64,
    /// How long an unclaimed execution result is kept for a reconnect.
    pub retention_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            wait_ms: 5_000,
            retention_ms: 60_000,
        }
    }
}

impl ExecutionConfig {
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_millis(self.retention_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let config = NodeConfig::load(None).unwrap();

        assert_eq!(config.executor.worker_count, 32);
        assert_eq!(config.executor.reconnect_budget(), Some(Duration::from_secs(60)));
        assert_eq!(config.status.cleanup_delay(), Duration::from_secs(10));
        assert_eq!(config.execution.wait(), Duration::from_secs(5));
        assert!(config.layout.is_empty());
    }

    #[test]
    fn test_partial_file_overrides_only_given_fields() {
        let path = std::env::temp_dir().join(format!("node-config-{}.json", uuid::Uuid::new_v4()));
        let raw = r#"{
            "bind": "127.0.0.1:41000",
            "executor": { "reconnect_budget_ms": null },
            "layout": [
                { "server": "127.0.0.1:41000", "shards": [ { "table": "docs", "shard": "0" } ] }
            ]
        }"#;
        std::fs::write(&path, raw).unwrap();

        let config = NodeConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.bind, "127.0.0.1:41000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.executor.reconnect_budget(), None);
        assert_eq!(config.executor.worker_count, 32);
        assert_eq!(config.layout.len(), 1);
        assert_eq!(config.layout[0].shards[0], Shard::new("docs", "0"));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("node-config-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, "{ not json").unwrap();

        let result = NodeConfig::load(Some(&path));
        std::fs::remove_file(&path).unwrap();

        assert!(result.is_err());
    }

    fn load_raw(raw: &str) -> Result<NodeConfig> {
        let path = std::env::temp_dir().join(format!("node-config-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, raw).unwrap();
        let result = NodeConfig::load(Some(&path));
        std::fs::remove_file(&path).unwrap();
        result
    }

    #[test]
    fn test_zero_periods_are_rejected() {
        for raw in [
            r#"{ "status": { "cleanup_interval_ms": 0 } }"#,
            r#"{ "backpressure": { "check_interval_ms": 0 } }"#,
            r#"{ "execution": { "retention_ms": 0 } }"#,
        ] {
            let err = load_raw(raw).unwrap_err();
            assert!(format!("{:#}", err).contains("greater than zero"), "{}: {:#}", raw, err);
        }
    }

    #[test]
    fn test_request_timeout_must_exceed_execution_wait() {
        let err = load_raw(r#"{ "client": { "request_timeout_ms": 2000 }, "execution": { "wait_ms": 5000 } }"#)
            .unwrap_err();
        assert!(format!("{:#}", err).contains("must exceed execution.wait_ms"));

        let config =
            load_raw(r#"{ "client": { "request_timeout_ms": 6000 }, "execution": { "wait_ms": 5000 } }"#).unwrap();
        assert_eq!(config.client.request_timeout(), Duration::from_secs(6));
    }
}
