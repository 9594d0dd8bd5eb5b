//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_secs;

/// Top-level configuration for the ProxDeck client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Cluster endpoint to connect to
    pub server: ServerConfig,

    /// Timing for task polling and state reconciliation
    pub polling: PollingConfig,

    /// Console viewer integration
    pub console: ConsoleConfig,
}

/// Cluster endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Cluster hostname or address
    pub host: String,

    /// API port
    pub port: u16,

    /// User to authenticate as (realm included, e.g. `root@pam`)
    pub username: String,

    /// Skip TLS certificate verification.
    ///
    /// Self-managed clusters commonly run on a self-signed certificate;
    /// the operator opts in explicitly rather than the client accepting
    /// unverified hosts by default.
    pub accept_invalid_certs: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8006,
            username: "root@pam".to_string(),
            accept_invalid_certs: false,
        }
    }
}

/// Timing knobs for the two polling phases of a lifecycle operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Interval between hypervisor task status queries
    #[serde(with = "duration_secs")]
    pub task_interval: Duration,

    /// Overall deadline for a hypervisor task to reach a terminal state
    #[serde(with = "duration_secs")]
    pub task_deadline: Duration,

    /// Interval between list re-fetches while waiting for a status change
    #[serde(with = "duration_secs")]
    pub reconcile_interval: Duration,

    /// Deadline for the guest's observable status to diverge; after this
    /// the last-fetched entity is published as-is
    #[serde(with = "duration_secs")]
    pub reconcile_deadline: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            task_interval: Duration::from_secs(2),
            task_deadline: Duration::from_secs(120),
            reconcile_interval: Duration::from_secs(1),
            reconcile_deadline: Duration::from_secs(15),
        }
    }
}

/// Console viewer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Command launched with the downloaded console file as argument
    pub viewer: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            viewer: "remote-viewer".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polling_defaults() {
        let polling = PollingConfig::default();
        assert_eq!(polling.task_interval, Duration::from_secs(2));
        assert_eq!(polling.task_deadline, Duration::from_secs(120));
        assert_eq!(polling.reconcile_interval, Duration::from_secs(1));
        assert_eq!(polling.reconcile_deadline, Duration::from_secs(15));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            [server]
            host = "10.0.0.5"
            accept_invalid_certs = true
            "#,
        )
        .unwrap();

        assert_eq!(config.server.host, "10.0.0.5");
        assert_eq!(config.server.port, 8006);
        assert!(config.server.accept_invalid_certs);
        assert_eq!(config.console.viewer, "remote-viewer");
        assert_eq!(config.polling, PollingConfig::default());
    }

    #[test]
    fn test_durations_serialize_as_seconds() {
        let config = ClientConfig::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("task_deadline = 120"));
        assert!(toml.contains("reconcile_interval = 1"));
    }
}
