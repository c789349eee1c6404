//! Configuration management.
//!
//! This module handles loading and validation of the TOML configuration
//! shared by locator and node processes.

use colyseus_core::{NodeId, Rect};
use locator::LocatorConfig;
use replication::ReplicationConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

fn default_node_id() -> u32 {
    1
}

fn default_node_bind_address() -> String {
    "127.0.0.1:9001".to_string()
}

fn default_locator_address() -> String {
    "127.0.0.1:9000".to_string()
}

fn default_boundary() -> Rect {
    locator::DEFAULT_BOUNDARY
}

fn default_capacity() -> usize {
    locator::DEFAULT_CAPACITY
}

fn default_locator_cleanup_interval_ms() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub node: NodeSettings,
    #[serde(default)]
    pub replication: ReplicationConfig,
    #[serde(default)]
    pub locator: LocatorSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Replication endpoints of every node in the cluster. The locator sends
    /// NotifySubscriber to them; nodes send RegisterInterest and updates.
    #[serde(default)]
    pub peers: Vec<PeerSettings>,
}

/// Settings of a game node process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSettings {
    #[serde(default = "default_node_id")]
    pub id: u32,
    /// Address the replication service listens on
    #[serde(default = "default_node_bind_address")]
    pub bind_address: String,
    /// Address of the locator this node publishes to
    #[serde(default = "default_locator_address")]
    pub locator_address: String,
}

/// Settings of the locator process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatorSettings {
    #[serde(default = "default_locator_address")]
    pub bind_address: String,
    /// Area covered by the spatial index; entries outside it are rejected.
    #[serde(default = "default_boundary")]
    pub boundary: Rect,
    /// Entries a quadtree node holds before it splits
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_locator_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,
}

/// A node endpoint known to this process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerSettings {
    pub node_id: u32,
    pub address: String,
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json_format: bool,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            id: default_node_id(),
            bind_address: default_node_bind_address(),
            locator_address: default_locator_address(),
        }
    }
}

impl Default for LocatorSettings {
    fn default() -> Self {
        Self {
            bind_address: default_locator_address(),
            boundary: default_boundary(),
            capacity: default_capacity(),
            cleanup_interval_ms: default_locator_cleanup_interval_ms(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file, creating a default file when
    /// none exists at `path`.
    pub async fn load_from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    pub fn node_id(&self) -> NodeId {
        NodeId(self.node.id)
    }

    pub fn to_locator_config(&self) -> LocatorConfig {
        LocatorConfig {
            boundary: self.locator.boundary,
            capacity: self.locator.capacity,
            cleanup_interval_ms: self.locator.cleanup_interval_ms,
        }
    }

    /// Peers other than this node.
    pub fn remote_peers(&self) -> impl Iterator<Item = &PeerSettings> {
        let own = self.node.id;
        self.peers.iter().filter(move |peer| peer.node_id != own)
    }

    /// Validates the configuration.
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing the issue.
    pub fn validate(&self) -> Result<(), String> {
        for (name, address) in [
            ("node.bind_address", &self.node.bind_address),
            ("locator.bind_address", &self.locator.bind_address),
        ] {
            if address.parse::<SocketAddr>().is_err() {
                return Err(format!("Invalid {name}: {address}"));
            }
        }

        if self.node.locator_address.is_empty() {
            return Err("node.locator_address cannot be empty".to_string());
        }

        let boundary = &self.locator.boundary;
        if boundary.width <= 0.0 || boundary.height <= 0.0 {
            return Err("locator.boundary must have a positive width and height".to_string());
        }
        if self.locator.capacity == 0 {
            return Err("locator.capacity must be greater than 0".to_string());
        }
        if self.locator.cleanup_interval_ms == 0 {
            return Err("locator.cleanup_interval_ms must be greater than 0".to_string());
        }

        self.replication
            .validate()
            .map_err(|e| format!("Invalid replication settings: {e}"))?;

        let mut seen = HashSet::new();
        for peer in &self.peers {
            if peer.address.is_empty() {
                return Err(format!("Peer {} has an empty address", peer.node_id));
            }
            if !seen.insert(peer.node_id) {
                return Err(format!("Peer {} is listed more than once", peer.node_id));
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        assert_eq!(config.node.id, 1);
        assert_eq!(config.node.bind_address, "127.0.0.1:9001");
        assert_eq!(config.node.locator_address, "127.0.0.1:9000");
        assert_eq!(config.locator.bind_address, "127.0.0.1:9000");
        assert_eq!(config.locator.boundary, Rect::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(config.locator.capacity, 4);
        assert_eq!(config.replication, ReplicationConfig::default());
        assert!(config.peers.is_empty());
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("config.toml");

        let config = AppConfig::load_from_file(&path).await.expect("default config");
        assert_eq!(config.node.bind_address, "127.0.0.1:9001");
        assert!(path.exists());

        let reloaded = AppConfig::load_from_file(&path).await.expect("written config should load");
        assert_eq!(reloaded.locator.capacity, config.locator.capacity);
        assert_eq!(reloaded.replication, config.replication);
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let toml_content = r#"
[node]
id = 2
bind_address = "0.0.0.0:9102"
locator_address = "10.0.0.1:9000"

[replication]
frame_rate = 30
prediction_ms = 800

[locator]
capacity = 8

[locator.boundary]
x = -50.0
y = -50.0
width = 200.0
height = 200.0

[logging]
level = "debug"

[[peers]]
node_id = 1
address = "10.0.0.2:9101"

[[peers]]
node_id = 2
address = "10.0.0.3:9102"
"#;
        let temp_file = NamedTempFile::new().expect("temp file");
        tokio::fs::write(temp_file.path(), toml_content).await.expect("write config");

        let config = AppConfig::load_from_file(&temp_file.path().to_path_buf())
            .await
            .expect("config should parse");

        assert_eq!(config.node_id(), NodeId(2));
        assert_eq!(config.node.locator_address, "10.0.0.1:9000");
        assert_eq!(config.replication.frame_rate, 30);
        assert_eq!(config.replication.prediction_ms, 800);
        assert_eq!(config.replication.interest_ttl_ms, 2000);
        assert_eq!(config.locator.capacity, 8);
        assert_eq!(config.locator.bind_address, "127.0.0.1:9000");
        assert_eq!(config.to_locator_config().boundary, Rect::new(-50.0, -50.0, 200.0, 200.0));
        assert_eq!(config.logging.level, "debug");
        assert!(!config.logging.json_format);

        let remote: Vec<u32> = config.remote_peers().map(|peer| peer.node_id).collect();
        assert_eq!(remote, vec![1]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_bind_address() {
        let mut config = AppConfig::default();
        config.node.bind_address = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_locator_settings() {
        let mut config = AppConfig::default();
        config.locator.capacity = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.locator.boundary = Rect::new(0.0, 0.0, 0.0, 10.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_replication_settings() {
        let mut config = AppConfig::default();
        config.replication.frame_rate = 0;
        let err = config.validate().expect_err("zero frame rate should be rejected");
        assert!(err.contains("frame_rate"));
    }

    #[test]
    fn test_validation_duplicate_peer() {
        let mut config = AppConfig::default();
        let peer = PeerSettings {
            node_id: 3,
            address: "127.0.0.1:9003".to_string(),
        };
        config.peers = vec![peer.clone(), peer];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_log_levels() {
        let mut config = AppConfig::default();
        for level in ["trace", "debug", "info", "warn", "error"] {
            config.logging.level = level.to_string();
            assert!(config.validate().is_ok(), "{level} should be accepted");
        }
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }
}
