//! Replication engine tuning knobs.

use serde::{Deserialize, Serialize};

fn default_frame_rate() -> u32 {
    10
}

fn default_prediction_ms() -> i64 {
    500
}

fn default_publish_buffer_ms() -> i64 {
    100
}

fn default_cleanup_interval_ms() -> i64 {
    1000
}

fn default_interest_ttl_ms() -> i64 {
    2000
}

fn default_test_delay_ms() -> i64 {
    10
}

fn default_proactive_replication() -> bool {
    true
}

/// Per-node replication settings.
///
/// Deserializes from the `[replication]` section of the node's TOML file;
/// every field is optional there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Game frames per second driven by the node's frame loop.
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    /// How far ahead interest regions are predicted. Also the TTL of
    /// everything published to the locator; the publish loop runs at half
    /// this period.
    #[serde(default = "default_prediction_ms")]
    pub prediction_ms: i64,
    /// Expected delay before a publication becomes visible at the locator.
    #[serde(default = "default_publish_buffer_ms")]
    pub publish_buffer_ms: i64,
    /// Period of the replica cleanup and interest renewal loop.
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: i64,
    /// Lifetime of an interest record registered with this node.
    #[serde(default = "default_interest_ttl_ms")]
    pub interest_ttl_ms: i64,
    /// Artificial latency added to every inbound replication call.
    #[serde(default = "default_test_delay_ms")]
    pub test_delay_ms: i64,
    /// Push newly created objects to interested peers with the update that
    /// created them.
    #[serde(default = "default_proactive_replication")]
    pub proactive_replication: bool,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            frame_rate: default_frame_rate(),
            prediction_ms: default_prediction_ms(),
            publish_buffer_ms: default_publish_buffer_ms(),
            cleanup_interval_ms: default_cleanup_interval_ms(),
            interest_ttl_ms: default_interest_ttl_ms(),
            test_delay_ms: default_test_delay_ms(),
            proactive_replication: default_proactive_replication(),
        }
    }
}

impl ReplicationConfig {
    /// Settings with no artificial latency, for in-process clusters.
    pub fn without_delay() -> Self {
        Self {
            test_delay_ms: 0,
            ..Self::default()
        }
    }

    /// Period of the publish loop.
    pub fn publish_interval_ms(&self) -> u64 {
        (self.prediction_ms / 2).max(1) as u64
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.frame_rate == 0 {
            return Err("frame_rate must be greater than 0".to_string());
        }
        if self.prediction_ms <= 0 {
            return Err("prediction_ms must be greater than 0".to_string());
        }
        if self.publish_buffer_ms < 0 {
            return Err("publish_buffer_ms cannot be negative".to_string());
        }
        if self.cleanup_interval_ms <= 0 {
            return Err("cleanup_interval_ms must be greater than 0".to_string());
        }
        if self.interest_ttl_ms <= 0 {
            return Err("interest_ttl_ms must be greater than 0".to_string());
        }
        if self.test_delay_ms < 0 {
            return Err("test_delay_ms cannot be negative".to_string());
        }
        Ok(())
    }
}
