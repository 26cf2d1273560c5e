// ── Topic layout and Home Assistant discovery ──

use serde::{Deserialize, Serialize};

use super::light::LightConfig;

pub const DEFAULT_TOPIC_PREFIX: &str = "domestia";
pub const DEFAULT_DISCOVERY_PREFIX: &str = "homeassistant";

/// Payloads published on the availability topic.
pub const AVAILABILITY_ONLINE: &str = "online";
pub const AVAILABILITY_OFFLINE: &str = "offline";

/// MQTT topic layout for the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    /// Root of the bridge's own topics.
    pub prefix: String,
    /// Root Home Assistant watches for discovery configs.
    pub discovery_prefix: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_PREFIX, DEFAULT_DISCOVERY_PREFIX)
    }
}

impl Topics {
    pub fn new(prefix: impl Into<String>, discovery_prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            discovery_prefix: discovery_prefix.into(),
        }
    }

    pub fn command_topic(&self, light: &LightConfig) -> String {
        format!("{}/light/{}/set", self.prefix, light.entity_id())
    }

    pub fn state_topic(&self, light: &LightConfig) -> String {
        format!("{}/light/{}/state", self.prefix, light.entity_id())
    }

    pub fn config_topic(&self, light: &LightConfig) -> String {
        format!("{}/light/{}/config", self.discovery_prefix, light.entity_id())
    }

    /// Bridge-wide availability, backed by the MQTT last will.
    pub fn availability_topic(&self) -> String {
        format!("{}/status", self.prefix)
    }
}

/// Home Assistant MQTT discovery payload for one light (JSON schema).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    pub name: String,
    pub unique_id: String,
    pub command_topic: String,
    pub state_topic: String,
    pub availability_topic: String,
    pub schema: String,
    pub brightness: bool,
}

impl DiscoveryConfig {
    pub fn new(light: &LightConfig, topics: &Topics) -> Self {
        Self {
            name: light.name.clone(),
            unique_id: light.unique_id(),
            command_topic: topics.command_topic(light),
            state_topic: topics.state_topic(light),
            availability_topic: topics.availability_topic(),
            schema: "json".into(),
            brightness: light.dimmable,
        }
    }
}
