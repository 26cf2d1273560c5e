// ── Light domain types ──

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::payload::LightState;
use crate::brightness::{self, MAX_BRIGHTNESS};

/// A configured light. Immutable after load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightConfig {
    /// Relay id, 1-based.
    pub relay: u8,
    pub name: String,
    #[serde(default)]
    pub dimmable: bool,
    /// Kept at full brightness by the reconciliation loop.
    #[serde(default)]
    pub always_on: bool,
    /// Not announced through Home Assistant discovery.
    #[serde(default)]
    pub hidden_from_discovery: bool,
}

impl LightConfig {
    pub fn new(relay: u8, name: impl Into<String>) -> Self {
        Self {
            relay,
            name: name.into(),
            dimmable: false,
            always_on: false,
            hidden_from_discovery: false,
        }
    }

    pub fn dimmable(mut self) -> Self {
        self.dimmable = true;
        self
    }

    pub fn always_on(mut self) -> Self {
        self.always_on = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden_from_discovery = true;
        self
    }

    /// Topic-safe identifier: lowercase name, spaces as underscores.
    pub fn entity_id(&self) -> String {
        self.name.to_lowercase().replace(' ', "_")
    }

    /// Stable Home Assistant unique id, keyed on the relay.
    pub fn unique_id(&self) -> String {
        format!("d_{}", self.relay)
    }

    /// Whether inbound commands are accepted for this light.
    pub fn accepts_commands(&self) -> bool {
        !self.always_on
    }

    /// Whether the light is announced through discovery.
    pub fn is_discoverable(&self) -> bool {
        !self.always_on && !self.hidden_from_discovery
    }
}

/// A configured light paired with its current bus brightness.
///
/// Built once per poll and thrown away after the tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightView {
    pub config: Arc<LightConfig>,
    /// Bus domain, 0..=255.
    pub brightness: u8,
}

impl LightView {
    pub fn new(config: Arc<LightConfig>, brightness: u8) -> Self {
        Self { config, brightness }
    }

    /// Build from a raw controller state byte.
    pub fn from_raw(config: Arc<LightConfig>, raw: u8) -> Self {
        Self::new(config, brightness::from_raw(raw))
    }

    pub fn is_max_brightness(&self) -> bool {
        self.brightness == MAX_BRIGHTNESS
    }

    pub fn is_min_brightness(&self) -> bool {
        self.brightness == 0
    }

    /// Outbound state for this observation.
    pub fn state(&self) -> LightState {
        LightState::from_brightness(self.brightness)
    }
}
