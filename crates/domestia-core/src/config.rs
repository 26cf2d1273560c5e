// ── Runtime bridge configuration ──
//
// Describes *what* the bridge drives. Never touches disk: the binary loads
// the file through domestia-config and hands a `BridgeConfig` in.

use std::time::Duration;

use crate::model::LightConfig;

/// Poll interval used when none is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Controller IP or hostname, without port.
    pub controller_host: String,
    /// Time between scheduled reconciliation passes.
    pub poll_interval: Duration,
    pub lights: Vec<LightConfig>,
}

impl BridgeConfig {
    pub fn new(controller_host: impl Into<String>, lights: Vec<LightConfig>) -> Self {
        Self {
            controller_host: controller_host.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            lights,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}
