// ── Domain model ──
//
// Configured lights, per-poll views, the JSON payloads exchanged on the
// bus, and the topic layout they travel on.

pub mod discovery;
pub mod light;
pub mod payload;

// ── Re-exports ──────────────────────────────────────────────────────

pub use discovery::{
    AVAILABILITY_OFFLINE, AVAILABILITY_ONLINE, DEFAULT_DISCOVERY_PREFIX, DEFAULT_TOPIC_PREFIX,
    DiscoveryConfig, Topics,
};
pub use light::{LightConfig, LightView};
pub use payload::{LightCommand, LightState, LightStatus};
