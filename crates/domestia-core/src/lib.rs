//! Domain layer between `domestia-api` and the MQTT binary.
//!
//! - **[`Bridge`]** -- Runtime facade: owns the controller link and the
//!   [`ReconciliationEngine`], spawns the poll task, and applies inbound
//!   [`LightCommand`]s. State publishes come out of
//!   [`take_updates()`](Bridge::take_updates).
//!
//! - **[`ReconciliationEngine`]** -- One tick per poll or refresh request.
//!   Policy lives in the pure [`decide`] function; the engine keeps the
//!   last-published brightness per relay.
//!
//! - **[`brightness`]** -- Conversions between the controller's 0..=63
//!   levels and the bus's 0..=255 brightness.
//!
//! - **Domain model** ([`model`]) -- Configured lights, the JSON payloads
//!   exchanged with Home Assistant, and the MQTT topic layout.

pub mod brightness;
pub mod bridge;
pub mod config;
pub mod error;
pub mod model;
pub mod reconcile;

#[cfg(test)]
mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bridge::Bridge;
pub use config::{BridgeConfig, DEFAULT_POLL_INTERVAL};
pub use error::CoreError;
pub use reconcile::{
    ControllerWrite, Decision, LightUpdate, ReconciliationEngine, RelayController, decide,
};

pub use model::{
    DiscoveryConfig, LightCommand, LightConfig, LightState, LightStatus, LightView, Topics,
};
