// ── Reconciliation engine ──
//
// One tick fetches every relay level, applies per-light policy, and decides
// which lights need a state publish. The policy itself is the pure `decide`
// function; the engine owns the last-published bookkeeping and is its only
// writer.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use domestia_api::{Connector, ControllerClient, MAX_LEVEL, RelayState};
use tracing::{debug, trace, warn};

use crate::error::CoreError;
use crate::model::{LightConfig, LightState, LightView};

// ── RelayController ──────────────────────────────────────────────

/// The controller operations the engine and the command path need.
pub trait RelayController: Send + Sync {
    fn relay_states(
        &self,
    ) -> impl Future<Output = Result<Vec<RelayState>, domestia_api::Error>> + Send;

    fn turn_on(&self, relay: u8) -> impl Future<Output = Result<(), domestia_api::Error>> + Send;

    fn turn_off(&self, relay: u8) -> impl Future<Output = Result<(), domestia_api::Error>> + Send;

    /// `level` in the controller's 0..=63 domain.
    fn set_brightness(
        &self,
        relay: u8,
        level: u8,
    ) -> impl Future<Output = Result<(), domestia_api::Error>> + Send;
}

impl<C: Connector> RelayController for ControllerClient<C> {
    fn relay_states(
        &self,
    ) -> impl Future<Output = Result<Vec<RelayState>, domestia_api::Error>> + Send {
        self.get_state()
    }

    fn turn_on(&self, relay: u8) -> impl Future<Output = Result<(), domestia_api::Error>> + Send {
        ControllerClient::turn_on(self, relay)
    }

    fn turn_off(&self, relay: u8) -> impl Future<Output = Result<(), domestia_api::Error>> + Send {
        ControllerClient::turn_off(self, relay)
    }

    fn set_brightness(
        &self,
        relay: u8,
        level: u8,
    ) -> impl Future<Output = Result<(), domestia_api::Error>> + Send {
        ControllerClient::set_brightness(self, relay, level)
    }
}

// ── Decision ─────────────────────────────────────────────────────

/// A corrective write issued against the light's own relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerWrite {
    TurnOn,
    SetMaxBrightness,
}

/// Outcome of applying policy to one observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The observed level is wrong for this light. Issue the writes and
    /// publish nothing; the next tick observes the corrected level.
    Correct(Vec<ControllerWrite>),
    /// The observed level stands and becomes the last published value.
    Accept { publish: Option<LightState> },
}

/// Apply per-light policy to an observation, given the last value published
/// for that relay (`None` if never published).
///
/// Always-on beats non-dimmable drift, which beats a normal publish.
pub fn decide(view: &LightView, last: Option<u8>) -> Decision {
    let light = &view.config;

    if light.always_on && !view.is_max_brightness() {
        return Decision::Correct(vec![
            ControllerWrite::TurnOn,
            ControllerWrite::SetMaxBrightness,
        ]);
    }

    if !light.dimmable && !view.is_min_brightness() && !view.is_max_brightness() {
        return Decision::Correct(vec![ControllerWrite::SetMaxBrightness]);
    }

    let publish = (last != Some(view.brightness)).then(|| view.state());
    Decision::Accept { publish }
}

// ── ReconciliationEngine ─────────────────────────────────────────

/// A state publish produced by a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightUpdate {
    pub light: Arc<LightConfig>,
    pub state: LightState,
}

pub struct ReconciliationEngine {
    lights: HashMap<u8, Arc<LightConfig>>,
    /// Relay id to last published bus brightness. Keys are never removed.
    last_published: HashMap<u8, u8>,
}

impl ReconciliationEngine {
    pub fn new(lights: impl IntoIterator<Item = Arc<LightConfig>>) -> Self {
        Self {
            lights: lights
                .into_iter()
                .map(|light| (light.relay, light))
                .collect(),
            last_published: HashMap::new(),
        }
    }

    /// Last bus brightness published for `relay`, if any.
    pub fn last_published(&self, relay: u8) -> Option<u8> {
        self.last_published.get(&relay).copied()
    }

    /// Run one reconciliation pass.
    ///
    /// A failed fetch returns the error and leaves the bookkeeping as it
    /// was. Failed corrective writes are logged; the next tick re-observes
    /// the relay and corrects again.
    pub async fn tick<L: RelayController>(
        &mut self,
        link: &L,
    ) -> Result<Vec<LightUpdate>, CoreError> {
        let states = link.relay_states().await?;

        let mut staged = Vec::new();
        let mut updates = Vec::new();

        for RelayState { relay, level } in states {
            let Some(light) = self.lights.get(&relay) else {
                trace!(relay, level, "ignoring unconfigured relay");
                continue;
            };
            let view = LightView::from_raw(Arc::clone(light), level);

            match decide(&view, self.last_published(relay)) {
                Decision::Correct(writes) => {
                    debug!(
                        relay,
                        light = %light.name,
                        brightness = view.brightness,
                        "correcting light level"
                    );
                    for write in writes {
                        if let Err(e) = apply(link, relay, write).await {
                            warn!(relay, ?write, error = %e, "corrective write failed");
                            break;
                        }
                    }
                }
                Decision::Accept { publish } => {
                    staged.push((relay, view.brightness));
                    if let Some(state) = publish {
                        updates.push(LightUpdate {
                            light: Arc::clone(light),
                            state,
                        });
                    }
                }
            }
        }

        self.last_published.extend(staged);
        Ok(updates)
    }
}

async fn apply<L: RelayController>(
    link: &L,
    relay: u8,
    write: ControllerWrite,
) -> Result<(), domestia_api::Error> {
    match write {
        ControllerWrite::TurnOn => link.turn_on(relay).await,
        ControllerWrite::SetMaxBrightness => link.set_brightness(relay, MAX_LEVEL).await,
    }
}
