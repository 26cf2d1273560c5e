// ── Bridge runtime ──
//
// Owns the controller link, the reconciliation engine and the refresh
// trigger. A background poll task runs a tick on every interval and
// whenever a refresh is requested. Inbound commands are queued and run one
// at a time by a command processor task, each requesting a refresh
// afterwards.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use domestia_api::{ControllerClient, MAX_LEVEL};
use tokio::sync::{Mutex, Notify, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::brightness;
use crate::config::BridgeConfig;
use crate::error::CoreError;
use crate::model::{LightCommand, LightConfig, LightStatus, LightView};
use crate::reconcile::{LightUpdate, ReconciliationEngine, RelayController};

const UPDATE_CHANNEL_SIZE: usize = 256;
const COMMAND_CHANNEL_SIZE: usize = 64;
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

// ── Bridge ───────────────────────────────────────────────────────

/// Cheaply cloneable handle to the running bridge.
pub struct Bridge<L = ControllerClient> {
    inner: Arc<BridgeInner<L>>,
}

impl<L> Clone for Bridge<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct BridgeInner<L> {
    config: BridgeConfig,
    lights: Vec<Arc<LightConfig>>,
    link: L,
    /// Held for the whole tick, including forwarding its updates, so that
    /// concurrent passes publish in the order they observed.
    engine: Mutex<ReconciliationEngine>,
    /// Set by a refresh request, cleared as a pass starts. Only the request
    /// that sets it wakes the poll task.
    dirty: AtomicBool,
    wake: Notify,
    updates_tx: mpsc::Sender<LightUpdate>,
    updates_rx: Mutex<Option<mpsc::Receiver<LightUpdate>>>,
    commands_tx: mpsc::Sender<QueuedCommand>,
    commands_rx: Mutex<Option<mpsc::Receiver<QueuedCommand>>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

/// A command waiting for the command processor.
struct QueuedCommand {
    relay: u8,
    command: LightCommand,
}

impl Bridge<ControllerClient> {
    /// Bridge talking TCP to the configured controller host.
    pub fn from_config(config: BridgeConfig) -> Self {
        let link = ControllerClient::new(&config.controller_host);
        Self::new(config, link)
    }
}

impl<L: RelayController + 'static> Bridge<L> {
    /// Create a bridge. Does NOT poll -- call [`start()`](Self::start).
    pub fn new(config: BridgeConfig, link: L) -> Self {
        let lights: Vec<Arc<LightConfig>> =
            config.lights.iter().cloned().map(Arc::new).collect();
        let engine = ReconciliationEngine::new(lights.iter().cloned());
        let (updates_tx, updates_rx) = mpsc::channel(UPDATE_CHANNEL_SIZE);
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);

        Self {
            inner: Arc::new(BridgeInner {
                config,
                lights,
                link,
                engine: Mutex::new(engine),
                dirty: AtomicBool::new(false),
                wake: Notify::new(),
                updates_tx,
                updates_rx: Mutex::new(Some(updates_rx)),
                commands_tx,
                commands_rx: Mutex::new(Some(commands_rx)),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn link(&self) -> &L {
        &self.inner.link
    }

    /// Configured lights, in configuration order.
    pub fn lights(&self) -> &[Arc<LightConfig>] {
        &self.inner.lights
    }

    pub fn light(&self, relay: u8) -> Option<&Arc<LightConfig>> {
        self.inner.lights.iter().find(|light| light.relay == relay)
    }

    /// Take the stream of state publishes. Returns `None` after the first
    /// call. The receiver must be drained while the bridge runs.
    pub async fn take_updates(&self) -> Option<mpsc::Receiver<LightUpdate>> {
        self.inner.updates_rx.lock().await.take()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Spawn the poll task and the command processor. The first pass runs
    /// immediately.
    pub async fn start(&self) {
        let mut handles = self.inner.task_handles.lock().await;
        if !handles.is_empty() {
            debug!("bridge already started");
            return;
        }

        info!(
            controller = %self.inner.config.controller_host,
            lights = self.inner.lights.len(),
            interval_ms = u64::try_from(self.inner.config.poll_interval.as_millis())
                .unwrap_or(u64::MAX),
            "starting bridge"
        );
        let cancel = self.inner.cancel.clone();
        handles.push(tokio::spawn(poll_task(self.clone(), cancel.clone())));

        if let Some(rx) = self.inner.commands_rx.lock().await.take() {
            handles.push(tokio::spawn(command_processor_task(
                self.clone(),
                rx,
                cancel,
            )));
        }
    }

    /// Stop the background tasks and wait for them to finish. Commands
    /// still queued are dropped.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("bridge stopped");
    }

    // ── Reconciliation ───────────────────────────────────────────

    /// Run one reconciliation pass and forward its updates. Returns the
    /// number of updates produced.
    pub async fn reconcile(&self) -> Result<usize, CoreError> {
        let mut engine = self.inner.engine.lock().await;
        let updates = engine.tick(&self.inner.link).await?;
        let count = updates.len();

        for update in updates {
            debug!(
                relay = update.light.relay,
                state = %update.state.state,
                brightness = update.state.brightness,
                "light changed"
            );
            if self.inner.updates_tx.send(update).await.is_err() {
                debug!("update receiver dropped");
                break;
            }
        }
        Ok(count)
    }

    /// Ask for a reconciliation pass as soon as possible. Requests made
    /// while one is already pending coalesce.
    pub fn request_refresh(&self) {
        if !self.inner.dirty.swap(true, Ordering::AcqRel) {
            self.inner.wake.notify_one();
        }
    }

    /// Current view of every configured light the controller reports,
    /// without applying any policy or touching the bookkeeping.
    pub async fn snapshot(&self) -> Result<Vec<LightView>, CoreError> {
        let states = self.inner.link.relay_states().await?;
        Ok(self
            .inner
            .lights
            .iter()
            .filter_map(|light| {
                states
                    .iter()
                    .find(|state| state.relay == light.relay)
                    .map(|state| LightView::from_raw(Arc::clone(light), state.level))
            })
            .collect())
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Queue an inbound bus command. Queued commands are executed one at a
    /// time, in the order they were submitted.
    pub async fn submit(&self, relay: u8, command: LightCommand) -> Result<(), CoreError> {
        if self.light(relay).is_none() {
            return Err(CoreError::LightNotFound { relay });
        }
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::Stopped);
        }

        self.inner
            .commands_tx
            .send(QueuedCommand { relay, command })
            .await
            .map_err(|_| CoreError::Stopped)
    }

    /// Apply an inbound bus command to a relay, then request a refresh so
    /// the new state is published without waiting for the next poll.
    pub async fn execute(&self, relay: u8, command: LightCommand) -> Result<(), CoreError> {
        let light = self
            .light(relay)
            .cloned()
            .ok_or(CoreError::LightNotFound { relay })?;

        let result = self.apply_command(&light, command).await;
        self.request_refresh();
        result
    }

    async fn apply_command(
        &self,
        light: &LightConfig,
        command: LightCommand,
    ) -> Result<(), CoreError> {
        let link = &self.inner.link;
        let relay = light.relay;

        match command.state {
            LightStatus::On => {
                info!(relay, light = %light.name, brightness = ?command.brightness, "turning light on");
                link.turn_on(relay).await?;
                if !light.dimmable {
                    link.set_brightness(relay, MAX_LEVEL).await?;
                } else if let Some(requested) = command.requested_brightness() {
                    link.set_brightness(relay, brightness::to_controller(requested))
                        .await?;
                }
            }
            LightStatus::Off => {
                info!(relay, light = %light.name, "turning light off");
                link.turn_off(relay).await?;
            }
        }
        Ok(())
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Reconcile on every interval tick and on every refresh request.
async fn poll_task<L: RelayController + 'static>(bridge: Bridge<L>, cancel: CancellationToken) {
    let period = bridge.inner.config.poll_interval.max(MIN_POLL_INTERVAL);
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = bridge.inner.wake.notified() => {
                // Left over from a request an interval pass already served.
                if !bridge.inner.dirty.load(Ordering::Acquire) {
                    continue;
                }
                debug!("refresh requested");
            }
            _ = interval.tick() => {}
        }

        bridge.inner.dirty.store(false, Ordering::Release);
        if let Err(e) = bridge.reconcile().await {
            warn!(error = %e, "reconciliation failed, retrying next pass");
        }
    }
}

/// Execute queued commands one at a time, in arrival order.
async fn command_processor_task<L: RelayController + 'static>(
    bridge: Bridge<L>,
    mut rx: mpsc::Receiver<QueuedCommand>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            queued = rx.recv() => {
                let Some(QueuedCommand { relay, command }) = queued else { break };
                if let Err(e) = bridge.execute(relay, command).await {
                    warn!(relay, error = %e, "light command failed");
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::LightState;
    use crate::testing::{FakeController, Write};

    const RECV_TIMEOUT: Duration = Duration::from_secs(2);

    fn lights() -> Vec<LightConfig> {
        vec![
            LightConfig::new(1, "Kitchen").dimmable(),
            LightConfig::new(2, "Garage"),
            LightConfig::new(3, "Stairs").always_on(),
        ]
    }

    fn bridge(link: FakeController, poll_interval: Duration) -> Bridge<FakeController> {
        let config = BridgeConfig::new("fake", lights()).with_poll_interval(poll_interval);
        Bridge::new(config, link)
    }

    async fn next_update(rx: &mut mpsc::Receiver<LightUpdate>) -> LightUpdate {
        tokio::time::timeout(RECV_TIMEOUT, rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    // ── execute ──

    #[tokio::test]
    async fn on_for_non_dimmable_forces_full_brightness() {
        let bridge = bridge(FakeController::with_levels(&[0, 0, 63]), Duration::from_secs(3600));

        bridge
            .execute(2, LightCommand::on().with_brightness(40))
            .await
            .unwrap();

        assert_eq!(
            bridge.link().take_writes(),
            vec![Write::On(2), Write::Level(2, 63)]
        );
    }

    #[tokio::test]
    async fn on_with_brightness_scales_to_controller_domain() {
        let bridge = bridge(FakeController::with_levels(&[0, 0, 63]), Duration::from_secs(3600));

        bridge
            .execute(1, LightCommand::on().with_brightness(128))
            .await
            .unwrap();

        assert_eq!(
            bridge.link().take_writes(),
            vec![Write::On(1), Write::Level(1, 32)]
        );
    }

    #[tokio::test]
    async fn on_without_brightness_only_switches() {
        let bridge = bridge(FakeController::with_levels(&[0, 0, 63]), Duration::from_secs(3600));

        bridge.execute(1, LightCommand::on()).await.unwrap();
        bridge
            .execute(1, LightCommand::on().with_brightness(0))
            .await
            .unwrap();

        assert_eq!(
            bridge.link().take_writes(),
            vec![Write::On(1), Write::On(1)]
        );
    }

    #[tokio::test]
    async fn off_turns_relay_off() {
        let bridge = bridge(FakeController::with_levels(&[40, 0, 63]), Duration::from_secs(3600));

        bridge
            .execute(1, LightCommand::off().with_brightness(200))
            .await
            .unwrap();

        assert_eq!(bridge.link().take_writes(), vec![Write::Off(1)]);
    }

    #[tokio::test]
    async fn unknown_relay_is_rejected() {
        let bridge = bridge(FakeController::with_levels(&[0, 0, 63]), Duration::from_secs(3600));

        let err = bridge.execute(9, LightCommand::on()).await.unwrap_err();

        assert!(matches!(err, CoreError::LightNotFound { relay: 9 }));
        assert!(bridge.link().take_writes().is_empty());
    }

    #[tokio::test]
    async fn failed_write_is_reported() {
        let link = FakeController::with_levels(&[0, 0, 63]);
        link.fail_writes(true);
        let bridge = bridge(link, Duration::from_secs(3600));

        let err = bridge.execute(1, LightCommand::on()).await.unwrap_err();

        assert!(matches!(err, CoreError::Protocol { .. }));
    }

    // ── polling ──

    #[tokio::test]
    async fn command_triggers_an_immediate_publish() {
        let bridge = bridge(FakeController::with_levels(&[0, 0, 63]), Duration::from_secs(3600));
        let mut rx = bridge.take_updates().await.unwrap();
        assert!(bridge.take_updates().await.is_none());

        bridge.start().await;

        let mut initial = Vec::new();
        for _ in 0..3 {
            let update = next_update(&mut rx).await;
            initial.push((update.light.relay, update.state));
        }
        assert_eq!(
            initial,
            vec![
                (1, LightState::from_brightness(0)),
                (2, LightState::from_brightness(0)),
                (3, LightState::from_brightness(255)),
            ]
        );

        bridge
            .execute(1, LightCommand::on().with_brightness(255))
            .await
            .unwrap();

        let update = next_update(&mut rx).await;
        assert_eq!(update.light.name, "Kitchen");
        assert_eq!(update.state, LightState::from_brightness(255));

        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn refresh_requests_coalesce() {
        let link = FakeController::with_levels(&[0, 0, 63])
            .with_state_delay(Duration::from_millis(50));
        let bridge = bridge(link, Duration::from_secs(3600));
        let mut rx = bridge.take_updates().await.unwrap();

        bridge.start().await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(bridge.link().state_calls(), 1);

        for _ in 0..10 {
            bridge.request_refresh();
        }
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(bridge.link().state_calls(), 2);

        bridge.request_refresh();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(bridge.link().state_calls(), 3);

        bridge.shutdown().await;
        while rx.try_recv().is_ok() {}
    }

    #[tokio::test]
    async fn refresh_during_a_pass_schedules_one_more() {
        let link = FakeController::with_levels(&[0, 0, 63])
            .with_state_delay(Duration::from_millis(100));
        let bridge = bridge(link, Duration::from_secs(3600));
        let mut rx = bridge.take_updates().await.unwrap();

        bridge.start().await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(bridge.link().state_calls(), 1);

        for _ in 0..5 {
            bridge.request_refresh();
        }
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(bridge.link().state_calls(), 2);

        bridge.shutdown().await;
        while rx.try_recv().is_ok() {}
    }

    #[tokio::test]
    async fn failed_pass_is_retried_on_next_interval() {
        let link = FakeController::with_levels(&[0, 0, 63]);
        link.fail_state(true);
        let bridge = bridge(link, Duration::from_millis(50));
        let mut rx = bridge.take_updates().await.unwrap();

        bridge.start().await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(rx.try_recv().is_err());

        bridge.link().fail_state(false);
        let update = next_update(&mut rx).await;
        assert_eq!(update.light.relay, 1);

        bridge.shutdown().await;
    }

    // ── command queue ──

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn queued_commands_run_in_submission_order() {
        let bridge = bridge(FakeController::with_levels(&[0, 0, 63]), Duration::from_secs(3600));
        let mut rx = bridge.take_updates().await.unwrap();
        tokio::spawn(async move { while rx.recv().await.is_some() {} });
        bridge.start().await;

        for _ in 0..50 {
            bridge.submit(1, LightCommand::off()).await.unwrap();
            bridge.submit(1, LightCommand::on()).await.unwrap();
        }

        let mut writes = Vec::new();
        tokio::time::timeout(RECV_TIMEOUT, async {
            while writes.len() < 100 {
                writes.extend(bridge.link().take_writes());
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let expected: Vec<Write> = (0..50)
            .flat_map(|_| [Write::Off(1), Write::On(1)])
            .collect();
        assert_eq!(writes, expected);

        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn submit_rejects_unknown_relay_and_stopped_bridge() {
        let bridge = bridge(FakeController::with_levels(&[0, 0, 63]), Duration::from_secs(3600));

        let err = bridge.submit(9, LightCommand::on()).await.unwrap_err();
        assert!(matches!(err, CoreError::LightNotFound { relay: 9 }));

        bridge.start().await;
        bridge.shutdown().await;

        let err = bridge.submit(1, LightCommand::on()).await.unwrap_err();
        assert!(matches!(err, CoreError::Stopped));
    }

    #[tokio::test]
    async fn snapshot_reports_configured_lights_only() {
        let bridge = bridge(
            FakeController::with_levels(&[32, 1, 63, 10]),
            Duration::from_secs(3600),
        );

        let views = bridge.snapshot().await.unwrap();

        let summary: Vec<(u8, u8)> = views
            .iter()
            .map(|v| (v.config.relay, v.brightness))
            .collect();
        assert_eq!(summary, vec![(1, 130), (2, 255), (3, 255)]);
        assert!(bridge.link().take_writes().is_empty());
    }
}
