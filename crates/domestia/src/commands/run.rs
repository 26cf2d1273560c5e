//! `domestia run`: the long-running bridge service.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, Outgoing, Packet, Publish};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use domestia_config::Config;
use domestia_core::{Bridge, LightUpdate};

use crate::error::CliError;
use crate::mqtt::{self, LightRegistry};

const MQTT_CHANNEL_CAPACITY: usize = 256;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

pub async fn handle(config: &Config) -> Result<(), CliError> {
    let bridge = Bridge::from_config(config.to_bridge_config());
    let updates = bridge
        .take_updates()
        .await
        .ok_or_else(|| CliError::Internal("update stream already taken".into()))?;

    let (client, eventloop) = AsyncClient::new(mqtt::options(config), MQTT_CHANNEL_CAPACITY);
    let registry = Arc::new(LightRegistry::new(client, config.topics(), bridge.lights()));

    info!(
        broker = %config.mqtt.ip_address,
        port = config.mqtt.port,
        "connecting to MQTT broker"
    );

    let cancel = CancellationToken::new();
    let mqtt_handle = tokio::spawn(event_loop_task(
        eventloop,
        Arc::clone(&registry),
        bridge.clone(),
    ));
    let publisher_handle = tokio::spawn(publisher_task(
        updates,
        Arc::clone(&registry),
        cancel.clone(),
    ));

    bridge.start().await;
    info!("bridge running, send SIGINT or SIGTERM to stop");

    let signal = shutdown_signal().await;
    info!("shutting down");

    bridge.shutdown().await;
    cancel.cancel();
    let _ = publisher_handle.await;

    if let Err(e) = registry.publish_availability(false).await {
        warn!(error = %e, "failed to publish offline availability");
    }
    if let Err(e) = registry.disconnect().await {
        warn!(error = %e, "failed to request MQTT disconnect");
    }
    if tokio::time::timeout(SHUTDOWN_GRACE, mqtt_handle).await.is_err() {
        warn!("MQTT event loop did not stop in time");
    }

    signal.map_err(CliError::from)
}

// ── Background tasks ─────────────────────────────────────────────────

/// Drive the MQTT connection. Exits once the disconnect request has gone
/// out.
async fn event_loop_task(mut eventloop: EventLoop, registry: Arc<LightRegistry>, bridge: Bridge) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("connected to MQTT broker");
                // Registration queues requests that this loop must keep
                // polling to flush.
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    if let Err(e) = registry.announce().await {
                        error!(error = %e, "failed to register lights with broker");
                    }
                });
            }
            Ok(Event::Incoming(Packet::Publish(msg))) => {
                handle_command(&registry, &bridge, &msg).await;
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("MQTT disconnect sent");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "MQTT connection error, retrying");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

/// Route an inbound publish to its light and queue it on the bridge, which
/// executes commands in arrival order. Malformed payloads are dropped.
async fn handle_command(registry: &LightRegistry, bridge: &Bridge, msg: &Publish) {
    let Some(relay) = registry.route(&msg.topic) else {
        debug!(topic = %msg.topic, "ignoring publish on unrouted topic");
        return;
    };

    let command = match mqtt::decode_command(&msg.payload) {
        Ok(command) => command,
        Err(e) => {
            warn!(
                topic = %msg.topic,
                payload = %String::from_utf8_lossy(&msg.payload),
                error = %e,
                "dropping malformed light command"
            );
            return;
        }
    };

    debug!(relay, ?command, "light command received");
    if let Err(e) = bridge.submit(relay, command).await {
        warn!(relay, error = %e, "light command dropped");
    }
}

/// Publish every state update the bridge produces.
async fn publisher_task(
    mut updates: mpsc::Receiver<LightUpdate>,
    registry: Arc<LightRegistry>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            update = updates.recv() => {
                let Some(update) = update else { break };
                if let Err(e) = registry.publish_state(&update).await {
                    warn!(relay = update.light.relay, error = %e, "failed to publish state");
                }
            }
        }
    }
}

// ── Signals ──────────────────────────────────────────────────────────

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = sigterm.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
