//! MQTT side of the bridge: connection options, Home Assistant
//! registration, command routing, and state publishing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, ClientError, LastWill, MqttOptions, QoS};
use secrecy::ExposeSecret;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use domestia_config::Config;
use domestia_core::model::{AVAILABILITY_OFFLINE, AVAILABILITY_ONLINE};
use domestia_core::{DiscoveryConfig, LightCommand, LightConfig, LightUpdate, Topics};

/// rumqttc rejects keep-alives shorter than this.
const MIN_KEEP_ALIVE: Duration = Duration::from_secs(5);

/// Failure to hand a publish or subscribe to the MQTT client.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// JSON body for a publish.
fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, PublishError> {
    Ok(serde_json::to_vec(value)?)
}

// ── Options ─────────────────────────────────────────────────────────

/// Broker connection options, with a retained `offline` last will on the
/// availability topic.
pub fn options(config: &Config) -> MqttOptions {
    let mqtt = &config.mqtt;
    let mut opts = MqttOptions::new(&mqtt.client_id, mqtt.ip_address.trim(), mqtt.port);
    opts.set_keep_alive(Duration::from_secs(mqtt.keep_alive).max(MIN_KEEP_ALIVE));

    if let Some(username) = &mqtt.username {
        let password = config
            .mqtt_password()
            .map(|p| p.expose_secret().to_owned())
            .unwrap_or_default();
        opts.set_credentials(username, password);
    }

    opts.set_last_will(LastWill::new(
        config.topics().availability_topic(),
        AVAILABILITY_OFFLINE,
        QoS::AtLeastOnce,
        true,
    ));
    opts
}

// ── Light registry ──────────────────────────────────────────────────

/// Publishes on behalf of the configured lights and routes command topics
/// back to relays.
pub struct LightRegistry {
    client: AsyncClient,
    topics: Topics,
    lights: Vec<Arc<LightConfig>>,
    /// Command topic to relay, for lights that accept commands.
    routes: HashMap<String, u8>,
}

impl LightRegistry {
    pub fn new(client: AsyncClient, topics: Topics, lights: &[Arc<LightConfig>]) -> Self {
        let routes = lights
            .iter()
            .filter(|light| light.accepts_commands())
            .map(|light| (topics.command_topic(light), light.relay))
            .collect();

        Self {
            client,
            topics,
            lights: lights.to_vec(),
            routes,
        }
    }

    /// Relay addressed by a command topic.
    pub fn route(&self, topic: &str) -> Option<u8> {
        self.routes.get(topic).copied()
    }

    /// Register with the broker. Runs on every ConnAck, since subscriptions
    /// do not survive a reconnect.
    pub async fn announce(&self) -> Result<(), PublishError> {
        for light in self.lights.iter().filter(|light| light.is_discoverable()) {
            let payload = encode(&DiscoveryConfig::new(light, &self.topics))?;
            self.client
                .publish(
                    self.topics.config_topic(light),
                    QoS::AtLeastOnce,
                    true,
                    payload,
                )
                .await?;
        }

        for topic in self.routes.keys() {
            self.client.subscribe(topic, QoS::AtLeastOnce).await?;
        }

        self.publish_availability(true).await?;
        info!(
            discovered = self.lights.iter().filter(|l| l.is_discoverable()).count(),
            subscribed = self.routes.len(),
            "registered lights with broker"
        );
        Ok(())
    }

    pub async fn publish_availability(&self, online: bool) -> Result<(), PublishError> {
        let payload = if online {
            AVAILABILITY_ONLINE
        } else {
            AVAILABILITY_OFFLINE
        };
        self.client
            .publish(
                self.topics.availability_topic(),
                QoS::AtLeastOnce,
                true,
                payload,
            )
            .await?;
        Ok(())
    }

    /// Publish a light's state, retained.
    pub async fn publish_state(&self, update: &LightUpdate) -> Result<(), PublishError> {
        let topic = self.topics.state_topic(&update.light);
        let payload = encode(&update.state)?;
        debug!(%topic, state = %update.state.state, brightness = update.state.brightness, "publishing state");
        self.client
            .publish(topic, QoS::AtLeastOnce, true, payload)
            .await?;
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<(), PublishError> {
        self.client.disconnect().await?;
        Ok(())
    }
}

/// Decode a command payload.
pub fn decode_command(payload: &[u8]) -> Result<LightCommand, serde_json::Error> {
    serde_json::from_slice(payload)
}
