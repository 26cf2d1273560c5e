//! Configuration for the domestia bridge.
//!
//! Loads `domestia.json` (or a TOML equivalent), layers `DOMESTIA_*`
//! environment overrides on top, validates it, and translates it into
//! `domestia_core::BridgeConfig`. Problems here are fatal at startup only.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use domestia_core::model::{DEFAULT_DISCOVERY_PREFIX, DEFAULT_TOPIC_PREFIX};
use domestia_core::{BridgeConfig, LightConfig, Topics};

/// Prefix for environment overrides. Nested keys use `__`, e.g.
/// `DOMESTIA_MQTT__PORT`.
pub const ENV_PREFIX: &str = "DOMESTIA_";

/// Environment variable holding the MQTT password.
pub const PASSWORD_ENV: &str = "DOMESTIA_MQTT_PASSWORD";

const CONFIG_FILE_NAME: &str = "domestia.json";

/// A state response carries at most 256 bytes, three of which are header.
const MAX_RELAY: u8 = 253;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── Config structs ──────────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Controller IP or hostname.
    #[serde(default)]
    pub ip_address: String,

    /// Poll interval in milliseconds.
    #[serde(default = "default_refresh_frequency")]
    pub refresh_frequency: u64,

    #[serde(default)]
    pub mqtt: MqttSettings,

    #[serde(default)]
    pub lights: Vec<LightEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ip_address: String::new(),
            refresh_frequency: default_refresh_frequency(),
            mqtt: MqttSettings::default(),
            lights: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MqttSettings {
    /// Broker IP or hostname.
    #[serde(default)]
    pub ip_address: String,

    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    pub username: Option<String>,

    /// Plaintext password (prefer `DOMESTIA_MQTT_PASSWORD`).
    pub password: Option<String>,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    #[serde(default = "default_discovery_prefix")]
    pub discovery_prefix: String,

    /// Keep-alive interval in seconds.
    #[serde(default = "default_keep_alive")]
    pub keep_alive: u64,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            ip_address: String::new(),
            port: default_mqtt_port(),
            username: None,
            password: None,
            client_id: default_client_id(),
            topic_prefix: default_topic_prefix(),
            discovery_prefix: default_discovery_prefix(),
            keep_alive: default_keep_alive(),
        }
    }
}

/// One light as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LightEntry {
    pub name: String,
    pub relay: u8,
    #[serde(default)]
    pub dimmable: bool,
    #[serde(default)]
    pub always_on: bool,
    /// Skip Home Assistant discovery for this light.
    #[serde(default, alias = "hidden_in_home_assistant")]
    pub hidden: bool,
}

fn default_refresh_frequency() -> u64 {
    2000
}
fn default_mqtt_port() -> u16 {
    1883
}
fn default_client_id() -> String {
    "domestia".into()
}
fn default_topic_prefix() -> String {
    DEFAULT_TOPIC_PREFIX.into()
}
fn default_discovery_prefix() -> String {
    DEFAULT_DISCOVERY_PREFIX.into()
}
fn default_keep_alive() -> u64 {
    30
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the default config file path via platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("", "", "domestia").map_or_else(
        || dirs_fallback().join(CONFIG_FILE_NAME),
        |dirs| dirs.config_dir().join(CONFIG_FILE_NAME),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("domestia");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load and validate the configuration at `path`, with environment
/// overrides applied. `.json` files are read as JSON, anything else as TOML.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let figment = Figment::new().merge(Serialized::defaults(Config::default()));
    let figment = if is_json {
        figment.merge(Json::file(path))
    } else {
        figment.merge(Toml::file(path))
    };
    let figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

// ── Validation and translation ──────────────────────────────────────

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ip_address.trim().is_empty() {
            return Err(ConfigError::invalid(
                "ip_address",
                "the controller address is required",
            ));
        }
        if self.mqtt.ip_address.trim().is_empty() {
            return Err(ConfigError::invalid(
                "mqtt.ip_address",
                "the broker address is required",
            ));
        }
        if self.refresh_frequency == 0 {
            return Err(ConfigError::invalid(
                "refresh_frequency",
                "must be greater than zero",
            ));
        }

        let mut relays = HashSet::new();
        let mut entities = HashSet::new();
        for light in &self.lights {
            if light.name.trim().is_empty() {
                return Err(ConfigError::invalid(
                    "lights.name",
                    format!("light on relay {} has no name", light.relay),
                ));
            }
            if !(1..=MAX_RELAY).contains(&light.relay) {
                return Err(ConfigError::invalid(
                    "lights.relay",
                    format!(
                        "relay {} of '{}' is outside 1..={MAX_RELAY}",
                        light.relay, light.name
                    ),
                ));
            }
            if !relays.insert(light.relay) {
                return Err(ConfigError::invalid(
                    "lights.relay",
                    format!("relay {} is configured more than once", light.relay),
                ));
            }
            let entity = light.to_light_config().entity_id();
            if !entities.insert(entity.clone()) {
                return Err(ConfigError::invalid(
                    "lights.name",
                    format!("'{}' collides with another light as '{entity}'", light.name),
                ));
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_frequency)
    }

    /// Translate into the runtime bridge configuration.
    pub fn to_bridge_config(&self) -> BridgeConfig {
        BridgeConfig::new(
            self.ip_address.trim(),
            self.lights.iter().map(LightEntry::to_light_config).collect(),
        )
        .with_poll_interval(self.poll_interval())
    }

    pub fn topics(&self) -> Topics {
        Topics::new(&self.mqtt.topic_prefix, &self.mqtt.discovery_prefix)
    }

    /// MQTT password: environment first, then the config file.
    pub fn mqtt_password(&self) -> Option<SecretString> {
        std::env::var(PASSWORD_ENV)
            .ok()
            .or_else(|| self.mqtt.password.clone())
            .map(SecretString::from)
    }
}

impl LightEntry {
    pub fn to_light_config(&self) -> LightConfig {
        LightConfig {
            relay: self.relay,
            name: self.name.trim().to_owned(),
            dimmable: self.dimmable,
            always_on: self.always_on,
            hidden_from_discovery: self.hidden,
        }
    }
}
