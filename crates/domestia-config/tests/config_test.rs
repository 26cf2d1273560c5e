#![allow(clippy::unwrap_used)]
// Integration tests for configuration loading and validation.

use std::io::Write;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tempfile::{NamedTempFile, TempDir};

use domestia_config::{Config, ConfigError, LightEntry, load_config};
use domestia_core::LightConfig;

// ── Helpers ─────────────────────────────────────────────────────────

fn write_config(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn assert_invalid(result: Result<Config, ConfigError>, expected_field: &str) {
    match result {
        Err(ConfigError::Validation { field, .. }) => assert_eq!(field, expected_field),
        other => panic!("expected validation error on {expected_field}, got: {other:?}"),
    }
}

const ORIGINAL_JSON: &str = r#"{
    "ip_address": "192.168.1.50",
    "mqtt": {
        "ip_address": "192.168.1.10",
        "username": "bridge",
        "password": "hunter2"
    },
    "lights": [
        { "name": "Living Room", "relay": 1, "dimmable": true },
        { "name": "Garage", "relay": 2 },
        { "name": "Stairs", "relay": 5, "always_on": true },
        { "name": "Attic", "relay": 6, "hidden_in_home_assistant": true }
    ]
}"#;

// ── Loading ─────────────────────────────────────────────────────────

#[test]
fn test_load_json_with_defaults() {
    let file = write_config(".json", ORIGINAL_JSON);

    let config = load_config(file.path()).unwrap();

    assert_eq!(config.ip_address, "192.168.1.50");
    assert_eq!(config.refresh_frequency, 2000);
    assert_eq!(config.mqtt.port, 1883);
    assert_eq!(config.mqtt.client_id, "domestia");
    assert_eq!(config.mqtt.keep_alive, 30);
    assert_eq!(config.mqtt.username.as_deref(), Some("bridge"));
    assert_eq!(config.lights.len(), 4);
    assert!(config.lights[3].hidden);
}

#[test]
fn test_load_toml() {
    let file = write_config(
        ".toml",
        r#"
ip_address = "controller.local"
refresh_frequency = 500

[mqtt]
ip_address = "broker.local"
port = 8883
topic_prefix = "house"

[[lights]]
name = "Porch"
relay = 9
dimmable = true
hidden = true
"#,
    );

    let config = load_config(file.path()).unwrap();

    assert_eq!(config.refresh_frequency, 500);
    assert_eq!(config.mqtt.port, 8883);
    assert_eq!(
        config.lights,
        vec![LightEntry {
            name: "Porch".into(),
            relay: 9,
            dimmable: true,
            always_on: false,
            hidden: true,
        }]
    );
    assert_eq!(config.topics().prefix, "house");
    assert_eq!(config.topics().discovery_prefix, "homeassistant");
}

#[test]
fn test_bridge_config_translation() {
    let file = write_config(".json", ORIGINAL_JSON);
    let config = load_config(file.path()).unwrap();

    let bridge = config.to_bridge_config();

    assert_eq!(bridge.controller_host, "192.168.1.50");
    assert_eq!(bridge.poll_interval, Duration::from_millis(2000));
    assert_eq!(
        bridge.lights[0],
        LightConfig::new(1, "Living Room").dimmable()
    );
    assert_eq!(bridge.lights[2], LightConfig::new(5, "Stairs").always_on());
    assert_eq!(bridge.lights[3], LightConfig::new(6, "Attic").hidden());
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("domestia.json");

    let result = load_config(&path);

    assert!(
        matches!(result, Err(ConfigError::NotFound { ref path }) if path.ends_with("domestia.json")),
        "expected NotFound, got: {result:?}"
    );
}

#[test]
fn test_malformed_file() {
    let file = write_config(".json", r#"{ "ip_address": "#);
    assert!(matches!(load_config(file.path()), Err(ConfigError::Figment(_))));
}

// ── Validation ──────────────────────────────────────────────────────

#[test]
fn test_controller_address_required() {
    let file = write_config(".json", r#"{ "mqtt": { "ip_address": "10.0.0.1" } }"#);
    assert_invalid(load_config(file.path()), "ip_address");
}

#[test]
fn test_broker_address_required() {
    let file = write_config(".json", r#"{ "ip_address": "10.0.0.2" }"#);
    assert_invalid(load_config(file.path()), "mqtt.ip_address");
}

#[test]
fn test_zero_refresh_rejected() {
    let file = write_config(
        ".json",
        r#"{ "ip_address": "10.0.0.2", "refresh_frequency": 0, "mqtt": { "ip_address": "10.0.0.1" } }"#,
    );
    assert_invalid(load_config(file.path()), "refresh_frequency");
}

#[test]
fn test_duplicate_relay_rejected() {
    let file = write_config(
        ".json",
        r#"{
            "ip_address": "10.0.0.2",
            "mqtt": { "ip_address": "10.0.0.1" },
            "lights": [
                { "name": "Hall", "relay": 3 },
                { "name": "Hall Spots", "relay": 3 }
            ]
        }"#,
    );
    assert_invalid(load_config(file.path()), "lights.relay");
}

#[test]
fn test_relay_zero_rejected() {
    let file = write_config(
        ".json",
        r#"{
            "ip_address": "10.0.0.2",
            "mqtt": { "ip_address": "10.0.0.1" },
            "lights": [ { "name": "Hall", "relay": 0 } ]
        }"#,
    );
    assert_invalid(load_config(file.path()), "lights.relay");
}

#[test]
fn test_colliding_entity_ids_rejected() {
    let file = write_config(
        ".json",
        r#"{
            "ip_address": "10.0.0.2",
            "mqtt": { "ip_address": "10.0.0.1" },
            "lights": [
                { "name": "Living Room", "relay": 1 },
                { "name": "living room", "relay": 2 }
            ]
        }"#,
    );
    assert_invalid(load_config(file.path()), "lights.name");
}

#[test]
fn test_password_from_file() {
    use secrecy::ExposeSecret;

    let file = write_config(".json", ORIGINAL_JSON);
    let config = load_config(file.path()).unwrap();

    // The environment takes precedence when set.
    let expected = std::env::var(domestia_config::PASSWORD_ENV)
        .unwrap_or_else(|_| "hunter2".into());
    assert_eq!(config.mqtt_password().unwrap().expose_secret(), expected);
}
