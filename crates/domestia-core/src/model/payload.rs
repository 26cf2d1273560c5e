// ── Bus payloads ──
//
// JSON bodies exchanged with Home Assistant's MQTT light schema.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::brightness::MAX_BRIGHTNESS;

/// On/off as it appears on the bus.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum LightStatus {
    On,
    Off,
}

/// Outbound state published for a light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightState {
    pub state: LightStatus,
    pub brightness: u8,
}

impl LightState {
    /// `Off` iff brightness is zero.
    pub fn from_brightness(brightness: u8) -> Self {
        let state = if brightness == 0 {
            LightStatus::Off
        } else {
            LightStatus::On
        };
        Self { state, brightness }
    }
}

/// Inbound command received on a light's command topic.
///
/// A `brightness` of 0 alongside `ON` means "not provided".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightCommand {
    pub state: LightStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u16>,
}

impl LightCommand {
    pub fn on() -> Self {
        Self {
            state: LightStatus::On,
            brightness: None,
        }
    }

    pub fn off() -> Self {
        Self {
            state: LightStatus::Off,
            brightness: None,
        }
    }

    pub fn with_brightness(mut self, brightness: u16) -> Self {
        self.brightness = Some(brightness);
        self
    }

    /// Requested bus brightness, if any. Values above 255 are clamped.
    pub fn requested_brightness(&self) -> Option<u8> {
        match self.brightness {
            None | Some(0) => None,
            Some(b) => Some(u8::try_from(b).unwrap_or(MAX_BRIGHTNESS)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn state_serializes_for_the_json_schema() {
        let value = serde_json::to_value(LightState::from_brightness(130)).unwrap();
        assert_eq!(value, json!({"state": "ON", "brightness": 130}));

        let value = serde_json::to_value(LightState::from_brightness(0)).unwrap();
        assert_eq!(value, json!({"state": "OFF", "brightness": 0}));
    }

    #[test]
    fn command_without_brightness() {
        let cmd: LightCommand = serde_json::from_str(r#"{"state":"ON"}"#).unwrap();
        assert_eq!(cmd, LightCommand::on());
        assert_eq!(cmd.requested_brightness(), None);
    }

    #[test]
    fn zero_brightness_means_not_provided() {
        let cmd: LightCommand =
            serde_json::from_str(r#"{"state":"ON","brightness":0}"#).unwrap();
        assert_eq!(cmd.requested_brightness(), None);
    }

    #[test]
    fn brightness_above_range_clamps() {
        let cmd = LightCommand::on().with_brightness(300);
        assert_eq!(cmd.requested_brightness(), Some(255));
        assert_eq!(
            LightCommand::on().with_brightness(77).requested_brightness(),
            Some(77)
        );
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let cmd: LightCommand =
            serde_json::from_str(r#"{"state":"OFF","transition":2}"#).unwrap();
        assert_eq!(cmd, LightCommand::off());
    }

    #[test]
    fn unknown_state_is_rejected() {
        assert!(serde_json::from_str::<LightCommand>(r#"{"state":"TOGGLE"}"#).is_err());
    }

    #[test]
    fn status_displays_uppercase() {
        assert_eq!(LightStatus::On.to_string(), "ON");
        assert_eq!("OFF".parse::<LightStatus>().unwrap(), LightStatus::Off);
    }
}
