// ── Brightness domains ──
//
// The controller speaks 0..=63, the bus speaks 0..=255. Both conversions
// round to nearest; the divisors are odd so there are no ties.

pub use domestia_api::MAX_LEVEL;

/// Highest brightness on the bus.
pub const MAX_BRIGHTNESS: u8 = 255;

/// Raw byte reported by switched-on non-dimmable relays.
const RAW_SWITCHED_ON: u8 = 1;

/// Controller level (0..=63) to bus brightness (0..=255).
pub fn to_bus(level: u8) -> u8 {
    let level = u16::from(level.min(MAX_LEVEL));
    let max = u16::from(MAX_LEVEL);
    u8::try_from((level * u16::from(MAX_BRIGHTNESS) + max / 2) / max).unwrap_or(MAX_BRIGHTNESS)
}

/// Bus brightness (0..=255) to controller level (0..=63).
pub fn to_controller(brightness: u8) -> u8 {
    let max = u16::from(MAX_BRIGHTNESS);
    let scaled = (u16::from(brightness) * u16::from(MAX_LEVEL) + max / 2) / max;
    u8::try_from(scaled).unwrap_or(MAX_LEVEL)
}

/// Apply the switched-on correction to a raw state byte: `1` means fully on.
///
/// Applied to every relay regardless of its flags.
pub fn normalize_raw(raw: u8) -> u8 {
    if raw == RAW_SWITCHED_ON { MAX_LEVEL } else { raw }
}

/// Raw state byte straight to bus brightness.
pub fn from_raw(raw: u8) -> u8 {
    to_bus(normalize_raw(raw))
}
