// Controller wire framing
//
// Every command travels as `FF 00 00 <len> <payload..> <sum>`, where `sum`
// is the 8-bit wrapping sum of the payload bytes only. Responses are either
// a state frame (leading 0xFF, one brightness byte per relay from offset 3)
// or a bare ASCII `OK` acknowledgement.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::Error;

/// First byte of every request frame and of a valid state response.
pub const FRAME_START: u8 = 0xff;

/// Header bytes preceding the relay levels in a state response.
const STATE_HEADER_LEN: usize = 3;

/// Acknowledgement sent by the controller for write commands.
const ACK: &[u8] = b"OK";

const OP_STATE: u8 = 0x3c;
const OP_TURN_ON: u8 = 0x0e;
const OP_TURN_OFF: u8 = 0x0f;
const OP_SET_BRIGHTNESS: u8 = 0x10;

/// Highest brightness level the controller understands.
pub const MAX_LEVEL: u8 = 63;

/// Raw relay state as reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayState {
    /// Relay id, 1-based.
    pub relay: u8,
    /// Raw level byte, 0..=63 (1 for switched-on non-dimmable relays).
    pub level: u8,
}

/// A controller command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Query the levels of all relays.
    State,
    TurnOn(u8),
    TurnOff(u8),
    /// Set a relay level in the controller's 0..=63 domain.
    SetBrightness { relay: u8, level: u8 },
}

impl Command {
    /// Unframed command bytes.
    pub fn payload(&self) -> Vec<u8> {
        match *self {
            Self::State => vec![OP_STATE],
            Self::TurnOn(relay) => vec![OP_TURN_ON, relay],
            Self::TurnOff(relay) => vec![OP_TURN_OFF, relay],
            Self::SetBrightness { relay, level } => {
                vec![OP_SET_BRIGHTNESS, relay, level.min(MAX_LEVEL)]
            }
        }
    }

    /// Framed bytes ready for the wire.
    pub fn encode(&self) -> Result<Bytes, Error> {
        encode(&self.payload())
    }
}

/// Wrap a command payload into a checksummed frame.
pub fn encode(payload: &[u8]) -> Result<Bytes, Error> {
    let len = u8::try_from(payload.len()).map_err(|_| Error::PayloadTooLong {
        len: payload.len(),
    })?;

    let mut buf = BytesMut::with_capacity(payload.len() + 5);
    buf.put_slice(&[FRAME_START, 0x00, 0x00, len]);
    buf.put_slice(payload);
    buf.put_u8(checksum(payload));
    Ok(buf.freeze())
}

fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

/// Parse a response to [`Command::State`].
///
/// A response that does not start with [`FRAME_START`] means the controller
/// reported no lights; that is an empty result, not an error.
pub fn decode_state(response: &[u8]) -> Vec<RelayState> {
    if response.first() != Some(&FRAME_START) {
        return Vec::new();
    }

    response
        .get(STATE_HEADER_LEN..)
        .unwrap_or_default()
        .iter()
        .zip(1..=u8::MAX)
        .map(|(&level, relay)| RelayState { relay, level })
        .collect()
}

/// Validate the acknowledgement to a write command.
pub fn decode_ack(response: &[u8]) -> Result<(), Error> {
    if response == ACK {
        Ok(())
    } else {
        Err(Error::UnexpectedAck {
            received: response.to_vec(),
        })
    }
}
