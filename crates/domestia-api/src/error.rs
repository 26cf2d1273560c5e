use thiserror::Error;

/// Top-level error type for the `domestia-api` crate.
///
/// Covers every failure mode of a single command/response exchange with the
/// controller. `domestia-core` maps these into domain-level errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// Dialing the controller failed (refused, unreachable, DNS, etc.)
    #[error("Cannot connect to controller at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Write or read on an established connection failed.
    #[error("Controller I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The exchange did not complete within the per-call deadline.
    #[error("Controller exchange timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The controller closed the connection without answering.
    #[error("Controller returned an empty response")]
    EmptyResponse,

    // ── Protocol ────────────────────────────────────────────────────
    /// A command was not acknowledged with `OK`. Carries the raw bytes.
    #[error("Unexpected command response, expected OK, received {}", render_bytes(received))]
    UnexpectedAck { received: Vec<u8> },

    /// Command payload does not fit the one-byte length field.
    #[error("Command payload of {len} bytes exceeds the 255 byte frame limit")]
    PayloadTooLong { len: usize },
}

impl Error {
    /// Returns `true` for dial, deadline and I/O failures. The caller retries
    /// on its next scheduled pass.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Io(_) | Self::Timeout { .. } | Self::EmptyResponse
        )
    }

    /// Returns `true` if the controller answered, but not with what the
    /// protocol expects.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::UnexpectedAck { .. })
    }
}

/// Printable ASCII as-is, everything else as `\xNN`.
fn render_bytes(bytes: &[u8]) -> String {
    bytes.escape_ascii().to_string()
}
