// ── Core error types ──
//
// Domain errors from domestia-core. Consumers never see raw socket errors;
// the `From<domestia_api::Error>` impl folds transport failures into the
// connection/protocol split the reconciliation loop cares about.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Controller errors ────────────────────────────────────────────
    #[error("Cannot reach controller: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Controller exchange timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Controller protocol error: {message}")]
    Protocol { message: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("No light configured on relay {relay}")]
    LightNotFound { relay: u8 },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Bridge is not running")]
    Stopped,

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Connection and protocol failures are retried on the next tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::Timeout { .. } | Self::Protocol { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<domestia_api::Error> for CoreError {
    fn from(err: domestia_api::Error) -> Self {
        match err {
            domestia_api::Error::Timeout { timeout_ms } => CoreError::Timeout { timeout_ms },
            domestia_api::Error::Connect { .. }
            | domestia_api::Error::Io(_)
            | domestia_api::Error::EmptyResponse => CoreError::ConnectionFailed {
                reason: err.to_string(),
            },
            domestia_api::Error::UnexpectedAck { .. } => CoreError::Protocol {
                message: err.to_string(),
            },
            domestia_api::Error::PayloadTooLong { .. } => CoreError::Internal(err.to_string()),
        }
    }
}
