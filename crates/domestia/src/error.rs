//! CLI error types with miette diagnostics.
//!
//! Maps configuration and core errors into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use domestia_config::ConfigError;
use domestia_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const CONFIG: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file not found")]
    #[diagnostic(
        code(domestia::no_config),
        help(
            "Create a domestia.json or pass --config <path>.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Invalid configuration value for {field}: {reason}")]
    #[diagnostic(code(domestia::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(
        code(domestia::config),
        help("Check the configuration file syntax and DOMESTIA_* environment overrides.")
    )]
    Config(ConfigError),

    // ── Controller ───────────────────────────────────────────────────
    #[error("Could not reach the lighting controller")]
    #[diagnostic(
        code(domestia::connection_failed),
        help(
            "Check that the controller is powered and that ip_address points at it.\n\
             {reason}"
        )
    )]
    ConnectionFailed { reason: String },

    #[error("Controller did not answer within {timeout_ms}ms")]
    #[diagnostic(
        code(domestia::timeout),
        help("The controller may be busy or unreachable. Try again.")
    )]
    Timeout { timeout_ms: u64 },

    #[error("Controller protocol error: {message}")]
    #[diagnostic(code(domestia::protocol))]
    Protocol { message: String },

    #[error("No light configured on relay {relay}")]
    #[diagnostic(code(domestia::not_found))]
    LightNotFound { relay: u8 },

    // ── Internal / IO ────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    #[diagnostic(code(domestia::internal))]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(domestia::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoConfig { .. } | Self::Validation { .. } | Self::Config(_) => exit_code::CONFIG,
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::LightNotFound { .. } => exit_code::NOT_FOUND,
            Self::Protocol { .. } | Self::Internal(_) | Self::Io(_) | Self::Json(_) => {
                exit_code::GENERAL
            }
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound { path } => Self::NoConfig {
                path: path.display().to_string(),
            },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { reason } => Self::ConnectionFailed { reason },
            CoreError::Timeout { timeout_ms } => Self::Timeout { timeout_ms },
            CoreError::Protocol { message } => Self::Protocol { message },
            CoreError::LightNotFound { relay } => Self::LightNotFound { relay },
            CoreError::Stopped => Self::Internal("bridge is not running".into()),
            CoreError::Internal(message) => Self::Internal(message),
        }
    }
}
