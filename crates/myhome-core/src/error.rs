// ── Core error types ──
//
// User-facing errors from myhome-core. Consumers never see raw socket
// errors or frame parser internals directly: the `From<myhome_api::Error>`
// impl translates wire-level failures into session-level variants.

use thiserror::Error;

use crate::session::SessionState;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to gateway at {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Gateway did not answer within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Gateway requires a password but none is configured")]
    PasswordRequired,

    #[error("Gateway rejected the password")]
    PasswordError,

    #[error("Handshake failed: {message}")]
    HandshakeFailed { message: String },

    #[error("Transport failure: {reason}")]
    TransportFailure { reason: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Session is not ready (state: {state})")]
    NotReady { state: SessionState },

    #[error("Discovery is already running")]
    AlreadyActive,

    #[error("Gateway rejected `{command}`")]
    Rejected { command: String },

    #[error("Gateway did not answer `{command}` within {timeout_ms}ms")]
    NoReply { command: String, timeout_ms: u64 },

    #[error("Invalid command: {message}")]
    InvalidCommand { message: String },

    // ── Registry errors ──────────────────────────────────────────────
    #[error("A gateway with MAC {mac} is already registered")]
    DuplicateGateway { mac: String },

    #[error("No gateway registered with MAC {mac}")]
    GatewayNotFound { mac: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Returns `true` if the host should ask for new credentials.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::PasswordRequired | Self::PasswordError)
    }

    /// Returns `true` for errors that ended the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::TransportFailure { .. })
    }
}

// ── Conversion from wire-level errors ────────────────────────────────

impl From<myhome_api::Error> for CoreError {
    fn from(err: myhome_api::Error) -> Self {
        use myhome_api::Error as E;
        match err {
            E::MalformedFrame { frame, reason } => CoreError::InvalidCommand {
                message: format!("`{frame}`: {reason}"),
            },
            E::UnencodableCommand { reason } => CoreError::InvalidCommand { message: reason },
            E::Unreachable { address, source } => CoreError::ConnectionFailed {
                address,
                reason: source.to_string(),
            },
            E::Timeout { timeout_ms } => CoreError::Timeout { timeout_ms },
            E::PasswordRequired => CoreError::PasswordRequired,
            E::PasswordError => CoreError::PasswordError,
            E::Handshake { message } => CoreError::HandshakeFailed { message },
            E::Io(e) => CoreError::TransportFailure {
                reason: e.to_string(),
            },
            E::ConnectionClosed => CoreError::TransportFailure {
                reason: "connection closed by gateway".into(),
            },
        }
    }
}
