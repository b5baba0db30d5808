use thiserror::Error;

/// Top-level error type for the `myhome-api` crate.
///
/// Covers every failure mode of the wire layer: frame parsing and
/// encoding, connection establishment, the authentication handshake,
/// and the byte transport. `myhome-core` maps these into session-level
/// errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Frames ──────────────────────────────────────────────────────
    /// A single frame failed to parse.
    #[error("Malformed frame `{frame}`: {reason}")]
    MalformedFrame { frame: String, reason: &'static str },

    /// A command could not be turned into a wire frame.
    #[error("Cannot encode command: {reason}")]
    UnencodableCommand { reason: String },

    // ── Connection ──────────────────────────────────────────────────
    /// TCP connect failed (refused, no route, DNS failure, etc.)
    #[error("Gateway {address} unreachable: {source}")]
    Unreachable {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Connect or handshake did not finish in time.
    #[error("Timed out after {timeout_ms}ms waiting for the gateway")]
    Timeout { timeout_ms: u64 },

    // ── Authentication ──────────────────────────────────────────────
    /// The gateway asked for a password but none is configured.
    #[error("Gateway requires a password")]
    PasswordRequired,

    /// The gateway rejected the supplied password.
    #[error("Gateway rejected the password")]
    PasswordError,

    /// The gateway deviated from the expected handshake sequence.
    #[error("Handshake failed: {message}")]
    Handshake { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// Socket I/O failed after the connection was established.
    #[error("Transport error: {0}")]
    Io(#[from] std::io::Error),

    /// The gateway closed the connection.
    #[error("Connection closed by gateway")]
    ConnectionClosed,
}

impl Error {
    /// Returns `true` for per-frame errors that leave the connection usable.
    pub fn is_frame_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedFrame { .. } | Self::UnencodableCommand { .. }
        )
    }

    /// Returns `true` if the host should prompt for (new) credentials.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::PasswordRequired | Self::PasswordError)
    }

    /// Returns `true` if a reconnect attempt might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unreachable { .. } | Self::Timeout { .. } | Self::Io(_) | Self::ConnectionClosed
        )
    }

    pub(crate) fn malformed(frame: &str, reason: &'static str) -> Self {
        Self::MalformedFrame {
            frame: frame.to_owned(),
            reason,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
