//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use myhome_config::ConfigError;
use myhome_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to gateway at {address}")]
    #[diagnostic(
        code(myhome::connection_failed),
        help(
            "Check that the gateway is powered and reachable.\n\
             Reason: {reason}\n\
             OpenWebNet listens on port 20000 unless configured otherwise."
        )
    )]
    ConnectionFailed { address: String, reason: String },

    #[error("Gateway connection lost: {reason}")]
    #[diagnostic(code(myhome::transport))]
    Transport { reason: String },

    #[error("Session is not ready ({state})")]
    #[diagnostic(code(myhome::not_ready), help("Reconnect and try again."))]
    NotReady { state: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Gateway requires a password")]
    #[diagnostic(
        code(myhome::password_required),
        help(
            "Pass --password, or store one with: myhome config set-password --profile {profile}"
        )
    )]
    PasswordRequired { profile: String },

    #[error("Gateway rejected the password")]
    #[diagnostic(
        code(myhome::auth_failed),
        help("Update it with: myhome config set-password --profile {profile}")
    )]
    AuthFailed { profile: String },

    #[error("Handshake failed: {message}")]
    #[diagnostic(code(myhome::handshake))]
    Handshake { message: String },

    // ── Gateway replies ──────────────────────────────────────────────
    #[error("Gateway rejected `{command}`")]
    #[diagnostic(
        code(myhome::rejected),
        help("The gateway answered NACK: the address or value is not valid on this bus.")
    )]
    Rejected { command: String },

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(code(myhome::not_found), help("{hint}"))]
    NotFound {
        resource_type: String,
        identifier: String,
        hint: String,
    },

    #[error("{what} is already running")]
    #[diagnostic(code(myhome::conflict))]
    Conflict { what: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(myhome::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(myhome::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No gateway configured")]
    #[diagnostic(
        code(myhome::no_config),
        help(
            "Pass --host and --mac, or add a profile to {path}:\n\n\
             [profiles.default]\n\
             host = \"192.168.1.35\"\n\
             mac = \"00:03:50:1b:1c:7d\""
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(myhome::config))]
    Config(#[from] ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Gateway did not answer within {millis}ms")]
    #[diagnostic(
        code(myhome::timeout),
        help("Increase the timeout with --timeout or check the gateway's load.")
    )]
    Timeout { millis: u64 },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON output failed: {0}")]
    #[diagnostic(code(myhome::json))]
    Json(#[from] serde_json::Error),

    #[error("YAML output failed: {0}")]
    #[diagnostic(code(myhome::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Transport { .. } | Self::NotReady { .. } => {
                exit_code::CONNECTION
            }
            Self::PasswordRequired { .. } | Self::AuthFailed { .. } | Self::Handshake { .. } => {
                exit_code::AUTH
            }
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the active profile name to authentication errors.
    pub fn for_profile(self, profile_name: &str) -> Self {
        match self {
            Self::PasswordRequired { .. } => Self::PasswordRequired {
                profile: profile_name.into(),
            },
            Self::AuthFailed { .. } => Self::AuthFailed {
                profile: profile_name.into(),
            },
            other => other,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { address, reason } => {
                CliError::ConnectionFailed { address, reason }
            }
            CoreError::Timeout { timeout_ms } => CliError::Timeout { millis: timeout_ms },
            CoreError::PasswordRequired => CliError::PasswordRequired {
                profile: "default".into(),
            },
            CoreError::PasswordError => CliError::AuthFailed {
                profile: "default".into(),
            },
            CoreError::HandshakeFailed { message } => CliError::Handshake { message },
            CoreError::TransportFailure { reason } => CliError::Transport { reason },
            CoreError::NotReady { state } => CliError::NotReady {
                state: state.to_string(),
            },
            CoreError::AlreadyActive => CliError::Conflict {
                what: "Discovery".into(),
            },
            CoreError::Rejected { command } => CliError::Rejected { command },
            CoreError::NoReply { timeout_ms, .. } => CliError::Timeout { millis: timeout_ms },
            CoreError::InvalidCommand { message } => CliError::Validation {
                field: "frame".into(),
                reason: message,
            },
            CoreError::DuplicateGateway { mac } => CliError::Conflict {
                what: format!("Gateway {mac}"),
            },
            CoreError::GatewayNotFound { mac } => CliError::NotFound {
                resource_type: "gateway".into(),
                identifier: mac,
                hint: "Check --mac or the profile's mac field.".into(),
            },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use myhome_core::SessionState;

    #[test]
    fn exit_codes_follow_error_class() {
        let connect: CliError = CoreError::ConnectionFailed {
            address: "192.168.1.35:20000".into(),
            reason: "refused".into(),
        }
        .into();
        assert_eq!(connect.exit_code(), exit_code::CONNECTION);

        let auth: CliError = CoreError::PasswordRequired.into();
        assert_eq!(auth.exit_code(), exit_code::AUTH);

        let frame: CliError = CoreError::InvalidCommand {
            message: "bad".into(),
        }
        .into();
        assert_eq!(frame.exit_code(), exit_code::USAGE);

        let idle: CliError = CoreError::NotReady {
            state: SessionState::Disconnected,
        }
        .into();
        assert_eq!(idle.exit_code(), exit_code::CONNECTION);

        let silent: CliError = CoreError::NoReply {
            command: "*#13**15##".into(),
            timeout_ms: 500,
        }
        .into();
        assert_eq!(silent.exit_code(), exit_code::TIMEOUT);
    }

    #[test]
    fn profile_name_is_attached_to_auth_errors() {
        let err = CliError::from(CoreError::PasswordError).for_profile("home");
        assert!(matches!(err, CliError::AuthFailed { ref profile } if profile == "home"));
    }
}
