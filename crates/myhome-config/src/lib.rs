//! Shared configuration for MyHOME tools.
//!
//! TOML profiles (one per gateway), password resolution (env + keyring +
//! plaintext), translation to `myhome_core::GatewayConfig`, and the YAML
//! device document in [`devices`].

pub mod devices;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use myhome_api::connection::DEFAULT_PORT;
use myhome_core::{DiscoveryConfig, GatewayConfig, MacAddress};

/// Keyring service name for stored gateway passwords.
const KEYRING_SERVICE: &str = "myhome";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("device document error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named gateway profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// The profile called `name`, or the default profile when `name` is `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default")
            .to_owned();
        let profile = self
            .profiles
            .get(&name)
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.clone(),
            })?;
        Ok((name, profile))
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Connect timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Discovery run length in seconds.
    #[serde(default = "default_discovery_timeout")]
    pub discovery_timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            discovery_timeout: default_discovery_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    10
}
fn default_discovery_timeout() -> u64 {
    60
}

/// A named gateway profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Gateway host name or IP address.
    pub host: String,

    /// Gateway TCP port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Gateway MAC address.
    pub mac: String,

    /// OPEN / HMAC password (plaintext; prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Number of command connections.
    pub command_workers: Option<usize>,

    /// Override connect timeout (seconds).
    pub timeout: Option<u64>,

    /// ACK/NACK wait per command (milliseconds).
    pub response_timeout_ms: Option<u64>,

    /// Override discovery run length (seconds).
    pub discovery_timeout: Option<u64>,

    /// Path of the YAML device document.
    pub devices_file: Option<PathBuf>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "myhome", "myhome")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default location of the device document.
pub fn default_devices_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("devices.yaml"),
        |dirs| dirs.config_dir().join("devices.yaml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("myhome");
    p
}

impl Profile {
    /// Device document for this profile.
    pub fn devices_path(&self) -> PathBuf {
        self.devices_file.clone().unwrap_or_else(default_devices_path)
    }
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment.
///
/// `MYHOME_DEFAULTS__OUTPUT=json` overrides `defaults.output`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("MYHOME_").split("__"));

    let config: Config = figment.extract()?;
    debug!(path = %path.display(), profiles = config.profiles.len(), "config loaded");
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))
}

/// Resolve the gateway password from the credential chain.
///
/// Gateways without a password are common, so an empty chain is `None`
/// rather than an error.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    // 1. Profile's password_env → env var lookup
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring_entry(profile_name) {
        if let Ok(secret) = entry.get_password() {
            return Some(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    profile.password.clone().map(SecretString::from)
}

/// Store a profile's password in the system keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(password)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `GatewayConfig` from a profile, with `defaults` filling the
/// timeouts the profile leaves unset.
pub fn profile_to_gateway_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<GatewayConfig, ConfigError> {
    if profile.host.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: "must not be empty".into(),
        });
    }
    let mac = MacAddress::new(&profile.mac).map_err(|e| ConfigError::Validation {
        field: "mac".into(),
        reason: e.to_string(),
    })?;

    let mut config = GatewayConfig::new(profile.host.trim(), mac);
    config.port = profile.port;
    config.password = resolve_password(profile, profile_name);
    config.connect_timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    if let Some(ms) = profile.response_timeout_ms {
        config.response_timeout = Duration::from_millis(ms);
    }
    if let Some(workers) = profile.command_workers {
        if workers == 0 {
            return Err(ConfigError::Validation {
                field: "command_workers".into(),
                reason: "at least one worker is required".into(),
            });
        }
        config.command_workers = workers;
    }
    config.discovery = DiscoveryConfig {
        timeout: Duration::from_secs(
            profile
                .discovery_timeout
                .unwrap_or(defaults.discovery_timeout),
        ),
        ..DiscoveryConfig::default()
    };
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn profile() -> Profile {
        Profile {
            host: "192.168.1.35".into(),
            port: 20000,
            mac: "00-03-50-1B-1C-7D".into(),
            ..Profile::default()
        }
    }

    #[test]
    fn loads_profiles_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_profile = "home"

[defaults]
output = "json"

[profiles.home]
host = "192.168.1.35"
mac = "00:03:50:1b:1c:7d"
command_workers = 2
"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.defaults.output, "json");
        assert_eq!(config.defaults.timeout, 10);

        let (name, home) = config.profile(None).unwrap();
        assert_eq!(name, "home");
        assert_eq!(home.port, DEFAULT_PORT);
        assert_eq!(home.command_workers, Some(2));
        assert!(matches!(
            config.profile(Some("office")),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.default_profile.as_deref(), Some("default"));
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.profiles.insert("default".into(), profile());
        save_config_to(&config, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.profiles["default"].host, "192.168.1.35");
    }

    #[test]
    fn profile_translates_to_gateway_config() {
        let mut p = profile();
        p.password = Some("12345".into());
        p.response_timeout_ms = Some(750);
        let config = profile_to_gateway_config(&p, "unit-test-profile", &Defaults::default()).unwrap();

        assert_eq!(config.mac.as_str(), "00:03:50:1b:1c:7d");
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.response_timeout, Duration::from_millis(750));
        assert_eq!(config.discovery.timeout, Duration::from_secs(60));
        assert!(config.password.is_some());
    }

    #[test]
    fn rejects_bad_mac_and_zero_workers() {
        let mut p = profile();
        p.mac = "not-a-mac".into();
        let err = profile_to_gateway_config(&p, "x", &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "mac"));

        let mut p = profile();
        p.command_workers = Some(0);
        let err = profile_to_gateway_config(&p, "x", &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "command_workers"));
    }

    #[test]
    fn password_env_wins_over_plaintext() {
        let mut p = profile();
        p.password = Some("plain".into());
        p.password_env = Some("MYHOME_TEST_PASSWORD_UNSET_VARIABLE".into());
        // Unset variable falls through to plaintext.
        let secret = resolve_password(&p, "unit-test-profile").unwrap();
        assert_eq!(secrecy::ExposeSecret::expose_secret(&secret), "plain");
    }
}
