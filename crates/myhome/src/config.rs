//! CLI configuration: thin wrapper around `myhome_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--host, --mac, --password, ...).

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use myhome_core::{GatewayConfig, MacAddress};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use myhome_config::{
    Config, Defaults, Profile, config_path, default_devices_path, load_config_or_default,
};

/// Everything a gateway-bound command needs to know about its target.
pub struct Target {
    pub profile_name: String,
    pub gateway: GatewayConfig,
    pub devices_path: PathBuf,
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build the gateway target from the config file, profile, and CLI overrides.
///
/// CLI flags take priority over profile values. Without a profile,
/// `--host` and `--mac` are enough.
pub fn resolve_target(global: &GlobalOpts) -> Result<Target, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let (mut gateway, devices_path) = if let Some(profile) = cfg.profiles.get(&profile_name) {
        let mut profile = profile.clone();
        if let Some(ref host) = global.host {
            profile.host.clone_from(host);
        }
        if let Some(ref mac) = global.mac {
            profile.mac.clone_from(mac);
        }
        let gateway = myhome_config::profile_to_gateway_config(&profile, &profile_name, &cfg.defaults)?;
        (gateway, profile.devices_path())
    } else {
        if global.profile.is_some() {
            let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
            available.sort();
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            });
        }
        let (Some(host), Some(mac)) = (global.host.as_deref(), global.mac.as_deref()) else {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        };
        let mac = MacAddress::new(mac).map_err(|e| CliError::Validation {
            field: "mac".into(),
            reason: e.to_string(),
        })?;
        let mut gateway = GatewayConfig::new(host, mac);
        gateway.connect_timeout = Duration::from_secs(cfg.defaults.timeout);
        gateway.discovery.timeout = Duration::from_secs(cfg.defaults.discovery_timeout);
        (gateway, default_devices_path())
    };

    if let Some(port) = global.port {
        gateway.port = port;
    }
    if let Some(ref password) = global.password {
        gateway.password = Some(SecretString::from(password.clone()));
    }
    if let Some(timeout) = global.timeout {
        gateway.connect_timeout = Duration::from_secs(timeout);
    }

    Ok(Target {
        profile_name,
        gateway,
        devices_path,
    })
}
