//! Config subcommand handlers.

use std::fmt::Write as _;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

const MASK: &str = "****";

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(out, "discovery_timeout = {}", cfg.defaults.discovery_timeout);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "host = \"{}\"", p.host);
        let _ = writeln!(out, "port = {}", p.port);
        let _ = writeln!(out, "mac = \"{}\"", p.mac);
        if p.password.is_some() {
            let _ = writeln!(out, "password = \"{MASK}\"");
        }
        if let Some(ref env) = p.password_env {
            let _ = writeln!(out, "password_env = \"{env}\"");
        }
        if let Some(workers) = p.command_workers {
            let _ = writeln!(out, "command_workers = {workers}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(ms) = p.response_timeout_ms {
            let _ = writeln!(out, "response_timeout_ms = {ms}");
        }
        if let Some(secs) = p.discovery_timeout {
            let _ = writeln!(out, "discovery_timeout = {secs}");
        }
        if let Some(ref path) = p.devices_file {
            let _ = writeln!(out, "devices_file = \"{}\"", path.display());
        }
    }

    out
}

/// Structured form of the config with every password replaced.
fn redacted_value(cfg: &Config) -> Result<serde_json::Value, CliError> {
    let mut value = serde_json::to_value(cfg)?;
    if let Some(profiles) = value
        .get_mut("profiles")
        .and_then(serde_json::Value::as_object_mut)
    {
        for profile in profiles.values_mut() {
            if let Some(password) = profile.get_mut("password").filter(|p| !p.is_null()) {
                *password = serde_json::Value::from(MASK);
            }
        }
    }
    Ok(value)
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config_or_default();

    match args.command {
        ConfigCommand::Show => {
            let out = match global.output {
                OutputFormat::Table | OutputFormat::Plain => format_config_redacted(&cfg),
                _ => {
                    let value = redacted_value(&cfg)?;
                    output::render_single(&global.output, &value, ToString::to_string, |_| {
                        String::new()
                    })?
                }
            };
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            let profile_name = config::active_profile_name(global, &cfg);
            let devices = cfg
                .profiles
                .get(&profile_name)
                .map_or_else(config::default_devices_path, config::Profile::devices_path);
            output::print_output(
                &format!(
                    "{}\n{}",
                    config::config_path().display(),
                    devices.display()
                ),
                global.quiet,
            );
            Ok(())
        }

        ConfigCommand::SetPassword => {
            let profile_name = config::active_profile_name(global, &cfg);
            if !cfg.profiles.contains_key(&profile_name) {
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

            let password = rpassword::prompt_password(format!("Password for {profile_name}: "))?;
            if password.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "cannot be empty".into(),
                });
            }

            myhome_config::store_password(&profile_name, &password)?;
            if !global.quiet {
                eprintln!("Password for profile '{profile_name}' stored in the system keyring");
            }
            Ok(())
        }
    }
}
