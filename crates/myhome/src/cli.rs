//! Clap derive structures for the `myhome` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::time::Duration;

use chrono::FixedOffset;
use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// myhome -- talk to a MyHOME (OpenWebNet) gateway
#[derive(Debug, Parser)]
#[command(
    name = "myhome",
    version,
    about = "Drive BTicino/Legrand MyHOME gateways from the command line",
    long_about = "Connects to a MyHOME gateway over OpenWebNet, listens to bus events,\n\
        sends raw frames and discovers the devices behind the gateway.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Gateway profile to use
    #[arg(long, short = 'p', env = "MYHOME_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Gateway host (overrides profile)
    #[arg(long, short = 'H', env = "MYHOME_HOST", global = true)]
    pub host: Option<String>,

    /// Gateway TCP port (overrides profile)
    #[arg(long, env = "MYHOME_PORT", global = true)]
    pub port: Option<u16>,

    /// Gateway MAC address (overrides profile)
    #[arg(long, short = 'm', env = "MYHOME_MAC", global = true)]
    pub mac: Option<String>,

    /// OPEN / HMAC password
    #[arg(long, env = "MYHOME_PASSWORD", global = true, hide_env = true)]
    pub password: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "MYHOME_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Connect timeout in seconds (overrides profile)
    #[arg(long, env = "MYHOME_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print bus events as they arrive
    #[command(alias = "l")]
    Listen(ListenArgs),

    /// Send raw OpenWebNet frames
    Send(SendArgs),

    /// Run a discovery and list the devices found
    #[command(alias = "d")]
    Discover(DiscoverArgs),

    /// Probe a single bus address
    Probe(ProbeArgs),

    /// Set the gateway clock
    SyncTime(SyncTimeArgs),

    /// Show gateway model, firmware and MAC address
    Info,

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Command arguments ────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ListenArgs {
    /// Stop after this long (e.g. "30s", "5m")
    #[arg(long, short = 'd', value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,

    /// Stop after this many events
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Frames to send, in order (e.g. "*1*1*21##")
    #[arg(required = true)]
    pub frames: Vec<String>,
}

#[derive(Debug, Args)]
pub struct DiscoverArgs {
    /// How long the run lasts (e.g. "30s"); defaults to the profile's value
    #[arg(long, short = 'd', value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,

    /// Add suggestions for unconfigured devices to the device document
    #[arg(long)]
    pub save: bool,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Bus address (WHERE) to probe
    #[arg(value_name = "WHERE")]
    pub address: String,
}

#[derive(Debug, Args)]
pub struct SyncTimeArgs {
    /// UTC offset to send, e.g. "+01:00"; defaults to the local offset
    #[arg(long, value_parser = parse_offset, allow_hyphen_values = true)]
    pub offset: Option<FixedOffset>,
}

fn parse_offset(raw: &str) -> Result<FixedOffset, String> {
    raw.parse()
        .map_err(|e| format!("expected an offset like +01:00 ({e})"))
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration (passwords masked)
    Show,

    /// Print the config and device document paths
    Path,

    /// Store the active profile's password in the system keyring
    SetPassword,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
