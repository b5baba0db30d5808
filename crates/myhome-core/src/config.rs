// ── Runtime gateway configuration ──
//
// These types describe *how* to reach and drive one gateway. They carry
// the password and tuning knobs but never touch disk: myhome-config
// builds a `GatewayConfig` and hands it in.

use std::time::Duration;

use myhome_api::ConnectOptions;
use myhome_api::connection::DEFAULT_PORT;
use secrecy::SecretString;

use crate::model::MacAddress;

/// Configuration for connecting to a single gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Identity of the gateway; anchors every discovered device key.
    pub mac: MacAddress,
    pub password: Option<SecretString>,
    /// Bound for TCP connect and for each handshake.
    pub connect_timeout: Duration,
    /// How long a sending worker waits for the gateway's ACK/NACK.
    pub response_timeout: Duration,
    /// Number of command connections, each drained by its own worker.
    pub command_workers: usize,
    /// Inbound queue bound; the oldest message is dropped when full.
    pub inbound_capacity: usize,
    /// Outbound queue bound; `send` waits for room when full.
    pub outbound_capacity: usize,
    pub discovery: DiscoveryConfig,
}

impl GatewayConfig {
    pub fn new(host: impl Into<String>, mac: MacAddress) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            mac,
            password: None,
            connect_timeout: Duration::from_secs(10),
            response_timeout: Duration::from_secs(5),
            command_workers: 1,
            inbound_capacity: 1024,
            outbound_capacity: 64,
            discovery: DiscoveryConfig::default(),
        }
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            host: self.host.clone(),
            port: self.port,
            password: self.password.clone(),
            connect_timeout: self.connect_timeout,
        }
    }
}

/// Timing of discovery runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// A run completes on its own after this long.
    pub timeout: Duration,
    /// Delay between the per-WHO probes of a full run.
    pub probe_interval: Duration,
    /// Delay between the per-WHO probes of a single-address lookup.
    pub address_probe_interval: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            probe_interval: Duration::from_millis(500),
            address_probe_interval: Duration::from_millis(200),
        }
    }
}
