//! Gateway sessions and device discovery for MyHOME (OpenWebNet) gateways.
//!
//! This crate sits between the wire layer (`myhome-api`) and hosts (the
//! `myhome` CLI or any embedding application):
//!
//! - **[`GatewaySession`]**: owns the event connection and one command
//!   connection per sending worker. A listening task decodes every inbound
//!   frame and feeds it to observers and the drop-oldest [`InboundQueue`];
//!   sending workers drain one shared outbound queue and wait for the
//!   gateway's ACK/NACK.
//!
//! - **[`DiscoveryEngine`]**: probes every supported WHO, classifies the
//!   answers into [`DiscoveredDevice`] records (first write wins per
//!   `(mac, where)`) and reports them through a [`NotificationSink`].
//!
//! - **[`classify()`]** and the [`model`]: the fixed device-type taxonomy
//!   with its platform and category tables.
//!
//! - **[`Gateway`]** / **[`GatewayRegistry`]**: the host-facing facade and
//!   the one-gateway-per-MAC registry.

pub mod classify;
pub mod config;
pub mod discovery;
pub mod error;
pub mod gateway;
pub mod model;
pub mod registry;
pub mod session;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use classify::classify;
pub use config::{DiscoveryConfig, GatewayConfig};
pub use discovery::{
    CommandSink, CompletionReason, DiscoveryContext, DiscoveryEngine, DiscoveryState, HostEvent,
    NotificationSink, PROBE_WHOS,
};
pub use error::CoreError;
pub use gateway::Gateway;
pub use registry::GatewayRegistry;
pub use session::{AuthState, GatewaySession, InboundQueue, MessageObserver, SessionState};
pub use stream::DeviceStream;

pub use model::{
    Category, DeviceType, DiscoveredDevice, GatewayInfo, MacAddress, Platform, SuggestedConfig,
};

// The wire types hosts need alongside the session.
pub use myhome_api::{Command, Message};
