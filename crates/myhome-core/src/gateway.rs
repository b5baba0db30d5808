// ── Gateway facade ──
//
// Binds one session and one discovery engine to a gateway and exposes
// the operations a host issues against it.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use myhome_api::command::gateway_dimension;
use myhome_api::{Command, GatewayMessage, Message};
use tracing::info;

use crate::config::GatewayConfig;
use crate::discovery::{DiscoveryEngine, NotificationSink};
use crate::error::CoreError;
use crate::model::{DiscoveredDevice, GatewayInfo, MacAddress};
use crate::session::{GatewaySession, SessionState};

/// One gateway: its session plus its discovery engine.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    session: GatewaySession,
    discovery: DiscoveryEngine<GatewaySession>,
}

impl Gateway {
    /// Create the gateway. Does NOT connect: call [`connect()`](Self::connect).
    pub fn new(config: GatewayConfig, notifier: Arc<dyn NotificationSink>) -> Self {
        let mac = config.mac.clone();
        let discovery_config = config.discovery.clone();
        let session = GatewaySession::new(config);
        let discovery = DiscoveryEngine::new(mac, session.clone(), notifier, discovery_config);
        session.add_observer(discovery.observer());

        Self {
            inner: Arc::new(GatewayInner { session, discovery }),
        }
    }

    pub fn mac(&self) -> &MacAddress {
        self.inner.session.mac()
    }

    pub fn session(&self) -> &GatewaySession {
        &self.inner.session
    }

    pub fn discovery(&self) -> &DiscoveryEngine<GatewaySession> {
        &self.inner.discovery
    }

    pub fn state(&self) -> SessionState {
        self.inner.session.state()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    pub async fn connect(&self) -> Result<(), CoreError> {
        self.inner.session.connect().await
    }

    /// Stop any discovery run, then close the session.
    pub async fn close(&self) {
        self.inner.discovery.stop();
        self.inner.session.close().await;
    }

    /// Connect, run `f`, close.
    pub async fn oneshot<F, Fut, T>(
        config: GatewayConfig,
        notifier: Arc<dyn NotificationSink>,
        f: F,
    ) -> Result<T, CoreError>
    where
        F: FnOnce(Gateway) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let gateway = Gateway::new(config, notifier);
        gateway.connect().await?;
        let result = f(gateway.clone()).await;
        gateway.close().await;
        result
    }

    // ── Host operations ──────────────────────────────────────────

    /// Parse a raw command frame and queue it.
    pub async fn send(&self, command_text: &str) -> Result<(), CoreError> {
        let command = Command::parse(command_text.trim())?;
        self.inner.session.send(&command).await
    }

    /// Parse a raw command frame, send it and wait for the gateway's answer.
    pub async fn execute(&self, command_text: &str) -> Result<Vec<Arc<Message>>, CoreError> {
        let command = Command::parse(command_text.trim())?;
        self.inner.session.execute(&command).await
    }

    pub fn start_discovery(&self) -> Result<(), CoreError> {
        self.ensure_ready()?;
        self.inner.discovery.start()
    }

    pub fn stop_discovery(&self) {
        self.inner.discovery.stop();
    }

    pub async fn discover_by_address(
        &self,
        address: &str,
    ) -> Result<Option<Arc<DiscoveredDevice>>, CoreError> {
        self.ensure_ready()?;
        self.inner.discovery.discover_by_address(address).await
    }

    /// Set the gateway clock to the current time in `offset`.
    ///
    /// Returns the timestamp that was sent.
    pub async fn sync_time(&self, offset: FixedOffset) -> Result<DateTime<FixedOffset>, CoreError> {
        let now = Utc::now().with_timezone(&offset);
        self.inner
            .session
            .execute(&Command::set_datetime(&now))
            .await?;
        info!(gateway = %self.mac(), time = %now.to_rfc3339(), "gateway clock synchronized");
        Ok(now)
    }

    /// Read model, firmware and MAC address back from the gateway.
    pub async fn gateway_info(&self) -> Result<GatewayInfo, CoreError> {
        let mut info = GatewayInfo::default();
        for dimension in [
            gateway_dimension::MODEL,
            gateway_dimension::FIRMWARE,
            gateway_dimension::MAC_ADDRESS,
        ] {
            let responses = self
                .inner
                .session
                .execute(&Command::gateway_query(dimension))
                .await?;
            for response in &responses {
                if let Message::Gateway(GatewayMessage::Dimension { dimension, values }) =
                    response.as_ref()
                {
                    info.apply(dimension, values);
                }
            }
        }
        Ok(info)
    }

    fn ensure_ready(&self) -> Result<(), CoreError> {
        match self.state() {
            SessionState::Ready => Ok(()),
            state => Err(CoreError::NotReady { state }),
        }
    }
}
