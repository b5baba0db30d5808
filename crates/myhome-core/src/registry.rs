// ── Gateway registry ──
//
// Host-owned map from gateway MAC to gateway. At most one gateway (and
// therefore one session) per MAC.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::error::CoreError;
use crate::gateway::Gateway;
use crate::model::MacAddress;

#[derive(Default)]
pub struct GatewayRegistry {
    gateways: DashMap<MacAddress, Gateway>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a gateway; fails if one with the same MAC exists.
    pub fn register(&self, gateway: Gateway) -> Result<(), CoreError> {
        match self.gateways.entry(gateway.mac().clone()) {
            Entry::Occupied(entry) => Err(CoreError::DuplicateGateway {
                mac: entry.key().to_string(),
            }),
            Entry::Vacant(slot) => {
                debug!(gateway = %slot.key(), "gateway registered");
                slot.insert(gateway);
                Ok(())
            }
        }
    }

    pub fn get(&self, mac: &MacAddress) -> Option<Gateway> {
        self.gateways.get(mac).map(|g| g.value().clone())
    }

    /// The gateway for `mac`, or the only registered gateway when `mac`
    /// is `None`.
    pub fn resolve(&self, mac: Option<&MacAddress>) -> Result<Gateway, CoreError> {
        match mac {
            Some(mac) => self.get(mac).ok_or_else(|| CoreError::GatewayNotFound {
                mac: mac.to_string(),
            }),
            None => {
                let mut all = self.gateways.iter();
                match (all.next(), all.next()) {
                    (Some(only), None) => Ok(only.value().clone()),
                    (None, _) => Err(CoreError::GatewayNotFound {
                        mac: "<any>".into(),
                    }),
                    (Some(_), Some(_)) => Err(CoreError::Config {
                        message: "several gateways are registered; specify a MAC address".into(),
                    }),
                }
            }
        }
    }

    /// Remove a gateway and close it.
    pub async fn remove(&self, mac: &MacAddress) -> Option<Gateway> {
        let (_, gateway) = self.gateways.remove(mac)?;
        gateway.close().await;
        Some(gateway)
    }

    pub fn macs(&self) -> Vec<MacAddress> {
        let mut macs: Vec<_> = self.gateways.iter().map(|g| g.key().clone()).collect();
        macs.sort();
        macs
    }

    pub fn len(&self) -> usize {
        self.gateways.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty()
    }

    /// Close and remove every gateway.
    pub async fn close_all(&self) {
        for mac in self.macs() {
            self.remove(&mac).await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::discovery::HostEvent;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn gateway(mac: &str) -> Gateway {
        let (tx, _rx) = mpsc::unbounded_channel::<HostEvent>();
        let config = GatewayConfig::new("127.0.0.1", MacAddress::new(mac).unwrap());
        Gateway::new(config, Arc::new(tx))
    }

    #[tokio::test]
    async fn one_gateway_per_mac() {
        let registry = GatewayRegistry::new();
        registry.register(gateway("00:03:50:00:00:01")).unwrap();
        let err = registry.register(gateway("00-03-50-00-00-01")).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateGateway { ref mac } if mac == "00:03:50:00:00:01"));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn resolve_by_mac_or_single() {
        let registry = GatewayRegistry::new();
        assert!(matches!(registry.resolve(None), Err(CoreError::GatewayNotFound { .. })));

        registry.register(gateway("00:03:50:00:00:01")).unwrap();
        assert_eq!(registry.resolve(None).unwrap().mac().as_str(), "00:03:50:00:00:01");

        registry.register(gateway("00:03:50:00:00:02")).unwrap();
        assert!(matches!(registry.resolve(None), Err(CoreError::Config { .. })));
        let second = MacAddress::new("00:03:50:00:00:02").unwrap();
        assert_eq!(registry.resolve(Some(&second)).unwrap().mac(), &second);

        registry.close_all().await;
        assert!(registry.is_empty());
    }
}
