// ── Host notifications ──
//
// Discovery results leave the core through a `NotificationSink` injected
// at construction. Sinks must not block: they run on the listening task.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc};

use crate::model::{DiscoveredDevice, MacAddress, Platform, SuggestedConfig};

/// Why a discovery run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CompletionReason {
    Timeout,
    Stopped,
}

/// Where a device was discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryContext {
    pub gateway_mac: MacAddress,
    pub platform: Platform,
}

/// Notification emitted to the host.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    /// A device was seen for the first time in this run.
    DeviceDiscovered {
        device: Arc<DiscoveredDevice>,
        context: DiscoveryContext,
    },
    /// A run ended; emitted exactly once per run.
    DiscoveryCompleted {
        gateway_mac: MacAddress,
        discovered_count: usize,
        discovered_keys: Vec<String>,
        reason: CompletionReason,
    },
    /// A newly discovered device is not configured yet.
    DeviceSuggestion {
        device: Arc<DiscoveredDevice>,
        suggested_config: SuggestedConfig,
    },
}

impl HostEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DeviceDiscovered { .. } => "device_discovered",
            Self::DiscoveryCompleted { .. } => "discovery_completed",
            Self::DeviceSuggestion { .. } => "device_suggestion",
        }
    }
}

/// Receiver of host notifications.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: HostEvent);
}

impl NotificationSink for mpsc::UnboundedSender<HostEvent> {
    fn notify(&self, event: HostEvent) {
        let _ = self.send(event);
    }
}

impl NotificationSink for broadcast::Sender<HostEvent> {
    fn notify(&self, event: HostEvent) {
        // No subscribers is not an error.
        let _ = self.send(event);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn completion_serializes_with_event_tag() {
        let event = HostEvent::DiscoveryCompleted {
            gateway_mac: MacAddress::new("00:03:50:1b:1c:7d").unwrap(),
            discovered_count: 0,
            discovered_keys: Vec::new(),
            reason: CompletionReason::Timeout,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "discovery_completed");
        assert_eq!(json["gateway_mac"], "00:03:50:1b:1c:7d");
        assert_eq!(json["discovered_count"], 0);
        assert_eq!(json["reason"], "timeout");
        assert_eq!(event.name(), "discovery_completed");
    }

    #[test]
    fn channel_sinks_forward_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink: Arc<dyn NotificationSink> = Arc::new(tx);
        sink.notify(HostEvent::DiscoveryCompleted {
            gateway_mac: MacAddress::new("00:03:50:1b:1c:7d").unwrap(),
            discovered_count: 2,
            discovered_keys: vec!["a".into(), "b".into()],
            reason: CompletionReason::Stopped,
        });
        assert!(matches!(
            rx.try_recv().unwrap(),
            HostEvent::DiscoveryCompleted { discovered_count: 2, .. }
        ));

        let (tx, _) = broadcast::channel::<HostEvent>(4);
        tx.notify(HostEvent::DiscoveryCompleted {
            gateway_mac: MacAddress::new("00:03:50:1b:1c:7d").unwrap(),
            discovered_count: 0,
            discovered_keys: Vec::new(),
            reason: CompletionReason::Timeout,
        });
    }
}
