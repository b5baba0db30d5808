// ── Device discovery engine ──
//
// Drives the probe sequence over a command sink, classifies inbound
// messages into device records and reports them to the host. Records
// are written only from the listening task (via `MessageObserver`) and
// cleared only by `start()`.

mod notify;
mod store;

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use arc_swap::ArcSwap;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use myhome_api::{Command, Message};
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::classify::classify;
use crate::config::DiscoveryConfig;
use crate::error::CoreError;
use crate::model::{DiscoveredDevice, MacAddress, SuggestedConfig, device_key};
use crate::session::{GatewaySession, MessageObserver};
use crate::stream::DeviceStream;

use store::DeviceStore;

pub use notify::{CompletionReason, DiscoveryContext, HostEvent, NotificationSink};

/// WHO families probed by a discovery run, in order: lighting,
/// automation, thermoregulation, energy, CEN+/dry contact, auxiliary.
pub const PROBE_WHOS: [&str; 6] = ["1", "2", "4", "18", "25", "9"];

/// Where probes go. A probe succeeds once the gateway acknowledged it.
pub trait CommandSink: Send + Sync + 'static {
    fn submit(&self, command: Command) -> impl Future<Output = Result<(), CoreError>> + Send;
}

impl CommandSink for GatewaySession {
    async fn submit(&self, command: Command) -> Result<(), CoreError> {
        self.execute(&command).await.map(|_| ())
    }
}

/// Lifecycle of a discovery run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DiscoveryState {
    Idle,
    Active,
    Completing,
}

// ── DiscoveryEngine ─────────────────────────────────────────────────

/// Discovery for one gateway. Cheaply cloneable.
pub struct DiscoveryEngine<S: CommandSink> {
    inner: Arc<EngineInner<S>>,
}

impl<S: CommandSink> Clone for DiscoveryEngine<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct EngineInner<S> {
    gateway_mac: MacAddress,
    sink: S,
    notifier: Arc<dyn NotificationSink>,
    config: DiscoveryConfig,
    state: watch::Sender<DiscoveryState>,
    store: DeviceStore,
    /// Unique ids the host already has configured; no suggestion for these.
    configured: ArcSwap<HashSet<String>>,
    /// Cancels the probe worker and deadline of the current run.
    run: Mutex<Option<CancellationToken>>,
    /// Addresses under a single-address lookup, with their lookup count.
    pinpoint: DashMap<String, usize>,
}

impl<S: CommandSink> DiscoveryEngine<S> {
    pub fn new(
        gateway_mac: MacAddress,
        sink: S,
        notifier: Arc<dyn NotificationSink>,
        config: DiscoveryConfig,
    ) -> Self {
        let (state, _) = watch::channel(DiscoveryState::Idle);
        Self {
            inner: Arc::new(EngineInner {
                gateway_mac,
                sink,
                notifier,
                config,
                state,
                store: DeviceStore::new(),
                configured: ArcSwap::from_pointee(HashSet::new()),
                run: Mutex::new(None),
                pinpoint: DashMap::new(),
            }),
        }
    }

    /// Handle to register with [`GatewaySession::add_observer`].
    pub fn observer(&self) -> Weak<dyn MessageObserver> {
        let weak: Weak<EngineInner<S>> = Arc::downgrade(&self.inner);
        weak
    }

    /// Feed one inbound message, as the session's listening task does.
    pub fn handle_message(&self, message: &Arc<Message>) {
        self.inner.on_message(message);
    }

    /// Replace the set of unique ids the host already has configured.
    pub fn set_configured(&self, ids: impl IntoIterator<Item = String>) {
        self.inner.configured.store(Arc::new(ids.into_iter().collect()));
    }

    // ── Runs ─────────────────────────────────────────────────────

    /// Start a discovery run: clear the device map, spawn the probe
    /// worker and arm the deadline.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<(), CoreError> {
        let inner = &self.inner;
        let mut run = inner.run.lock().unwrap_or_else(PoisonError::into_inner);
        if *inner.state.borrow() != DiscoveryState::Idle {
            return Err(CoreError::AlreadyActive);
        }

        inner.store.clear();
        let cancel = CancellationToken::new();
        *run = Some(cancel.clone());
        inner.state.send_replace(DiscoveryState::Active);

        tokio::spawn(probe_worker(Arc::clone(inner), cancel.clone()));
        tokio::spawn(deadline(Arc::clone(inner), cancel));

        info!(
            gateway = %inner.gateway_mac,
            timeout_secs = inner.config.timeout.as_secs(),
            "discovery started"
        );
        Ok(())
    }

    /// End the current run early. A no-op when no run is active.
    ///
    /// Never waits for the probe worker.
    pub fn stop(&self) {
        if !self.inner.complete(CompletionReason::Stopped) {
            debug!(gateway = %self.inner.gateway_mac, "discovery not running");
        }
    }

    /// Probe every supported WHO at one address and return the record
    /// for it, if any. Works with or without an active run.
    pub async fn discover_by_address(
        &self,
        address: &str,
    ) -> Result<Option<Arc<DiscoveredDevice>>, CoreError> {
        Command::status_request(PROBE_WHOS[0], address).encode()?;

        let inner = &self.inner;
        let _pinpoint = PinpointGuard::new(&inner.pinpoint, address);
        for who in PROBE_WHOS {
            inner.probe(Command::status_request(who, address)).await;
            tokio::time::sleep(inner.config.address_probe_interval).await;
        }

        Ok(inner.store.get(&device_key(&inner.gateway_mac, address)))
    }

    // ── Observation ──────────────────────────────────────────────

    pub fn state(&self) -> DiscoveryState {
        *self.inner.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<DiscoveryState> {
        self.inner.state.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.state() == DiscoveryState::Active
    }

    pub fn device(&self, unique_id: &str) -> Option<Arc<DiscoveredDevice>> {
        self.inner.store.get(unique_id)
    }

    /// Devices recorded by the current (or last) run, in discovery order.
    pub fn devices(&self) -> Arc<Vec<Arc<DiscoveredDevice>>> {
        self.inner.store.snapshot()
    }

    pub fn subscribe(&self) -> DeviceStream {
        DeviceStream::new(self.inner.store.subscribe())
    }
}

impl<S: CommandSink> EngineInner<S> {
    async fn probe(&self, command: Command) {
        debug!(gateway = %self.gateway_mac, frame = %command, "sending discovery probe");
        match self.sink.submit(command).await {
            Ok(()) => {}
            Err(CoreError::Rejected { command }) => {
                debug!(%command, "probe rejected, WHO likely not installed");
            }
            Err(CoreError::NoReply { command, .. }) => {
                debug!(%command, "no answer, WHO likely not installed");
            }
            Err(e) => warn!(gateway = %self.gateway_mac, error = %e, "discovery probe failed"),
        }
    }

    /// `Active → Completing → Idle`, emitting the completion exactly once.
    ///
    /// The run lock is released before the host is notified, so a sink
    /// may call back into the engine. Until the final `Idle`, such a
    /// `start` sees `Completing` and gets [`CoreError::AlreadyActive`].
    fn complete(&self, reason: CompletionReason) -> bool {
        let discovered_keys = {
            let mut run = self.run.lock().unwrap_or_else(PoisonError::into_inner);
            if *self.state.borrow() != DiscoveryState::Active {
                return false;
            }
            self.state.send_replace(DiscoveryState::Completing);
            if let Some(cancel) = run.take() {
                cancel.cancel();
            }
            self.store.keys()
        };

        info!(
            gateway = %self.gateway_mac,
            %reason,
            devices = discovered_keys.len(),
            "discovery completed"
        );
        self.notifier.notify(HostEvent::DiscoveryCompleted {
            gateway_mac: self.gateway_mac.clone(),
            discovered_count: discovered_keys.len(),
            discovered_keys,
            reason,
        });
        self.state.send_replace(DiscoveryState::Idle);
        true
    }
}

impl<S: CommandSink> MessageObserver for EngineInner<S> {
    fn on_message(&self, message: &Arc<Message>) {
        let Some(address) = message.address() else {
            return;
        };
        let active = *self.state.borrow() == DiscoveryState::Active;
        if !active && !self.pinpoint.contains_key(address) {
            return;
        }
        let Some(device_type) = classify(message) else {
            return;
        };
        let Some(device) =
            DiscoveredDevice::from_message(&self.gateway_mac, message, device_type, Utc::now())
        else {
            return;
        };
        let Some(device) = self.store.insert_if_absent(device) else {
            return;
        };

        debug!(
            unique_id = %device.unique_id,
            device_type = %device.device_type,
            "device discovered"
        );
        self.notifier.notify(HostEvent::DeviceDiscovered {
            device: Arc::clone(&device),
            context: DiscoveryContext {
                gateway_mac: self.gateway_mac.clone(),
                platform: device.platform,
            },
        });
        if !self.configured.load().contains(&device.unique_id) {
            self.notifier.notify(HostEvent::DeviceSuggestion {
                suggested_config: SuggestedConfig::for_device(&device),
                device,
            });
        }
    }
}

// ── Run tasks ───────────────────────────────────────────────────────

async fn probe_worker<S: CommandSink>(inner: Arc<EngineInner<S>>, cancel: CancellationToken) {
    for (index, who) in PROBE_WHOS.into_iter().enumerate() {
        if index > 0 {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(inner.config.probe_interval) => {}
            }
        }
        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            () = inner.probe(Command::status_request(who, "0")) => {}
        }
    }
    debug!(gateway = %inner.gateway_mac, "all discovery probes sent");
}

async fn deadline<S: CommandSink>(inner: Arc<EngineInner<S>>, cancel: CancellationToken) {
    tokio::select! {
        biased;
        () = cancel.cancelled() => {}
        () = tokio::time::sleep(inner.config.timeout) => {
            inner.complete(CompletionReason::Timeout);
        }
    }
}

/// Marks an address as under lookup for as long as it lives.
struct PinpointGuard<'a> {
    map: &'a DashMap<String, usize>,
    address: String,
}

impl<'a> PinpointGuard<'a> {
    fn new(map: &'a DashMap<String, usize>, address: &str) -> Self {
        *map.entry(address.to_owned()).or_insert(0) += 1;
        Self {
            map,
            address: address.to_owned(),
        }
    }
}

impl Drop for PinpointGuard<'_> {
    fn drop(&mut self) {
        if let Entry::Occupied(mut entry) = self.map.entry(self.address.clone()) {
            *entry.get_mut() -= 1;
            if *entry.get() == 0 {
                entry.remove();
            }
        }
    }
}
