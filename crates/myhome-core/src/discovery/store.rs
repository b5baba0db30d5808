// ── Discovered-device store ──
//
// Concurrent map keyed by unique id with push-based change notification
// via a `watch` snapshot. The snapshot keeps insertion order, which is
// the order devices were classified in.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;

use crate::model::DiscoveredDevice;

pub(crate) struct DeviceStore {
    by_key: DashMap<String, Arc<DiscoveredDevice>>,
    snapshot: watch::Sender<Arc<Vec<Arc<DiscoveredDevice>>>>,
}

impl DeviceStore {
    pub(crate) fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            by_key: DashMap::new(),
            snapshot,
        }
    }

    /// Record a device unless its key is already present (first write wins).
    ///
    /// Returns the stored device when it was new.
    pub(crate) fn insert_if_absent(&self, device: DiscoveredDevice) -> Option<Arc<DiscoveredDevice>> {
        let device = Arc::new(device);
        match self.by_key.entry(device.unique_id.clone()) {
            Entry::Occupied(_) => return None,
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&device));
            }
        }
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| {
            let mut next = Vec::with_capacity(snap.len() + 1);
            next.extend(snap.iter().cloned());
            next.push(Arc::clone(&device));
            *snap = Arc::new(next);
        });
        Some(device)
    }

    pub(crate) fn get(&self, key: &str) -> Option<Arc<DiscoveredDevice>> {
        self.by_key.get(key).map(|r| Arc::clone(r.value()))
    }

    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<DiscoveredDevice>>> {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<DiscoveredDevice>>>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn clear(&self) {
        self.by_key.clear();
        self.snapshot.send_modify(|snap| *snap = Arc::new(Vec::new()));
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }

    /// Keys in classification order.
    pub(crate) fn keys(&self) -> Vec<String> {
        self.snapshot().iter().map(|d| d.unique_id.clone()).collect()
    }
}
