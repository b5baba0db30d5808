// ── Discovered-device subscriptions ──
//
// Hosts that render discovery progress follow the device map through a
// `DeviceStream` instead of polling `DiscoveryEngine::devices()`.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::DiscoveredDevice;

type Snapshot = Arc<Vec<Arc<DiscoveredDevice>>>;

/// Follows the discovered-device map of one engine.
pub struct DeviceStream {
    seen: Snapshot,
    receiver: watch::Receiver<Snapshot>,
}

impl DeviceStream {
    pub(crate) fn new(receiver: watch::Receiver<Snapshot>) -> Self {
        let seen = Arc::clone(&receiver.borrow());
        Self { seen, receiver }
    }

    /// Devices as of the last [`next_change`](Self::next_change), or as of
    /// subscription time.
    pub fn devices(&self) -> &Snapshot {
        &self.seen
    }

    /// Look a device up by its `"{mac}-{where}"` key in the last snapshot.
    pub fn device(&self, unique_id: &str) -> Option<&Arc<DiscoveredDevice>> {
        self.seen.iter().find(|d| d.unique_id == unique_id)
    }

    /// Wait until the map changes. `None` once the engine is gone.
    pub async fn next_change(&mut self) -> Option<Snapshot> {
        self.receiver.changed().await.ok()?;
        self.seen = Arc::clone(&self.receiver.borrow_and_update());
        Some(Arc::clone(&self.seen))
    }

    /// Wait until at least `count` devices are known.
    pub async fn wait_for_count(&mut self, count: usize) -> Option<Snapshot> {
        while self.seen.len() < count {
            self.next_change().await?;
        }
        Some(Arc::clone(&self.seen))
    }

    pub fn into_stream(self) -> DeviceSnapshots {
        DeviceSnapshots {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// Yields the current device map first, then one snapshot per change.
pub struct DeviceSnapshots {
    inner: WatchStream<Snapshot>,
}

impl Stream for DeviceSnapshots {
    type Item = Snapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
