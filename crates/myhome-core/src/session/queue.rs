// ── Inbound queue ──
//
// Bounded FIFO between the listening task and the host. Pushing never
// waits: when the queue is full the oldest message is dropped.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use myhome_api::Message;
use tokio::sync::Notify;
use tracing::warn;

/// Drop-oldest queue of decoded messages.
#[derive(Debug)]
pub struct InboundQueue {
    items: Mutex<VecDeque<Arc<Message>>>,
    capacity: usize,
    notify: Notify,
    dropped: AtomicU64,
}

impl InboundQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue without waiting; evicts the oldest message when full.
    pub fn push(&self, message: Arc<Message>) {
        {
            let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
            if items.len() >= self.capacity {
                items.pop_front();
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(capacity = self.capacity, dropped, "inbound queue full, dropping oldest message");
            }
            items.push_back(message);
        }
        self.notify.notify_one();
    }

    pub fn try_recv(&self) -> Option<Arc<Message>> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    /// Wait for the next message.
    pub async fn recv(&self) -> Arc<Message> {
        loop {
            let notified = self.notify.notified();
            if let Some(message) = self.try_recv() {
                return message;
            }
            notified.await;
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages evicted since the queue was created.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
