use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};

use crate::frame::Frame;

/// A frame handed to the reflex loop.
#[derive(Clone, Debug)]
pub(crate) struct FrameJob {
    pub frame_id: u64,
    pub timestamp: f64,
    pub frame: Arc<Frame>,
}

/// Producer side of a bounded queue that drops instead of blocking.
pub(crate) struct DropSender<T> {
    tx: Mutex<SyncSender<T>>,
    dropped: AtomicU64,
}

impl<T> DropSender<T> {
    /// Offer an item. Returns false when the queue is full or the consumer
    /// is gone.
    pub fn offer(&self, item: T) -> bool {
        let sent = self
            .tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .try_send(item);
        match sent {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

pub(crate) fn bounded<T>(capacity: usize) -> (DropSender<T>, Receiver<T>) {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    (
        DropSender {
            tx: Mutex::new(tx),
            dropped: AtomicU64::new(0),
        },
        rx,
    )
}
