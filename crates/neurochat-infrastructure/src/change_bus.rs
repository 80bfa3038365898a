//! Slot-change notification bus.

use neurochat_core::storage::SlotChange;
use tokio::sync::broadcast;

const BUS_CAPACITY: usize = 64;

/// Broadcast bus carrying [`SlotChange`] notifications between storage
/// handles over the same backing directory.
///
/// Handles that should see each other's changes (two "tabs") share a
/// clone of the same bus. A consumer that falls more than the channel
/// capacity behind loses the oldest notifications; consumers reload from
/// storage on every delivery, so a lost notification at most delays
/// reconciliation until the next change.
#[derive(Clone)]
pub struct ChangeBus {
    sender: broadcast::Sender<SlotChange>,
}

impl ChangeBus {
    /// Creates a new bus with no subscribers.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }

    /// Subscribes to all future changes published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<SlotChange> {
        self.sender.subscribe()
    }

    /// Publishes a change. A bus with no subscribers drops the change.
    pub fn publish(&self, change: SlotChange) {
        let _ = self.sender.send(change);
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}
