//! Slot storage trait.
//!
//! Defines the interface the identity service and chat store persist
//! through: a flat key→value store of string-valued slots, plus a
//! change-notification stream so other handles over the same slots (other
//! tabs, in browser terms) can reconcile. Conflict policy across handles
//! is last-writer-wins at slot granularity; there is no merge.

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::Result;

/// Notification that a slot was written or removed.
///
/// `new_value` is `None` when the slot was removed. `origin` identifies
/// the storage handle that performed the write so a consumer can ignore
/// its own changes, mirroring the browser's storage event which only
/// fires in other tabs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotChange {
    /// The slot key that changed.
    pub key: String,
    /// The new value, or `None` if the slot was removed.
    pub new_value: Option<String>,
    /// The storage handle that made the change.
    pub origin: Uuid,
}

/// An abstract key→value slot store with change notifications.
///
/// Implementations must publish a [`SlotChange`] for every successful
/// `write` and `remove`, after the change is durable. Reads and writes
/// are cheap local calls, not network round-trips.
#[async_trait]
pub trait SlotStorage: Send + Sync {
    /// Identifier of this handle, stamped as the origin of its changes.
    fn origin(&self) -> Uuid;

    /// Reads a slot's raw value.
    ///
    /// Returns `Ok(None)` if the slot is absent.
    async fn read(&self, key: &str) -> Result<Option<String>>;

    /// Writes a slot, replacing any previous value.
    async fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Removes a slot. Removing an absent slot is a no-op and still
    /// publishes a change.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Subscribes to change notifications for all slots reachable through
    /// this handle, including changes made by other handles on the same
    /// backing store.
    fn subscribe(&self) -> broadcast::Receiver<SlotChange>;
}
