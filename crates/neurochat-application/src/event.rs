//! Store change notifications.

/// What part of the store's observable state changed.
///
/// Delivered to callbacks registered with `ChatStore::on_change`; the
/// callback reads the new state back through the store's getters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    /// The session list changed (create, delete, rename, or reload).
    SessionsUpdated,
    /// The active-session pointer moved.
    ActiveSessionChanged,
    /// The visible message log changed.
    MessagesUpdated,
    /// The user-visible error state changed.
    ErrorUpdated,
}
