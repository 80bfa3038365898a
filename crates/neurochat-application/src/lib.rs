//! Application layer for Neurochat.
//!
//! Provides the identity service and the chat store that coordinate the
//! domain and storage layers: per-user session lists, active-session
//! tracking, message logs, and reconciliation of changes arriving from
//! other handles over the same slots.

pub mod event;
pub mod identity;
pub mod keys;
pub mod store;

pub use event::StoreEvent;
pub use identity::IdentityService;
pub use store::ChatStore;
