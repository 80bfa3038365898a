//! Identity service.
//!
//! Owns the `currentUser` slot: an opaque email string set on login,
//! persisted so it survives restarts, cleared on logout. No credential
//! verification is performed. Foreign slot changes are authoritative
//! replacements of local state, a removed slot meaning logout.

use std::sync::Arc;

use neurochat_core::error::Result;
use neurochat_core::storage::{SlotChange, SlotStorage};
use neurochat_core::user::StoredUser;
use tokio::sync::{RwLock, watch};
use tracing::warn;

use crate::keys::CURRENT_USER_KEY;

struct IdentityState {
    user: Option<String>,
    loading: bool,
}

/// Service owning the persisted user identity.
///
/// Dependent state (the chat store) reacts to identity changes through
/// [`IdentityService::subscribe`] rather than reading ambient globals.
pub struct IdentityService {
    storage: Arc<dyn SlotStorage>,
    state: RwLock<IdentityState>,
    changed: watch::Sender<Option<String>>,
}

impl IdentityService {
    /// Loads the persisted identity and returns the ready service.
    ///
    /// An unreadable or malformed slot is treated as "no user" and wiped
    /// rather than retried.
    pub async fn load(storage: Arc<dyn SlotStorage>) -> Arc<Self> {
        let user = read_stored_user(storage.as_ref()).await;
        let (changed, _) = watch::channel(user.clone());
        Arc::new(Self {
            storage,
            state: RwLock::new(IdentityState {
                user,
                loading: false,
            }),
            changed,
        })
    }

    /// The current user identifier, or `None` when logged out.
    pub async fn current_user(&self) -> Option<String> {
        self.state.read().await.user.clone()
    }

    /// True until the initial identity load has settled.
    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    /// Stores `email` as the current user, replacing any previous one.
    pub async fn login(&self, email: &str) -> Result<()> {
        let body = serde_json::to_string(&StoredUser {
            email: email.to_string(),
        })?;
        self.storage.write(CURRENT_USER_KEY, &body).await?;
        self.set_user(Some(email.to_string())).await;
        Ok(())
    }

    /// Clears the persisted identity.
    pub async fn logout(&self) -> Result<()> {
        self.storage.remove(CURRENT_USER_KEY).await?;
        self.set_user(None).await;
        Ok(())
    }

    /// Subscribes to identity changes. The receiver's value is the
    /// current user and updates on every login, logout, and adopted
    /// foreign change.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.changed.subscribe()
    }

    /// Applies a slot change made by another storage handle.
    ///
    /// Changes to other keys and this handle's own writes are ignored.
    /// A malformed foreign value is treated as logout and the slot is
    /// wiped.
    pub async fn apply_slot_change(&self, change: &SlotChange) {
        if change.key != CURRENT_USER_KEY || change.origin == self.storage.origin() {
            return;
        }

        let user = match &change.new_value {
            None => None,
            Some(raw) => match serde_json::from_str::<StoredUser>(raw) {
                Ok(stored) => Some(stored.email),
                Err(e) => {
                    warn!("Malformed identity slot from another handle, wiping: {}", e);
                    let _ = self.storage.remove(CURRENT_USER_KEY).await;
                    None
                }
            },
        };
        self.set_user(user).await;
    }

    /// Spawns a task forwarding bus notifications to
    /// [`IdentityService::apply_slot_change`]. The task ends when the
    /// storage handle is dropped.
    pub fn spawn_change_listener(self: &Arc<Self>) {
        use tokio::sync::broadcast::error::RecvError;

        let service = Arc::clone(self);
        let mut rx = self.storage.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(change) => service.apply_slot_change(&change).await,
                    // A lagged receiver only skips notifications; every
                    // delivery re-reads the slot, so the next one
                    // catches up.
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Identity listener lagged, skipped {} changes", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    async fn set_user(&self, user: Option<String>) {
        {
            let mut state = self.state.write().await;
            state.user = user.clone();
        }
        self.changed.send_if_modified(|current| {
            if *current != user {
                *current = user;
                true
            } else {
                false
            }
        });
    }
}

async fn read_stored_user(storage: &dyn SlotStorage) -> Option<String> {
    match storage.read(CURRENT_USER_KEY).await {
        Ok(None) => None,
        Ok(Some(raw)) => match serde_json::from_str::<StoredUser>(&raw) {
            Ok(stored) => Some(stored.email),
            Err(e) => {
                warn!("Malformed identity slot, wiping: {}", e);
                let _ = storage.remove(CURRENT_USER_KEY).await;
                None
            }
        },
        Err(e) => {
            warn!("Failed to read identity slot: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neurochat_core::storage::SlotStorage;
    use neurochat_infrastructure::{ChangeBus, FileSlotStorage};
    use tempfile::TempDir;
    use uuid::Uuid;

    async fn storage_in(dir: &TempDir, bus: ChangeBus) -> Arc<dyn SlotStorage> {
        Arc::new(FileSlotStorage::open(dir.path(), bus).await.unwrap())
    }

    #[tokio::test]
    async fn test_starts_logged_out() {
        let dir = TempDir::new().unwrap();
        let identity = IdentityService::load(storage_in(&dir, ChangeBus::new()).await).await;
        assert_eq!(identity.current_user().await, None);
        assert!(!identity.is_loading().await);
    }

    #[tokio::test]
    async fn test_login_persists_across_reload() {
        let dir = TempDir::new().unwrap();
        let storage = storage_in(&dir, ChangeBus::new()).await;
        let identity = IdentityService::load(Arc::clone(&storage)).await;
        identity.login("a@x.com").await.unwrap();
        assert_eq!(identity.current_user().await, Some("a@x.com".to_string()));

        // A second service over the same slots sees the persisted user.
        let reloaded = IdentityService::load(storage).await;
        assert_eq!(reloaded.current_user().await, Some("a@x.com".to_string()));
    }

    #[tokio::test]
    async fn test_logout_clears_slot() {
        let dir = TempDir::new().unwrap();
        let storage = storage_in(&dir, ChangeBus::new()).await;
        let identity = IdentityService::load(Arc::clone(&storage)).await;
        identity.login("a@x.com").await.unwrap();
        identity.logout().await.unwrap();
        assert_eq!(identity.current_user().await, None);
        assert_eq!(storage.read(CURRENT_USER_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_malformed_slot_treated_as_logged_out_and_wiped() {
        let dir = TempDir::new().unwrap();
        let storage = storage_in(&dir, ChangeBus::new()).await;
        storage.write(CURRENT_USER_KEY, "{not json").await.unwrap();

        let identity = IdentityService::load(Arc::clone(&storage)).await;
        assert_eq!(identity.current_user().await, None);
        assert_eq!(storage.read(CURRENT_USER_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_subscribe_observes_login_and_logout() {
        let dir = TempDir::new().unwrap();
        let identity = IdentityService::load(storage_in(&dir, ChangeBus::new()).await).await;
        let mut rx = identity.subscribe();

        identity.login("a@x.com").await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Some("a@x.com".to_string()));

        identity.logout().await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), None);
    }

    #[tokio::test]
    async fn test_foreign_change_is_adopted() {
        let dir = TempDir::new().unwrap();
        let identity = IdentityService::load(storage_in(&dir, ChangeBus::new()).await).await;

        identity
            .apply_slot_change(&SlotChange {
                key: CURRENT_USER_KEY.to_string(),
                new_value: Some("{\"email\":\"b@x.com\"}".to_string()),
                origin: Uuid::new_v4(),
            })
            .await;
        assert_eq!(identity.current_user().await, Some("b@x.com".to_string()));

        // Removal in another tab means logout here.
        identity
            .apply_slot_change(&SlotChange {
                key: CURRENT_USER_KEY.to_string(),
                new_value: None,
                origin: Uuid::new_v4(),
            })
            .await;
        assert_eq!(identity.current_user().await, None);
    }

    #[tokio::test]
    async fn test_own_changes_are_not_reapplied() {
        let dir = TempDir::new().unwrap();
        let storage = storage_in(&dir, ChangeBus::new()).await;
        let identity = IdentityService::load(Arc::clone(&storage)).await;
        identity.login("a@x.com").await.unwrap();

        identity
            .apply_slot_change(&SlotChange {
                key: CURRENT_USER_KEY.to_string(),
                new_value: None,
                origin: storage.origin(),
            })
            .await;
        assert_eq!(identity.current_user().await, Some("a@x.com".to_string()));
    }

    #[tokio::test]
    async fn test_cross_tab_listener_end_to_end() {
        let dir = TempDir::new().unwrap();
        let bus = ChangeBus::new();
        let tab_a = storage_in(&dir, bus.clone()).await;
        let tab_b = storage_in(&dir, bus).await;

        let identity_a = IdentityService::load(tab_a).await;
        let identity_b = IdentityService::load(tab_b).await;
        identity_b.spawn_change_listener();
        let mut rx = identity_b.subscribe();

        identity_a.login("a@x.com").await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Some("a@x.com".to_string()));
    }
}
