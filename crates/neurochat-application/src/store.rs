//! Chat store.
//!
//! Owns per-user chat sessions and their message logs: listing,
//! creating, switching, deleting sessions, appending messages, and
//! reconciling changes made by other handles over the same slots.
//! Conflict policy across handles is last-writer-wins per slot; a delete
//! in one tab racing an append in another resolves to whichever write
//! lands last.

use std::sync::Arc;

use neurochat_core::error::{ChatError, Result};
use neurochat_core::session::model::sort_newest_first;
use neurochat_core::session::{ChatMessage, ChatSession, Sender};
use neurochat_core::storage::{SlotChange, SlotStorage};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::event::StoreEvent;
use crate::identity::IdentityService;
use crate::keys;

type Listener = Box<dyn Fn(&StoreEvent) + Send + Sync>;

#[derive(Default)]
struct StoreState {
    user: Option<String>,
    sessions: Vec<ChatSession>,
    active_session_id: Option<String>,
    messages: Vec<ChatMessage>,
    loading: bool,
    error: Option<ChatError>,
}

/// The session store for the current user.
///
/// The store is the only owner of session and message state; callers
/// hold no authoritative copy, only snapshots obtained through the
/// getters. Mutations persist before updating the in-memory snapshot,
/// and every observable change is announced to `on_change` subscribers.
///
/// A logged-in user always ends up with at least one session once
/// initialization settles, and the active-session pointer always refers
/// to a session in the list (self-healing on stale pointers).
pub struct ChatStore {
    storage: Arc<dyn SlotStorage>,
    identity: Arc<IdentityService>,
    state: RwLock<StoreState>,
    listeners: RwLock<Vec<Listener>>,
}

impl ChatStore {
    /// Opens the store and synchronizes it with the current identity.
    pub async fn open(storage: Arc<dyn SlotStorage>, identity: Arc<IdentityService>) -> Arc<Self> {
        let store = Arc::new(Self {
            storage,
            identity: Arc::clone(&identity),
            state: RwLock::new(StoreState {
                loading: true,
                ..Default::default()
            }),
            listeners: RwLock::new(Vec::new()),
        });
        let user = identity.current_user().await;
        store.sync_user(user).await;
        store
    }

    /// Opens the store over the default slot location, wiring up a fresh
    /// identity service and change bus.
    pub async fn open_default() -> Result<Arc<Self>> {
        let bus = neurochat_infrastructure::ChangeBus::new();
        let storage: Arc<dyn SlotStorage> =
            Arc::new(neurochat_infrastructure::FileSlotStorage::default_location(bus).await?);
        let identity = IdentityService::load(Arc::clone(&storage)).await;
        Ok(Self::open(storage, identity).await)
    }

    /// The identity service this store follows.
    pub fn identity(&self) -> &Arc<IdentityService> {
        &self.identity
    }

    // ------------------------------------------------------------------
    // Read operations
    // ------------------------------------------------------------------

    /// The current user's sessions, newest first.
    pub async fn sessions(&self) -> Vec<ChatSession> {
        self.state.read().await.sessions.clone()
    }

    /// The active session id, absent only when logged out.
    pub async fn active_session_id(&self) -> Option<String> {
        self.state.read().await.active_session_id.clone()
    }

    /// The active session's message log, in insertion order.
    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.state.read().await.messages.clone()
    }

    /// True while the store is initializing or loading a session log.
    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    /// The last user-visible error, cleared by the next successful
    /// operation.
    pub async fn last_error(&self) -> Option<ChatError> {
        self.state.read().await.error.clone()
    }

    /// Registers a change callback. Callbacks run after the state change
    /// is complete and may read the store through the getters.
    pub async fn on_change(&self, listener: impl Fn(&StoreEvent) + Send + Sync + 'static) {
        self.listeners.write().await.push(Box::new(listener));
    }

    // ------------------------------------------------------------------
    // Session operations
    // ------------------------------------------------------------------

    /// Creates a fresh session, makes it active, and clears the visible
    /// log. Returns the new session id.
    pub async fn create_session(&self) -> Result<String> {
        let mut state = self.state.write().await;
        let user = match self.require_user(&mut state).await {
            Ok(user) => user,
            Err(e) => return Err(e),
        };

        match self.create_session_locked(&mut state, &user).await {
            Ok(session) => {
                info!("Created new session: {}", session.id);
                state.error = None;
                drop(state);
                self.notify(&[
                    StoreEvent::SessionsUpdated,
                    StoreEvent::ActiveSessionChanged,
                    StoreEvent::MessagesUpdated,
                ])
                .await;
                Ok(session.id)
            }
            Err(e) => self.fail(state, e).await,
        }
    }

    /// Switches the active session and loads its log.
    ///
    /// A stale id falls back to the newest session (creating one if none
    /// remain) instead of failing.
    pub async fn set_active_session(&self, session_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let user = match self.require_user(&mut state).await {
            Ok(user) => user,
            Err(e) => return Err(e),
        };

        let result = if state.sessions.iter().any(|s| s.id == session_id) {
            self.activate_locked(&mut state, &user, session_id).await
        } else {
            warn!(
                "{}",
                ChatError::session_not_found(session_id.to_string())
            );
            self.heal_active_locked(&mut state, &user).await
        };

        match result {
            Ok(mut events) => {
                state.error = None;
                events.dedup();
                drop(state);
                self.notify(&events).await;
                Ok(())
            }
            Err(e) => self.fail(state, e).await,
        }
    }

    /// Deletes a session and its message log. Deleting an unknown id
    /// only removes any orphaned log. The ≥1-session invariant is
    /// restored before this returns: deleting the active or last session
    /// re-targets the pointer to the newest session or creates a fresh
    /// one.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let user = match self.require_user(&mut state).await {
            Ok(user) => user,
            Err(e) => return Err(e),
        };

        let result = self.delete_session_locked(&mut state, &user, session_id).await;
        match result {
            Ok(mut events) => {
                state.error = None;
                events.dedup();
                drop(state);
                self.notify(&events).await;
                Ok(())
            }
            Err(e) => self.fail(state, e).await,
        }
    }

    /// Appends a message to the active session's log.
    ///
    /// The persisted log is read, extended, and written back whole; the
    /// in-memory log is updated before returning so the caller observes
    /// the new message immediately. The first user message in an empty
    /// log becomes the session title.
    pub async fn append_message(&self, text: &str, sender: Sender) -> Result<()> {
        let mut state = self.state.write().await;
        let user = match self.require_user(&mut state).await {
            Ok(user) => user,
            Err(e) => return Err(e),
        };
        let Some(session_id) = state.active_session_id.clone() else {
            return self.fail(state, ChatError::NoActiveSession).await;
        };

        let message = ChatMessage::new(text, sender);
        let key = keys::history_key(&user, &session_id);

        let mut log = self.read_log(&key).await;
        let was_empty = log.is_empty();
        log.push(message);

        let body = match serde_json::to_string(&log) {
            Ok(body) => body,
            Err(e) => return self.fail(state, e.into()).await,
        };
        if let Err(e) = self.storage.write(&key, &body).await {
            return self.fail(state, e).await;
        }
        state.messages = log;
        state.error = None;

        let mut events = vec![StoreEvent::MessagesUpdated];
        if sender == Sender::User && was_empty {
            if let Some(session) = state.sessions.iter_mut().find(|s| s.id == session_id) {
                session.title = ChatSession::derive_title(text);
                match self.save_sessions(&mut state, &user).await {
                    Ok(()) => events.push(StoreEvent::SessionsUpdated),
                    Err(e) => {
                        // The message itself is saved; only the title
                        // update failed.
                        warn!("Failed to persist derived session title: {}", e);
                        state.error = Some(e);
                        events.push(StoreEvent::ErrorUpdated);
                    }
                }
            }
        }

        drop(state);
        self.notify(&events).await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // External change reconciliation
    // ------------------------------------------------------------------

    /// Applies a slot change made by another handle over the same slots.
    ///
    /// Dispatches on key identity: the session list reloads, the active
    /// pointer is adopted (including clearing), the active log reloads.
    /// Changes to other sessions' logs and this handle's own writes need
    /// no action.
    pub async fn apply_slot_change(&self, change: &SlotChange) {
        if change.origin == self.storage.origin() {
            return;
        }

        let mut state = self.state.write().await;
        let Some(user) = state.user.clone() else {
            return;
        };

        let mut events = Vec::new();
        if change.key == keys::sessions_key(&user) {
            debug!("Session list changed in another tab, reloading");
            state.sessions = self.load_sessions(&user).await;
            events.push(StoreEvent::SessionsUpdated);
            let stale = state
                .active_session_id
                .as_ref()
                .is_some_and(|id| !state.sessions.iter().any(|s| s.id == *id));
            if stale {
                match self.heal_active_locked(&mut state, &user).await {
                    Ok(more) => events.extend(more),
                    Err(e) => {
                        warn!("Failed to re-target active session: {}", e);
                        state.error = Some(e);
                        events.push(StoreEvent::ErrorUpdated);
                    }
                }
            }
        } else if change.key == keys::active_session_key(&user) {
            debug!("Active session changed in another tab, adopting");
            match self.adopt_pointer_locked(&mut state, &user, change.new_value.as_deref()).await {
                Ok(more) => events.extend(more),
                Err(e) => {
                    warn!("Failed to adopt active session: {}", e);
                    state.error = Some(e);
                    events.push(StoreEvent::ErrorUpdated);
                }
            }
        } else {
            let active_log_key = state
                .active_session_id
                .as_ref()
                .map(|id| keys::history_key(&user, id));
            if active_log_key.as_deref() == Some(change.key.as_str()) {
                debug!("Active session log changed in another tab, reloading");
                state.messages = self.load_messages_slot(&change.key).await;
                events.push(StoreEvent::MessagesUpdated);
            }
        }

        events.dedup();
        drop(state);
        self.notify(&events).await;
    }

    /// Synchronizes the store with an identity change: loads the new
    /// user's sessions (creating one if none exist) or clears everything
    /// on logout. Wired automatically by
    /// [`ChatStore::spawn_change_listeners`].
    pub async fn sync_user(&self, user: Option<String>) {
        let mut state = self.state.write().await;
        if state.user == user && !state.loading {
            return;
        }

        state.user = user.clone();
        state.sessions.clear();
        state.active_session_id = None;
        state.messages.clear();
        state.error = None;

        let mut events = vec![
            StoreEvent::SessionsUpdated,
            StoreEvent::ActiveSessionChanged,
            StoreEvent::MessagesUpdated,
        ];
        if let Some(user) = &user {
            state.loading = true;
            match self.initialize_for_user(&mut state, user).await {
                Ok(more) => events.extend(more),
                Err(e) => {
                    warn!("Failed to initialize sessions for user: {}", e);
                    state.error = Some(e);
                    events.push(StoreEvent::ErrorUpdated);
                }
            }
        }
        state.loading = false;

        events.dedup();
        drop(state);
        self.notify(&events).await;
    }

    /// Spawns tasks forwarding bus notifications to
    /// [`ChatStore::apply_slot_change`] and identity changes to
    /// [`ChatStore::sync_user`].
    pub fn spawn_change_listeners(self: &Arc<Self>) {
        use tokio::sync::broadcast::error::RecvError;

        let store = Arc::clone(self);
        let mut slot_rx = self.storage.subscribe();
        tokio::spawn(async move {
            loop {
                match slot_rx.recv().await {
                    Ok(change) => store.apply_slot_change(&change).await,
                    // Reloads are wholesale, so skipped notifications
                    // only delay reconciliation until the next change.
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Store listener lagged, skipped {} changes", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let store = Arc::clone(self);
        let mut identity_rx = self.identity.subscribe();
        tokio::spawn(async move {
            while identity_rx.changed().await.is_ok() {
                let user = identity_rx.borrow_and_update().clone();
                store.sync_user(user).await;
            }
        });
    }

    // ------------------------------------------------------------------
    // Internals (all run under the state write lock)
    // ------------------------------------------------------------------

    async fn require_user(&self, state: &mut StoreState) -> Result<String> {
        match state.user.clone() {
            Some(user) => Ok(user),
            None => {
                state.error = Some(ChatError::NotAuthenticated);
                self.notify(&[StoreEvent::ErrorUpdated]).await;
                Err(ChatError::NotAuthenticated)
            }
        }
    }

    async fn fail<T>(
        &self,
        mut state: tokio::sync::RwLockWriteGuard<'_, StoreState>,
        error: ChatError,
    ) -> Result<T> {
        state.error = Some(error.clone());
        drop(state);
        self.notify(&[StoreEvent::ErrorUpdated]).await;
        Err(error)
    }

    async fn initialize_for_user(
        &self,
        state: &mut StoreState,
        user: &str,
    ) -> Result<Vec<StoreEvent>> {
        state.sessions = self.load_sessions(user).await;

        let stored_pointer = match self.storage.read(&keys::active_session_key(user)).await {
            Ok(pointer) => pointer,
            Err(e) => {
                warn!("Failed to read active session pointer: {}", e);
                None
            }
        };

        match stored_pointer {
            Some(id) if state.sessions.iter().any(|s| s.id == id) => {
                state.active_session_id = Some(id.clone());
                state.messages = self.load_messages(state, user, &id).await;
                Ok(vec![])
            }
            _ => self.heal_active_locked(state, user).await,
        }
    }

    /// Re-targets the active pointer to the newest session, or creates a
    /// fresh session when none remain.
    async fn heal_active_locked(
        &self,
        state: &mut StoreState,
        user: &str,
    ) -> Result<Vec<StoreEvent>> {
        if let Some(newest) = state.sessions.first().map(|s| s.id.clone()) {
            self.activate_locked(state, user, &newest).await
        } else {
            self.create_session_locked(state, user).await?;
            Ok(vec![
                StoreEvent::SessionsUpdated,
                StoreEvent::ActiveSessionChanged,
                StoreEvent::MessagesUpdated,
            ])
        }
    }

    async fn activate_locked(
        &self,
        state: &mut StoreState,
        user: &str,
        session_id: &str,
    ) -> Result<Vec<StoreEvent>> {
        self.storage
            .write(&keys::active_session_key(user), session_id)
            .await?;
        state.active_session_id = Some(session_id.to_string());
        state.messages = self.load_messages(state, user, session_id).await;
        Ok(vec![
            StoreEvent::ActiveSessionChanged,
            StoreEvent::MessagesUpdated,
        ])
    }

    async fn create_session_locked(
        &self,
        state: &mut StoreState,
        user: &str,
    ) -> Result<ChatSession> {
        let session = ChatSession::new();
        state.sessions.insert(0, session.clone());
        self.save_sessions(state, user).await?;
        self.storage
            .write(&keys::active_session_key(user), &session.id)
            .await?;
        state.active_session_id = Some(session.id.clone());
        state.messages.clear();
        Ok(session)
    }

    async fn delete_session_locked(
        &self,
        state: &mut StoreState,
        user: &str,
        session_id: &str,
    ) -> Result<Vec<StoreEvent>> {
        let mut events = Vec::new();

        if let Some(pos) = state.sessions.iter().position(|s| s.id == session_id) {
            state.sessions.remove(pos);
            self.save_sessions(state, user).await?;
            events.push(StoreEvent::SessionsUpdated);
        }

        // Cascade: the log goes with the session, even if the list entry
        // was already gone.
        if let Err(e) = self.storage.remove(&keys::history_key(user, session_id)).await {
            warn!("Failed to delete session log for {}: {}", session_id, e);
        } else {
            info!("Deleted session: {}", session_id);
        }

        let was_active = state.active_session_id.as_deref() == Some(session_id);
        if was_active || state.sessions.is_empty() {
            events.extend(self.heal_active_locked(state, user).await?);
        }
        Ok(events)
    }

    /// Adopts an active-session pointer written by another handle. A
    /// cleared or stale pointer falls back to the newest session; the
    /// list is reloaded first in case this handle has not yet seen the
    /// other tab's list write.
    async fn adopt_pointer_locked(
        &self,
        state: &mut StoreState,
        user: &str,
        pointer: Option<&str>,
    ) -> Result<Vec<StoreEvent>> {
        if let Some(id) = pointer {
            if !state.sessions.iter().any(|s| s.id == id) {
                state.sessions = self.load_sessions(user).await;
            }
            if state.sessions.iter().any(|s| s.id == id) {
                state.active_session_id = Some(id.to_string());
                state.messages = self.load_messages(state, user, id).await;
                return Ok(vec![
                    StoreEvent::SessionsUpdated,
                    StoreEvent::ActiveSessionChanged,
                    StoreEvent::MessagesUpdated,
                ]);
            }
        }
        self.heal_active_locked(state, user).await
    }

    async fn save_sessions(&self, state: &mut StoreState, user: &str) -> Result<()> {
        sort_newest_first(&mut state.sessions);
        let body = serde_json::to_string(&state.sessions)?;
        self.storage.write(&keys::sessions_key(user), &body).await
    }

    /// Loads and validates a user's session list, discarding the slot on
    /// any parse or shape failure.
    async fn load_sessions(&self, user: &str) -> Vec<ChatSession> {
        let key = keys::sessions_key(user);
        match self.storage.read(&key).await {
            Ok(None) => Vec::new(),
            Ok(Some(raw)) => match serde_json::from_str::<Vec<ChatSession>>(&raw) {
                Ok(mut sessions) => {
                    sort_newest_first(&mut sessions);
                    sessions
                }
                Err(e) => {
                    warn!("{}: {}", ChatError::malformed(key.clone()), e);
                    let _ = self.storage.remove(&key).await;
                    Vec::new()
                }
            },
            Err(e) => {
                warn!("Failed to read session list: {}", e);
                Vec::new()
            }
        }
    }

    async fn load_messages(
        &self,
        state: &mut StoreState,
        user: &str,
        session_id: &str,
    ) -> Vec<ChatMessage> {
        state.loading = true;
        let messages = self
            .load_messages_slot(&keys::history_key(user, session_id))
            .await;
        state.loading = false;
        messages
    }

    /// Loads and validates one message log, discarding the slot on any
    /// parse or shape failure.
    async fn load_messages_slot(&self, key: &str) -> Vec<ChatMessage> {
        match self.storage.read(key).await {
            Ok(None) => Vec::new(),
            Ok(Some(raw)) => match serde_json::from_str::<Vec<ChatMessage>>(&raw) {
                Ok(messages) => messages,
                Err(e) => {
                    warn!("{}: {}", ChatError::malformed(key.to_string()), e);
                    let _ = self.storage.remove(key).await;
                    Vec::new()
                }
            },
            Err(e) => {
                warn!("Failed to read session log: {}", e);
                Vec::new()
            }
        }
    }

    /// Reads the persisted log for a read-modify-write append. Malformed
    /// content is overwritten by the subsequent write, so it degrades to
    /// an empty log here.
    async fn read_log(&self, key: &str) -> Vec<ChatMessage> {
        match self.storage.read(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<ChatMessage>>(&raw) {
                Ok(messages) => messages,
                Err(e) => {
                    warn!("Overwriting malformed log in slot '{}': {}", key, e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Failed to read log before append: {}", e);
                Vec::new()
            }
        }
    }

    async fn notify(&self, events: &[StoreEvent]) {
        if events.is_empty() {
            return;
        }
        let listeners = self.listeners.read().await;
        for event in events {
            for listener in listeners.iter() {
                listener(event);
            }
        }
    }
}
