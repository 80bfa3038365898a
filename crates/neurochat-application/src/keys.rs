//! Slot key derivation.
//!
//! Persisted state is keyed per user and per session:
//!
//! - `currentUser` → `{"email": ...}` JSON
//! - `sessions_<user>` → JSON array of sessions, newest first
//! - `active_session_<user>` → raw session-id string
//! - `history_<user>_<session>` → JSON array of messages, append-only

/// Key of the persisted identity slot.
pub const CURRENT_USER_KEY: &str = "currentUser";

/// Key of a user's session list.
pub fn sessions_key(user: &str) -> String {
    format!("sessions_{user}")
}

/// Key of a user's active-session pointer.
pub fn active_session_key(user: &str) -> String {
    format!("active_session_{user}")
}

/// Key of one session's message log.
pub fn history_key(user: &str, session_id: &str) -> String {
    format!("history_{user}_{session_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_scoped_per_user() {
        assert_eq!(sessions_key("a@x.com"), "sessions_a@x.com");
        assert_ne!(sessions_key("a@x.com"), sessions_key("b@x.com"));
    }

    #[test]
    fn test_history_key_is_scoped_per_session() {
        assert_eq!(history_key("a@x.com", "s1"), "history_a@x.com_s1");
        assert_ne!(history_key("a@x.com", "s1"), history_key("a@x.com", "s2"));
    }
}
