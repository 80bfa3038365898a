//! Session domain model.

use chrono::Local;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of characters of the first user message that become the
/// session title; anything longer is truncated with an ellipsis.
pub const TITLE_MAX_CHARS: usize = 30;

/// A named, timestamped container for one conversation thread.
///
/// Sessions belong to exactly one user; the owning user is encoded in the
/// storage key, not in the session itself. The `created_at` millisecond
/// timestamp is the sort key: session lists are kept newest-first both in
/// memory and on every persisted write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    /// Unique session identifier (UUID format).
    pub id: String,
    /// Human-readable session title.
    pub title: String,
    /// Creation time as unix milliseconds.
    pub created_at: i64,
}

impl ChatSession {
    /// Creates a fresh session with a generated id and a placeholder title
    /// carrying the local creation time.
    pub fn new() -> Self {
        let now = Local::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: format!("Chat {}", now.format("%Y-%m-%d %H:%M:%S")),
            created_at: now.timestamp_millis(),
        }
    }

    /// Derives a session title from the first user message.
    ///
    /// Takes the first [`TITLE_MAX_CHARS`] characters and appends `"..."`
    /// when the text is longer. Character-based so multi-byte text never
    /// splits mid-codepoint.
    pub fn derive_title(text: &str) -> String {
        let mut title: String = text.chars().take(TITLE_MAX_CHARS).collect();
        if text.chars().count() > TITLE_MAX_CHARS {
            title.push_str("...");
        }
        title
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Sorts a session list newest-first by creation time.
///
/// The sort is stable, so a freshly inserted head entry stays ahead of an
/// older entry created in the same millisecond.
pub fn sort_newest_first(sessions: &mut [ChatSession]) {
    sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_has_unique_id_and_placeholder_title() {
        let a = ChatSession::new();
        let b = ChatSession::new();
        assert_ne!(a.id, b.id);
        assert!(a.title.starts_with("Chat "));
    }

    #[test]
    fn test_derive_title_short_text_unchanged() {
        assert_eq!(ChatSession::derive_title("hello"), "hello");
    }

    #[test]
    fn test_derive_title_exactly_thirty_chars_unchanged() {
        let text = "a".repeat(30);
        assert_eq!(ChatSession::derive_title(&text), text);
    }

    #[test]
    fn test_derive_title_truncates_with_ellipsis() {
        let text = "a".repeat(31);
        let title = ChatSession::derive_title(&text);
        assert_eq!(title.chars().count(), 33);
        assert!(title.ends_with("..."));
        assert_eq!(&title[..30], &text[..30]);
    }

    #[test]
    fn test_derive_title_counts_characters_not_bytes() {
        let text = "あ".repeat(31);
        let title = ChatSession::derive_title(&text);
        assert_eq!(title.chars().count(), 33);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn test_sort_newest_first() {
        let mut sessions = vec![
            ChatSession {
                id: "old".into(),
                title: "old".into(),
                created_at: 100,
            },
            ChatSession {
                id: "new".into(),
                title: "new".into(),
                created_at: 200,
            },
        ];
        sort_newest_first(&mut sessions);
        assert_eq!(sessions[0].id, "new");
        assert_eq!(sessions[1].id, "old");
    }

    #[test]
    fn test_sort_is_stable_for_equal_timestamps() {
        let mut sessions = vec![
            ChatSession {
                id: "head".into(),
                title: "head".into(),
                created_at: 100,
            },
            ChatSession {
                id: "tail".into(),
                title: "tail".into(),
                created_at: 100,
            },
        ];
        sort_newest_first(&mut sessions);
        assert_eq!(sessions[0].id, "head");
    }
}
