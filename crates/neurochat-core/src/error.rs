//! Error types shared across the Neurochat crates.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the whole application.
///
/// Provides typed, structured error variants with automatic conversion
/// from common error types via the `From` trait. The variants mirror the
/// conditions a caller can actually observe: authentication and quota
/// failures surface to the user, while corruption and not-found
/// conditions are recovered locally by the store.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChatError {
    /// Operation requires a logged-in user and none is present.
    #[error("Not authenticated: a logged-in user is required")]
    NotAuthenticated,

    /// Message append attempted with no active session selected.
    #[error("No active chat session")]
    NoActiveSession,

    /// Operation referenced a session id that no longer exists.
    #[error("Session not found: '{id}'")]
    SessionNotFound { id: String },

    /// A persisted slot failed to parse or shape-validate.
    ///
    /// Recovered locally by discarding the slot; never propagated from a
    /// read path.
    #[error("Malformed persisted data in slot '{slot}'")]
    MalformedData { slot: String },

    /// A write failed because the storage backend is out of capacity.
    #[error("Storage limit reached, could not save chat data")]
    StorageQuotaExceeded,

    /// IO error (file system operations).
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error.
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl ChatError {
    /// Creates a SessionNotFound error.
    pub fn session_not_found(id: impl Into<String>) -> Self {
        Self::SessionNotFound { id: id.into() }
    }

    /// Creates a MalformedData error for the given slot key.
    pub fn malformed(slot: impl Into<String>) -> Self {
        Self::MalformedData { slot: slot.into() }
    }

    /// Creates an IO error.
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Check if this is a NotAuthenticated error.
    pub fn is_not_authenticated(&self) -> bool {
        matches!(self, Self::NotAuthenticated)
    }

    /// Check if this is a quota error, the only write failure that must
    /// stay visible to the user rather than being retried or swallowed.
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::StorageQuotaExceeded)
    }

    /// Check if this is a MalformedData error.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedData { .. })
    }
}

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::StorageFull | std::io::ErrorKind::QuotaExceeded => {
                Self::StorageQuotaExceeded
            }
            kind => Self::Io {
                message: format!("{} (kind: {:?})", err, kind),
            },
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, ChatError>`.
pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_from_io_kind() {
        let err: ChatError = std::io::Error::new(std::io::ErrorKind::StorageFull, "disk").into();
        assert!(err.is_quota());
    }

    #[test]
    fn test_other_io_kinds_stay_io() {
        let err: ChatError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert!(matches!(err, ChatError::Io { .. }));
    }

    #[test]
    fn test_malformed_constructor() {
        let err = ChatError::malformed("sessions_a@x.com");
        assert!(err.is_malformed());
        assert_eq!(
            err.to_string(),
            "Malformed persisted data in slot 'sessions_a@x.com'"
        );
    }
}
