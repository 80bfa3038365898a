//! User identity domain model.

use serde::{Deserialize, Serialize};

/// Persisted body of the `currentUser` slot.
///
/// The email is an opaque, stable identifier; no authenticity is implied.
/// Absence of the slot means "logged out".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredUser {
    /// The user's email, used as the storage-scoping identifier.
    pub email: String,
}
