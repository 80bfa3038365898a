//! Domain layer for Neurochat.
//!
//! Holds the chat session and message models, the user identity model,
//! the slot-storage contract the persistence layer implements, the shared
//! error type, and the rule-based CVST responder.

pub mod error;
pub mod responder;
pub mod session;
pub mod storage;
pub mod user;

pub use error::{ChatError, Result};
pub use session::{ChatMessage, ChatSession, Sender};
pub use storage::{SlotChange, SlotStorage};
pub use user::StoredUser;
