//! Chat session domain types.

pub mod message;
pub mod model;

pub use message::{ChatMessage, Sender};
pub use model::ChatSession;
