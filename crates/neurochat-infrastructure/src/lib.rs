//! Storage layer for Neurochat.
//!
//! Implements the slot-storage contract over a directory of files, one
//! file per slot, with atomic writes and a broadcast change bus standing
//! in for the browser's cross-tab storage event.

pub mod change_bus;
pub mod file_slot_storage;
pub mod paths;

pub use change_bus::ChangeBus;
pub use file_slot_storage::FileSlotStorage;
pub use paths::NeurochatPaths;
