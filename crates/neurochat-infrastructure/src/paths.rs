//! Default storage locations.
//!
//! All persisted slots live under the platform config directory so state
//! survives reloads of the embedding application.
//!
//! ```text
//! ~/.config/neurochat/         # Config directory
//! └── slots/                   # Slot files (FileSlotStorage)
//! ```

use std::path::PathBuf;

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Unified path management for Neurochat.
pub struct NeurochatPaths;

impl NeurochatPaths {
    /// Returns the neurochat configuration directory.
    ///
    /// # Returns
    ///
    /// - `Ok(PathBuf)`: Path to config directory (e.g., `~/.config/neurochat/`)
    /// - `Err(PathError::HomeDirNotFound)`: Could not determine directory
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join("neurochat"))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the default slot storage directory.
    pub fn slots_dir() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("slots"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir() {
        let config_dir = NeurochatPaths::config_dir().unwrap();
        assert!(config_dir.ends_with("neurochat"));
    }

    #[test]
    fn test_slots_dir() {
        let slots_dir = NeurochatPaths::slots_dir().unwrap();
        assert!(slots_dir.ends_with("slots"));
        let config_dir = NeurochatPaths::config_dir().unwrap();
        assert!(slots_dir.starts_with(&config_dir));
    }
}
