use thiserror::Error;

#[derive(Debug, Error)]
pub enum CloakError {
    #[error("Storage read failed for '{key}': {reason}")]
    StorageRead { key: String, reason: String },

    #[error("Storage write failed for '{key}': {reason}")]
    StorageWrite { key: String, reason: String },

    #[error("Malformed persisted data under '{key}': {reason}")]
    Malformed { key: String, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Setup already completed")]
    AlreadySetUp,

    #[error("Session is locked")]
    Locked,

    #[error("Device identity unavailable")]
    MissingIdentity,

    #[error("Cannot determine data directory")]
    NoDataDir,
}

impl CloakError {
    pub(crate) fn read(key: &str, reason: impl std::fmt::Display) -> Self {
        Self::StorageRead {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write(key: &str, reason: impl std::fmt::Display) -> Self {
        Self::StorageWrite {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn malformed(key: &str, reason: impl std::fmt::Display) -> Self {
        Self::Malformed {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CloakError>;
