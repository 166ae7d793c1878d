//! Error types for tomo-companion

use thiserror::Error;
use tomo_core::CompanionId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompanionError {
    #[error("Companion {0} has no navigation agent")]
    NoAgent(CompanionId),

    #[error("Unknown gesture: {0}")]
    UnknownGesture(String),

    #[error("Unknown companion: {0}")]
    UnknownCompanion(String),

    #[error("Companion already spawned: {0}")]
    AlreadySpawned(CompanionId),
}

impl From<CompanionError> for tomo_core::Error {
    fn from(err: CompanionError) -> Self {
        match err {
            CompanionError::NoAgent(_) => tomo_core::Error::NotReady(err.to_string()),
            CompanionError::UnknownGesture(_) | CompanionError::UnknownCompanion(_) => {
                tomo_core::Error::UnknownTarget(err.to_string())
            }
            CompanionError::AlreadySpawned(_) => tomo_core::Error::Validation(err.to_string()),
        }
    }
}
