//! Error taxonomy for the triptic core
//!
//! Recoverable, caller-facing failures. Generator failures never surface here
//! synchronously; they are recorded on the job as `JobState::Error`.

use thiserror::Error;

use crate::storage::ids::{AssetGroupId, JobId, PlaylistId};
use crate::storage::types::Screen;

pub type Result<T> = std::result::Result<T, TripticError>;

#[derive(Debug, Error)]
pub enum TripticError {
    #[error("asset group '{0}' not found")]
    AssetGroupNotFound(AssetGroupId),

    #[error("version {version} not found on {group}/{screen}")]
    VersionNotFound {
        group: AssetGroupId,
        screen: Screen,
        version: u64,
    },

    #[error("{group}/{screen} has no current version")]
    NoCurrentVersion { group: AssetGroupId, screen: Screen },

    #[error("job '{0}' not found")]
    JobNotFound(JobId),

    #[error("playlist '{0}' not found")]
    PlaylistNotFound(PlaylistId),

    #[error("no playlist selected")]
    NoPlaylistSelected,

    #[error("asset group '{0}' already exists")]
    AssetGroupExists(AssetGroupId),

    #[error("playlist '{0}' already exists")]
    PlaylistExists(PlaylistId),

    #[error("version {version} is current on {group}/{screen} and cannot be deleted")]
    CannotDeleteCurrent {
        group: AssetGroupId,
        screen: Screen,
        version: u64,
    },

    #[error("playlist '{0}' is empty")]
    EmptyPlaylist(PlaylistId),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("generation failed: {0}")]
    ExternalFailure(String),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl TripticError {
    /// Whether this error means a referenced thing does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TripticError::AssetGroupNotFound(_)
                | TripticError::VersionNotFound { .. }
                | TripticError::NoCurrentVersion { .. }
                | TripticError::JobNotFound(_)
                | TripticError::PlaylistNotFound(_)
                | TripticError::NoPlaylistSelected
        )
    }

    /// Whether this error is a conflict with existing state
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            TripticError::AssetGroupExists(_)
                | TripticError::PlaylistExists(_)
                | TripticError::CannotDeleteCurrent { .. }
                | TripticError::EmptyPlaylist(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let err = TripticError::CannotDeleteCurrent {
            group: AssetGroupId::from_string("g1"),
            screen: Screen::Left,
            version: 2,
        };
        assert!(err.is_conflict());
        assert!(!err.is_not_found());
        assert_eq!(
            err.to_string(),
            "version 2 is current on g1/left and cannot be deleted"
        );

        let err = TripticError::JobNotFound(JobId::from_string("abc"));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_storage_wraps_anyhow() {
        let err: TripticError = anyhow::anyhow!("disk full").into();
        assert_eq!(err.to_string(), "storage error: disk full");
    }
}
