use thiserror::Error;

use super::MotionMatchingError;

/// Possible errors that can be produced by the motion matching asset loaders
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AssetLoaderError {
    /// An [IO](std::io) Error
    #[error("could not read asset: {0}")]
    Io(#[from] std::io::Error),
    /// A [RON](ron) Error
    #[error("could not parse RON: {0}")]
    RonSpannedError(#[from] ron::error::SpannedError),
    #[error("pose database is inconsistent: {0}")]
    InvalidPoseDatabase(#[from] MotionMatchingError),
}
