use bevy::prelude::*;
use thiserror::Error;

use crate::pose_database::{AnimSourceType, PoseId};

/// Configuration problems that prevent a motion matcher from evaluating.
///
/// A matcher that fails to activate with one of these stays invalid and outputs the rest pose
/// until it is activated again.
#[non_exhaustive]
#[derive(Debug, Error, Reflect, Clone, PartialEq)]
pub enum MotionMatchingError {
    #[error("no pose database was provided")]
    MissingPoseDatabase,
    #[error("the pose database contains no poses")]
    EmptyPoseDatabase,
    #[error("no calibration is available, neither user provided nor in the pose database")]
    MissingCalibration,
    #[error(
        "calibration does not match pose features: expected {trajectory} trajectory points and {joints} joints"
    )]
    CalibrationMismatch { trajectory: usize, joints: usize },
    #[error("pose {pose} has id {id}, but pose ids must match their index")]
    PoseIdMismatch { pose: usize, id: PoseId },
    #[error("pose {pose} links to pose {target}, which is out of range or from another source")]
    InvalidPoseLink { pose: PoseId, target: PoseId },
    #[error(
        "pose {pose} has {trajectory} trajectory points and {joints} joints, expected {expected_trajectory} and {expected_joints}"
    )]
    FeatureLengthMismatch {
        pose: PoseId,
        trajectory: usize,
        joints: usize,
        expected_trajectory: usize,
        expected_joints: usize,
    },
    #[error("pose {pose} references missing {source_type:?} source {index}")]
    MissingSource {
        pose: PoseId,
        source_type: AnimSourceType,
        index: usize,
    },
    #[error("pose interval must be positive, got {0}")]
    InvalidPoseInterval(f32),
}

pub type MotionMatchingResult<T> = Result<T, MotionMatchingError>;
