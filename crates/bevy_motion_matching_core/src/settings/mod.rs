pub mod loader;

use bevy::{asset::Asset, reflect::Reflect};
use serde::{Deserialize, Serialize};

use crate::{
    calibration::CalibrationData, pose_database::PoseTraits, search::EquivalenceThresholds,
    search::cost::CostMultipliers,
};

#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoseMatchMethod {
    /// Search the candidates proposed by a [`CandidateFilter`], if one is available
    ///
    /// [`CandidateFilter`]: crate::collaborators::CandidateFilter
    #[default]
    Optimized,
    Linear,
}

#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionMethod {
    /// Jump straight to the new pose
    Cut,
    /// Crossfade from the playing channels into the new pose
    Blend,
    /// Cut, and ask the inertialization collaborator to smooth it out
    #[default]
    Inertialization,
}

#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PastTrajectoryMode {
    /// Past samples of the desired trajectory are supplied by the caller
    #[default]
    ActualHistory,
    /// Past samples are overwritten from the current pose before searching
    CopyFromCurrentPose,
}

#[derive(Reflect, Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WinnerSuppression {
    pub time_threshold: f32,
    pub blend_space_distance_sq: f32,
}

impl Default for WinnerSuppression {
    fn default() -> Self {
        Self {
            time_threshold: 0.25,
            blend_space_distance_sq: 1.0,
        }
    }
}

impl From<WinnerSuppression> for EquivalenceThresholds {
    fn from(value: WinnerSuppression) -> Self {
        Self {
            time: value.time_threshold,
            blend_space_distance_sq: value.blend_space_distance_sq,
        }
    }
}

/// Tuning of a motion matcher. Loaded from `*.mmsettings.ron` files.
#[derive(Asset, Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionMatchingSettings {
    /// Seconds of (playback rate scaled) time between searches
    pub update_interval: f32,
    pub playback_rate: f32,
    pub blend_time: f32,
    /// 0 favours pose continuity, 1 favours trajectory responsiveness
    pub quality_vs_responsiveness: f32,
    /// Force a search early enough for a non-looping clip to finish blending out before it ends
    pub blend_out_early: bool,
    pub pose_match_method: PoseMatchMethod,
    pub transition_method: TransitionMethod,
    pub past_trajectory_mode: PastTrajectoryMode,
    pub blend_trajectory: bool,
    pub trajectory_blend_magnitude: f32,
    pub favour_current_pose: bool,
    pub current_pose_favour: f32,
    pub enable_tolerance_test: bool,
    pub position_tolerance: f32,
    /// Degrees per second of prediction time
    pub rotation_tolerance: f32,
    pub winner_suppression: WinnerSuppression,
    pub distance_match_end_epsilon: f32,
    pub required_traits: PoseTraits,
    /// Overrides the calibration stored in the pose database
    pub user_calibration: Option<CalibrationData>,
}

impl Default for MotionMatchingSettings {
    fn default() -> Self {
        Self {
            update_interval: 0.1,
            playback_rate: 1.0,
            blend_time: 0.3,
            quality_vs_responsiveness: 0.5,
            blend_out_early: true,
            pose_match_method: PoseMatchMethod::Optimized,
            transition_method: TransitionMethod::Inertialization,
            past_trajectory_mode: PastTrajectoryMode::ActualHistory,
            blend_trajectory: false,
            trajectory_blend_magnitude: 1.0,
            favour_current_pose: false,
            current_pose_favour: 0.95,
            enable_tolerance_test: true,
            position_tolerance: 50.0,
            rotation_tolerance: 2.0,
            winner_suppression: WinnerSuppression::default(),
            distance_match_end_epsilon: 0.01,
            required_traits: PoseTraits::default(),
            user_calibration: None,
        }
    }
}

impl MotionMatchingSettings {
    pub fn cost_multipliers(&self) -> CostMultipliers {
        CostMultipliers::from_ratio(self.quality_vs_responsiveness)
    }
}

/// Switches that can be flipped while running, passed along with every update.
#[derive(Reflect, Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeToggles {
    pub distance_matching_enabled: bool,
    pub time_matching_enabled: bool,
    /// Run a linear search after every filtered one and log any disagreement
    pub compare_with_linear: bool,
}

impl Default for RuntimeToggles {
    fn default() -> Self {
        Self {
            distance_matching_enabled: true,
            time_matching_enabled: true,
            compare_with_linear: false,
        }
    }
}
