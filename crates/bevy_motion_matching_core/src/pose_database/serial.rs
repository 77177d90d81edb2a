use serde::{Deserialize, Serialize};

use super::{
    AnimSource, MotionAction, PoseDatabase, PoseFeature, PoseTraits,
    distance_match::DistanceMatchGroup,
};
use crate::calibration::CalibrationData;

#[derive(Serialize, Deserialize, Clone)]
pub struct TraitDeviationsSerial {
    pub traits: PoseTraits,
    pub deviations: CalibrationData,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct PoseDatabaseSerial {
    pub pose_interval: f32,
    pub trajectory_times: Vec<f32>,
    pub pose_bones: Vec<String>,
    pub poses: Vec<PoseFeature>,
    #[serde(default)]
    pub sequences: Vec<AnimSource>,
    #[serde(default)]
    pub blend_spaces: Vec<AnimSource>,
    #[serde(default)]
    pub composites: Vec<AnimSource>,
    #[serde(default)]
    pub actions: Vec<MotionAction>,
    #[serde(default)]
    pub distance_match_groups: Vec<DistanceMatchGroup>,
    #[serde(default)]
    pub feature_deviations: Vec<TraitDeviationsSerial>,
    #[serde(default)]
    pub calibration: Option<CalibrationData>,
}

impl From<PoseDatabaseSerial> for PoseDatabase {
    fn from(value: PoseDatabaseSerial) -> Self {
        Self {
            pose_interval: value.pose_interval,
            trajectory_times: value.trajectory_times,
            pose_bones: value.pose_bones,
            poses: value.poses,
            sequences: value.sequences,
            blend_spaces: value.blend_spaces,
            composites: value.composites,
            actions: value.actions,
            distance_match_groups: value
                .distance_match_groups
                .into_iter()
                .map(|group| (group.identifier, group))
                .collect(),
            feature_deviations: value
                .feature_deviations
                .into_iter()
                .map(|entry| (entry.traits, entry.deviations))
                .collect(),
            calibration: value.calibration,
        }
    }
}

impl From<&PoseDatabase> for PoseDatabaseSerial {
    fn from(value: &PoseDatabase) -> Self {
        let mut feature_deviations: Vec<_> = value
            .feature_deviations
            .iter()
            .map(|(traits, deviations)| TraitDeviationsSerial {
                traits: *traits,
                deviations: deviations.clone(),
            })
            .collect();
        feature_deviations.sort_by_key(|entry| entry.traits);

        Self {
            pose_interval: value.pose_interval,
            trajectory_times: value.trajectory_times.clone(),
            pose_bones: value.pose_bones.clone(),
            poses: value.poses.clone(),
            sequences: value.sequences.clone(),
            blend_spaces: value.blend_spaces.clone(),
            composites: value.composites.clone(),
            actions: value.actions.clone(),
            distance_match_groups: value.distance_match_groups.values().cloned().collect(),
            feature_deviations,
            calibration: value.calibration.clone(),
        }
    }
}
