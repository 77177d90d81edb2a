pub mod distance_match;
pub mod loader;
pub mod serial;

use bevy::{
    asset::Asset,
    math::{Vec2, Vec3},
    platform::collections::HashMap,
    reflect::Reflect,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    calibration::CalibrationData,
    errors::{MotionMatchingError, MotionMatchingResult},
    utils::math::wrap_time,
};
use distance_match::{DistanceMatchGroup, DistanceMatchIdentifier};

/// Dense index of a pose inside its [`PoseDatabase`].
pub type PoseId = usize;

/// A single predicted (or recorded, for negative times) root sample.
#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub position: Vec3,
    /// Facing angle around the up axis, in degrees
    pub facing: f32,
}

impl TrajectoryPoint {
    pub fn new(position: Vec3, facing: f32) -> Self {
        Self { position, facing }
    }
}

/// Character space position and velocity of one matched bone.
#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JointFeature {
    pub position: Vec3,
    pub velocity: Vec3,
}

#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnimSourceType {
    #[default]
    Sequence,
    BlendSpace,
    Composite,
}

/// Opaque tag partitioning the database into mutually exclusive search groups.
#[derive(
    Reflect, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PoseTraits(pub u32);

fn default_one() -> f32 {
    1.0
}

/// Features of one sampled instant of one source animation.
#[derive(Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseFeature {
    pub id: PoseId,
    #[serde(default)]
    pub source_type: AnimSourceType,
    pub source_index: usize,
    pub time: f32,
    #[serde(default)]
    pub mirrored: bool,
    #[serde(default)]
    pub blend_space_position: Vec2,
    pub trajectory: Vec<TrajectoryPoint>,
    pub joints: Vec<JointFeature>,
    pub local_velocity: Vec3,
    pub rotational_velocity: f32,
    #[serde(default = "default_one")]
    pub favour: f32,
    #[serde(default)]
    pub traits: PoseTraits,
    #[serde(default)]
    pub do_not_use: bool,
    pub last_pose: Option<PoseId>,
    pub next_pose: Option<PoseId>,
}

impl Default for PoseFeature {
    fn default() -> Self {
        Self {
            id: 0,
            source_type: AnimSourceType::default(),
            source_index: 0,
            time: 0.0,
            mirrored: false,
            blend_space_position: Vec2::ZERO,
            trajectory: Vec::new(),
            joints: Vec::new(),
            local_velocity: Vec3::ZERO,
            rotational_velocity: 0.0,
            favour: 1.0,
            traits: PoseTraits::default(),
            do_not_use: false,
            last_pose: None,
            next_pose: None,
        }
    }
}

impl PoseFeature {
    /// Whether both poses were sampled from the same source animation.
    pub fn same_source(&self, other: &PoseFeature) -> bool {
        self.source_type == other.source_type && self.source_index == other.source_index
    }

    /// Whether the pose can be returned by a search for the given traits.
    pub fn is_candidate_for(&self, traits: PoseTraits) -> bool {
        !self.do_not_use && self.traits == traits
    }
}

/// One sample of a parametric (blend space) source.
#[derive(Reflect, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BlendSample {
    pub clip: String,
    pub position: Vec2,
}

/// A source animation the database was sampled from.
#[derive(Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimSource {
    pub name: String,
    pub duration: f32,
    #[serde(default)]
    pub looping: bool,
    #[serde(default = "default_one")]
    pub play_rate: f32,
    /// Only used for blend space sources
    #[serde(default)]
    pub blend_samples: Vec<BlendSample>,
}

impl AnimSource {
    /// Advances a playback time by `delta`, wrapping looping sources and clamping the others.
    pub fn advance(&self, time: f32, delta: f32) -> f32 {
        let time = time + delta;
        if self.looping {
            wrap_time(time, self.duration)
        } else {
            time.clamp(0.0, self.duration)
        }
    }
}

impl Default for AnimSource {
    fn default() -> Self {
        Self {
            name: String::new(),
            duration: 0.0,
            looping: false,
            play_rate: 1.0,
            blend_samples: Vec::new(),
        }
    }
}

/// A scripted action: the pose at which the action's key moment happens.
#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionAction {
    pub action_id: u32,
    pub pose_id: PoseId,
    pub time: f32,
}

/// Read-only database of pose features, produced by an offline preprocessing step.
#[derive(Asset, Reflect, Clone, Debug, Default)]
pub struct PoseDatabase {
    pub pose_interval: f32,
    pub trajectory_times: Vec<f32>,
    pub pose_bones: Vec<String>,
    pub poses: Vec<PoseFeature>,
    pub sequences: Vec<AnimSource>,
    pub blend_spaces: Vec<AnimSource>,
    pub composites: Vec<AnimSource>,
    pub actions: Vec<MotionAction>,
    #[reflect(ignore)]
    pub distance_match_groups: IndexMap<DistanceMatchIdentifier, DistanceMatchGroup>,
    /// Per-trait feature standard deviations, used to normalize calibrations
    #[reflect(ignore)]
    pub feature_deviations: HashMap<PoseTraits, CalibrationData>,
    /// Calibration used when the matcher settings do not provide one
    pub calibration: Option<CalibrationData>,
}

impl PoseDatabase {
    pub fn trajectory_len(&self) -> usize {
        self.trajectory_times.len()
    }

    pub fn joint_len(&self) -> usize {
        self.pose_bones.len()
    }

    /// Time of the furthest prediction sample, or zero with no future samples.
    pub fn trajectory_horizon(&self) -> f32 {
        self.trajectory_times
            .iter()
            .copied()
            .fold(0.0, f32::max)
    }

    pub fn pose(&self, id: PoseId) -> Option<&PoseFeature> {
        self.poses.get(id)
    }

    /// Returns the pose with the given id clamped into the valid range.
    ///
    /// Must not be called on an empty database.
    pub fn pose_clamped(&self, id: PoseId) -> &PoseFeature {
        &self.poses[id.min(self.poses.len().saturating_sub(1))]
    }

    pub fn source(&self, source_type: AnimSourceType, index: usize) -> Option<&AnimSource> {
        match source_type {
            AnimSourceType::Sequence => self.sequences.get(index),
            AnimSourceType::BlendSpace => self.blend_spaces.get(index),
            AnimSourceType::Composite => self.composites.get(index),
        }
    }

    /// Length in seconds of the given source, zero if it does not exist.
    pub fn source_length(&self, source_type: AnimSourceType, index: usize) -> f32 {
        self.source(source_type, index)
            .map(|s| s.duration)
            .unwrap_or(0.0)
    }

    /// Walks `steps` links forwards (positive) or backwards (negative) from `from`, stopping
    /// early at the ends of the source's chain.
    pub fn step_from(&self, from: PoseId, steps: i32) -> PoseId {
        let mut current = from.min(self.poses.len().saturating_sub(1));
        for _ in 0..steps.unsigned_abs() {
            let Some(pose) = self.poses.get(current) else {
                break;
            };
            let link = if steps > 0 {
                pose.next_pose
            } else {
                pose.last_pose
            };
            match link {
                Some(next) => current = next,
                None => break,
            }
        }
        current
    }

    /// The pose that naturally follows `id` in its source, or `id` itself at the end.
    pub fn next_or_self(&self, id: PoseId) -> PoseId {
        self.poses
            .get(id)
            .and_then(|p| p.next_pose)
            .unwrap_or(id)
    }

    /// Checks the structural invariants of the database.
    pub fn validate(&self) -> MotionMatchingResult<()> {
        if self.pose_interval <= 0.0 {
            return Err(MotionMatchingError::InvalidPoseInterval(self.pose_interval));
        }

        if self.poses.is_empty() {
            return Err(MotionMatchingError::EmptyPoseDatabase);
        }

        let expected_trajectory = self.trajectory_len();
        let expected_joints = self.joint_len();

        for (index, pose) in self.poses.iter().enumerate() {
            if pose.id != index {
                return Err(MotionMatchingError::PoseIdMismatch {
                    pose: index,
                    id: pose.id,
                });
            }

            if pose.trajectory.len() != expected_trajectory || pose.joints.len() != expected_joints
            {
                return Err(MotionMatchingError::FeatureLengthMismatch {
                    pose: index,
                    trajectory: pose.trajectory.len(),
                    joints: pose.joints.len(),
                    expected_trajectory,
                    expected_joints,
                });
            }

            if self.source(pose.source_type, pose.source_index).is_none() {
                return Err(MotionMatchingError::MissingSource {
                    pose: index,
                    source_type: pose.source_type,
                    index: pose.source_index,
                });
            }

            for target in [pose.last_pose, pose.next_pose].into_iter().flatten() {
                let linked_ok = self
                    .poses
                    .get(target)
                    .is_some_and(|linked| linked.same_source(pose));
                if !linked_ok {
                    return Err(MotionMatchingError::InvalidPoseLink {
                        pose: index,
                        target,
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Builds a database with a single non-looping sequence sampled into `count` linked poses.
    pub fn linear_database(count: usize, trajectory_len: usize, joint_len: usize) -> PoseDatabase {
        let pose_interval = 0.1;
        let poses = (0..count)
            .map(|i| PoseFeature {
                id: i,
                time: i as f32 * pose_interval,
                trajectory: vec![TrajectoryPoint::default(); trajectory_len],
                joints: vec![JointFeature::default(); joint_len],
                last_pose: i.checked_sub(1),
                next_pose: (i + 1 < count).then_some(i + 1),
                ..Default::default()
            })
            .collect();

        PoseDatabase {
            pose_interval,
            trajectory_times: (0..trajectory_len)
                .map(|i| (i as f32 + 1.0) * 0.5)
                .collect(),
            pose_bones: (0..joint_len).map(|i| format!("bone_{i}")).collect(),
            poses,
            sequences: vec![AnimSource {
                name: "walk".into(),
                duration: count as f32 * pose_interval,
                looping: false,
                ..Default::default()
            }],
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{test_support::linear_database, *};

    #[test]
    fn test_valid_database() {
        let db = linear_database(5, 3, 2);
        assert_eq!(db.validate(), Ok(()));
    }

    #[test]
    fn test_empty_database_is_rejected() {
        let mut db = linear_database(1, 3, 2);
        db.poses.clear();
        assert_eq!(db.validate(), Err(MotionMatchingError::EmptyPoseDatabase));
    }

    #[test]
    fn test_link_across_sources_is_rejected() {
        let mut db = linear_database(4, 3, 2);
        db.sequences.push(AnimSource::default());
        db.poses[3].source_index = 1;
        db.poses[3].last_pose = None;

        assert_eq!(
            db.validate(),
            Err(MotionMatchingError::InvalidPoseLink { pose: 2, target: 3 })
        );
    }

    #[test]
    fn test_feature_length_mismatch_is_rejected() {
        let mut db = linear_database(3, 3, 2);
        db.poses[1].trajectory.pop();

        assert!(matches!(
            db.validate(),
            Err(MotionMatchingError::FeatureLengthMismatch { pose: 1, .. })
        ));
    }

    #[test]
    fn test_step_from_stops_at_chain_ends() {
        let db = linear_database(5, 1, 0);

        assert_eq!(db.step_from(1, 2), 3);
        assert_eq!(db.step_from(1, 10), 4);
        assert_eq!(db.step_from(3, -1), 2);
        assert_eq!(db.step_from(3, -10), 0);
        assert_eq!(db.next_or_self(4), 4);
    }
}
