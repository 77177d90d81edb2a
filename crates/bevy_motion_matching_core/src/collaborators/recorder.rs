use std::sync::RwLock;

use bevy::prelude::*;

use super::PoseRecorder;
use crate::pose_database::JointFeature;

/// Velocities are computed over at least this much time.
const MIN_DELTA_TIME: f32 = 1e-6;

#[derive(Reflect, Clone, Debug, Default, PartialEq)]
pub struct CachedMotionBone {
    pub transform: Transform,
    pub last_transform: Transform,
    pub velocity: Vec3,
}

/// Snapshot of the recorded bones, in character space.
#[derive(Reflect, Clone, Debug, PartialEq)]
pub struct CachedMotionPose {
    pub bones: Vec<CachedMotionBone>,
    pub pose_delta_time: f32,
}

impl Default for CachedMotionPose {
    fn default() -> Self {
        Self {
            bones: Vec::new(),
            pose_delta_time: 0.0001,
        }
    }
}

impl CachedMotionPose {
    /// Stores a new set of transforms, keeping the previous ones for velocity computation.
    /// Bones without a new transform keep their previous one.
    pub fn record(&mut self, transforms: &[Transform], delta_time: f32) {
        if self.bones.len() < transforms.len() {
            self.bones.resize(transforms.len(), CachedMotionBone::default());
        }

        for (bone, transform) in self.bones.iter_mut().zip(transforms) {
            bone.last_transform = bone.transform;
            bone.transform = *transform;
        }

        self.calculate_velocity(delta_time);
    }

    pub fn calculate_velocity(&mut self, delta_time: f32) {
        self.pose_delta_time = delta_time.max(MIN_DELTA_TIME);
        for bone in &mut self.bones {
            bone.velocity = (bone.transform.translation - bone.last_transform.translation)
                / self.pose_delta_time;
        }
    }

    /// Drops all recorded velocity, e.g. after a teleport.
    pub fn squash_velocity(&mut self) {
        for bone in &mut self.bones {
            bone.last_transform = bone.transform;
            bone.velocity = Vec3::ZERO;
        }
    }

    pub fn joint_feature(&self, slot: usize) -> Option<JointFeature> {
        self.bones.get(slot).map(|bone| JointFeature {
            position: bone.transform.translation,
            velocity: bone.velocity,
        })
    }
}

#[derive(Default, Debug)]
struct RecorderState {
    bones: Vec<String>,
    pose: CachedMotionPose,
}

/// Thread safe [`PoseRecorder`] fed by whoever owns the skeleton.
#[derive(Default, Debug)]
pub struct SharedPoseRecorder {
    state: RwLock<RecorderState>,
}

impl SharedPoseRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the recorded bones, in slot order.
    pub fn recorded_bones(&self) -> Vec<String> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .bones
            .clone()
    }

    /// Records character space transforms, one per recorded bone in slot order.
    pub fn record(&self, transforms: &[Transform], delta_time: f32) {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pose
            .record(transforms, delta_time);
    }

    pub fn squash_velocity(&self) {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pose
            .squash_velocity();
    }
}

impl PoseRecorder for SharedPoseRecorder {
    fn register_bones_to_record(&self, bones: &[String]) -> Vec<Option<usize>> {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let slots = bones
            .iter()
            .map(|bone| {
                let slot = match state.bones.iter().position(|b| b == bone) {
                    Some(slot) => slot,
                    None => {
                        state.bones.push(bone.clone());
                        state.bones.len() - 1
                    }
                };
                Some(slot)
            })
            .collect();

        let bone_count = state.bones.len();
        state
            .pose
            .bones
            .resize(bone_count, CachedMotionBone::default());

        slots
    }

    fn motion_pose(&self) -> CachedMotionPose {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pose
            .clone()
    }
}
