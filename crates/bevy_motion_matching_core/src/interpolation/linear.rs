use bevy::prelude::*;

use crate::{
    pose_database::{JointFeature, PoseFeature, TrajectoryPoint},
    utils::math::{delta_angle, wrap_degrees},
};

pub trait InterpolateLinear {
    fn interpolate_linear(&self, other: &Self, f: f32) -> Self;
}

impl InterpolateLinear for f32 {
    fn interpolate_linear(&self, other: &Self, f: f32) -> Self {
        self + (other - self) * f
    }
}

impl InterpolateLinear for Vec2 {
    fn interpolate_linear(&self, other: &Self, f: f32) -> Self {
        self.lerp(*other, f)
    }
}

impl InterpolateLinear for Vec3 {
    fn interpolate_linear(&self, other: &Self, f: f32) -> Self {
        self.lerp(*other, f)
    }
}

/// Facing follows the shortest arc between both angles.
impl InterpolateLinear for TrajectoryPoint {
    fn interpolate_linear(&self, other: &Self, f: f32) -> Self {
        TrajectoryPoint {
            position: self.position.interpolate_linear(&other.position, f),
            facing: wrap_degrees(self.facing + delta_angle(self.facing, other.facing) * f),
        }
    }
}

impl InterpolateLinear for JointFeature {
    fn interpolate_linear(&self, other: &Self, f: f32) -> Self {
        JointFeature {
            position: self.position.interpolate_linear(&other.position, f),
            velocity: self.velocity.interpolate_linear(&other.velocity, f),
        }
    }
}

impl<T: InterpolateLinear + Clone> InterpolateLinear for Vec<T> {
    fn interpolate_linear(&self, other: &Self, f: f32) -> Self {
        self.iter()
            .zip(other)
            .map(|(a, b)| a.interpolate_linear(b, f))
            .collect()
    }
}

/// Continuous features are interpolated, discrete ones (source, traits, links, flags) are
/// taken from `self`.
impl InterpolateLinear for PoseFeature {
    fn interpolate_linear(&self, other: &Self, f: f32) -> Self {
        PoseFeature {
            time: self.time.interpolate_linear(&other.time, f),
            blend_space_position: self
                .blend_space_position
                .interpolate_linear(&other.blend_space_position, f),
            trajectory: self.trajectory.interpolate_linear(&other.trajectory, f),
            joints: self.joints.interpolate_linear(&other.joints, f),
            local_velocity: self
                .local_velocity
                .interpolate_linear(&other.local_velocity, f),
            rotational_velocity: self
                .rotational_velocity
                .interpolate_linear(&other.rotational_velocity, f),
            favour: self.favour.interpolate_linear(&other.favour, f),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facing_wraps_across_180() {
        let a = TrajectoryPoint::new(Vec3::ZERO, 170.0);
        let b = TrajectoryPoint::new(Vec3::X, -170.0);

        let mid = a.interpolate_linear(&b, 0.5);

        assert!((mid.facing.abs() - 180.0).abs() < 1e-4);
        assert_eq!(mid.position, Vec3::new(0.5, 0.0, 0.0));
    }

    #[test]
    fn test_pose_keeps_discrete_fields_of_self() {
        let a = PoseFeature {
            id: 3,
            time: 1.0,
            next_pose: Some(4),
            local_velocity: Vec3::ZERO,
            ..Default::default()
        };
        let b = PoseFeature {
            id: 4,
            time: 1.1,
            mirrored: true,
            local_velocity: Vec3::new(2.0, 0.0, 0.0),
            ..Default::default()
        };

        let lerped = a.interpolate_linear(&b, 0.25);

        assert_eq!(lerped.id, 3);
        assert!(!lerped.mirrored);
        assert_eq!(lerped.next_pose, Some(4));
        assert!((lerped.time - 1.025).abs() < 1e-6);
        assert_eq!(lerped.local_velocity, Vec3::new(0.5, 0.0, 0.0));
    }
}
