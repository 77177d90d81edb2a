use crate::{
    calibration::CalibrationData,
    pose_database::{JointFeature, PoseFeature, TrajectoryPoint},
    utils::math::delta_angle,
};

/// Scales pose and trajectory cost terms from a single quality vs responsiveness ratio.
///
/// A ratio of `0.5` leaves both at one. Higher ratios favour trajectory (responsiveness),
/// lower ratios favour pose continuity (quality).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CostMultipliers {
    pub pose: f32,
    pub trajectory: f32,
}

impl Default for CostMultipliers {
    fn default() -> Self {
        Self::UNIT
    }
}

impl CostMultipliers {
    pub const UNIT: Self = Self {
        pose: 1.0,
        trajectory: 1.0,
    };

    pub fn from_ratio(ratio: f32) -> Self {
        let ratio = ratio.clamp(0.0, 1.0);
        Self {
            pose: (1.0 - ratio) * 2.0,
            trajectory: ratio * 2.0,
        }
    }
}

pub fn momentum_cost(
    current: &PoseFeature,
    candidate: &PoseFeature,
    calibration: &CalibrationData,
) -> f32 {
    current.local_velocity.distance_squared(candidate.local_velocity) * calibration.momentum
}

pub fn angular_cost(
    current: &PoseFeature,
    candidate: &PoseFeature,
    calibration: &CalibrationData,
) -> f32 {
    (current.rotational_velocity - candidate.rotational_velocity).abs()
        * calibration.angular_momentum
}

pub fn trajectory_cost(
    desired: &[TrajectoryPoint],
    candidate: &[TrajectoryPoint],
    calibration: &CalibrationData,
) -> f32 {
    desired
        .iter()
        .zip(candidate)
        .zip(&calibration.trajectory)
        .map(|((desired, candidate), weights)| {
            desired.position.distance_squared(candidate.position) * weights.position
                + delta_angle(candidate.facing, desired.facing).abs() * weights.facing
        })
        .sum()
}

pub fn joint_cost(
    current: &[JointFeature],
    candidate: &[JointFeature],
    calibration: &CalibrationData,
) -> f32 {
    current
        .iter()
        .zip(candidate)
        .zip(&calibration.joints)
        .map(|((current, candidate), weights)| {
            current.velocity.distance_squared(candidate.velocity) * weights.velocity
                + current.position.distance_squared(candidate.position) * weights.position
        })
        .sum()
}

/// Full cost of a candidate without early outs or favour policies.
pub fn pose_cost(
    current: &PoseFeature,
    desired: &[TrajectoryPoint],
    candidate: &PoseFeature,
    calibration: &CalibrationData,
    multipliers: CostMultipliers,
) -> f32 {
    (momentum_cost(current, candidate, calibration) + angular_cost(current, candidate, calibration))
        * multipliers.pose
        + trajectory_cost(desired, &candidate.trajectory, calibration) * multipliers.trajectory
        + joint_cost(&current.joints, &candidate.joints, calibration) * multipliers.pose
}

#[cfg(test)]
mod tests {
    use bevy::math::Vec3;

    use super::*;

    #[test]
    fn test_multipliers_from_ratio() {
        assert_eq!(CostMultipliers::from_ratio(0.5), CostMultipliers::UNIT);
        assert_eq!(
            CostMultipliers::from_ratio(1.0),
            CostMultipliers {
                pose: 0.0,
                trajectory: 2.0
            }
        );
        assert_eq!(CostMultipliers::from_ratio(-1.0).pose, 2.0);
    }

    #[test]
    fn test_trajectory_cost_uses_shortest_angle() {
        let calibration = CalibrationData::uniform(1, 0, 1.0);
        let desired = [TrajectoryPoint::new(Vec3::ZERO, 175.0)];
        let candidate = [TrajectoryPoint::new(Vec3::new(0.0, 0.0, 2.0), -175.0)];

        let cost = trajectory_cost(&desired, &candidate, &calibration);

        assert!((cost - 14.0).abs() < 1e-4);
    }
}
