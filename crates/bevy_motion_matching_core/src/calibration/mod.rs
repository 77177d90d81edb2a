use bevy::reflect::Reflect;
use serde::{Deserialize, Serialize};

/// Deviations below this are treated as constant features and left unnormalized.
const MIN_DEVIATION: f32 = 1e-5;

#[derive(Reflect, Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryWeights {
    pub position: f32,
    pub facing: f32,
}

impl Default for TrajectoryWeights {
    fn default() -> Self {
        Self {
            position: 1.0,
            facing: 1.0,
        }
    }
}

#[derive(Reflect, Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct JointWeights {
    pub position: f32,
    pub velocity: f32,
}

impl Default for JointWeights {
    fn default() -> Self {
        Self {
            position: 1.0,
            velocity: 1.0,
        }
    }
}

/// A set of per-feature scalars in the shape of a pose feature.
///
/// The same shape is used for authored weights, for the per-trait standard deviations computed
/// offline, and for the final weights the cost function consumes.
#[derive(Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationData {
    pub momentum: f32,
    pub angular_momentum: f32,
    pub trajectory: Vec<TrajectoryWeights>,
    pub joints: Vec<JointWeights>,
}

impl Default for CalibrationData {
    fn default() -> Self {
        Self {
            momentum: 1.0,
            angular_momentum: 1.0,
            trajectory: Vec::new(),
            joints: Vec::new(),
        }
    }
}

impl CalibrationData {
    /// Every weight set to `value`.
    pub fn uniform(trajectory_len: usize, joint_len: usize, value: f32) -> Self {
        Self {
            momentum: value,
            angular_momentum: value,
            trajectory: vec![
                TrajectoryWeights {
                    position: value,
                    facing: value
                };
                trajectory_len
            ],
            joints: vec![
                JointWeights {
                    position: value,
                    velocity: value
                };
                joint_len
            ],
        }
    }

    pub fn is_valid_with(&self, trajectory_len: usize, joint_len: usize) -> bool {
        self.trajectory.len() == trajectory_len && self.joints.len() == joint_len
    }

    /// Pads or truncates the per-point and per-joint weights to the given lengths.
    pub fn validate_data(&mut self, trajectory_len: usize, joint_len: usize) {
        self.trajectory
            .resize(trajectory_len, TrajectoryWeights::default());
        self.joints.resize(joint_len, JointWeights::default());
    }

    /// Divides each authored weight by the matching feature deviation so features with large
    /// natural ranges do not dominate the cost. Weights are clamped to be non-negative.
    pub fn generate_final_weights(&self, deviations: &CalibrationData) -> CalibrationData {
        fn normalize(weight: f32, deviation: f32) -> f32 {
            let weight = weight.max(0.0);
            if deviation > MIN_DEVIATION {
                weight / deviation
            } else {
                weight
            }
        }

        CalibrationData {
            momentum: normalize(self.momentum, deviations.momentum),
            angular_momentum: normalize(self.angular_momentum, deviations.angular_momentum),
            trajectory: self
                .trajectory
                .iter()
                .enumerate()
                .map(|(i, w)| {
                    let dev = deviations.trajectory.get(i).copied().unwrap_or(TrajectoryWeights {
                        position: 0.0,
                        facing: 0.0,
                    });
                    TrajectoryWeights {
                        position: normalize(w.position, dev.position),
                        facing: normalize(w.facing, dev.facing),
                    }
                })
                .collect(),
            joints: self
                .joints
                .iter()
                .enumerate()
                .map(|(i, w)| {
                    let dev = deviations.joints.get(i).copied().unwrap_or(JointWeights {
                        position: 0.0,
                        velocity: 0.0,
                    });
                    JointWeights {
                        position: normalize(w.position, dev.position),
                        velocity: normalize(w.velocity, dev.velocity),
                    }
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_weights_divide_by_deviation() {
        let user = CalibrationData::uniform(2, 1, 2.0);
        let mut deviations = CalibrationData::uniform(2, 1, 4.0);
        deviations.joints[0].velocity = 0.0;

        let final_weights = user.generate_final_weights(&deviations);

        assert_eq!(final_weights.momentum, 0.5);
        assert_eq!(final_weights.trajectory[1].facing, 0.5);
        assert_eq!(final_weights.joints[0].position, 0.5);
        // Constant feature, weight left as authored
        assert_eq!(final_weights.joints[0].velocity, 2.0);
    }

    #[test]
    fn test_negative_weights_are_clamped() {
        let mut user = CalibrationData::uniform(1, 0, 1.0);
        user.momentum = -3.0;

        let final_weights = user.generate_final_weights(&CalibrationData::uniform(1, 0, 1.0));

        assert_eq!(final_weights.momentum, 0.0);
    }

    #[test]
    fn test_validate_data_resizes() {
        let mut calibration = CalibrationData::uniform(1, 3, 0.5);
        assert!(!calibration.is_valid_with(3, 2));

        calibration.validate_data(3, 2);

        assert!(calibration.is_valid_with(3, 2));
        assert_eq!(calibration.trajectory[2], TrajectoryWeights::default());
        assert_eq!(calibration.joints[1].position, 0.5);
    }
}
