use super::MotionMatcher;
use crate::{
    blend_channels::BlendChannel,
    collaborators::CachedMotionPose,
    interpolation::linear::InterpolateLinear,
    pose_database::{PoseDatabase, PoseId},
    settings::TransitionMethod,
    utils::math::wrap_time,
};

/// Times closer to zero than this count as playing forwards.
const BACKWARD_EPSILON: f32 = 1e-5;

/// Where a channel is within its source after `time_passed` seconds of playback, resolved to a
/// pose and an interpolation factor towards its neighbour.
struct ChannelPosition {
    time_passed: f32,
    /// Poses to step back from the start pose, set when the end of a one-shot source was hit
    step_back: i32,
}

impl ChannelPosition {
    /// Resolves `time_passed` against the channel's source, wrapping looping sources and
    /// clamping one-shot ones. `end_lookback` is how close to the end a one-shot source must
    /// be for the last pose to be skipped.
    fn resolve(
        channel: &BlendChannel,
        time_passed: f32,
        current_time: f32,
        end_lookback: f32,
    ) -> Self {
        if current_time < channel.anim_length {
            return Self {
                time_passed,
                step_back: 0,
            };
        }

        let (new_time, step_back) = if channel.looping {
            (wrap_time(current_time, channel.anim_length), 0)
        } else {
            let time_to_end = channel.anim_length - (time_passed + channel.start_time);
            (channel.anim_length, i32::from(time_to_end < end_lookback))
        };

        Self {
            time_passed: new_time - channel.start_time,
            step_back,
        }
    }

    fn is_backward(&self) -> bool {
        self.time_passed < -BACKWARD_EPSILON
    }

    fn steps(&self, pose_interval: f32) -> i32 {
        let steps = self.time_passed / pose_interval;
        if self.is_backward() {
            steps.ceil() as i32
        } else {
            steps.floor() as i32
        }
    }
}

impl MotionMatcher {
    /// Rebuilds the current pose features from the channel pool.
    ///
    /// The chosen pose follows the primary channel. The interpolated features follow the
    /// dominant one, between the two database poses that bracket its playback time. Joint
    /// features are then overridden by `recorded` where a bone mapping exists.
    pub(super) fn compute_current_pose(
        &mut self,
        database: &PoseDatabase,
        recorded: Option<&CachedMotionPose>,
    ) {
        let pose_interval = database.pose_interval.max(0.01);

        let Some(primary) = self.channels.primary() else {
            return;
        };
        let chosen = ChannelPosition::resolve(
            primary,
            self.time_since_chosen,
            primary.anim_time,
            pose_interval / 2.0,
        );
        self.current_chosen_pose = database.step_from(
            primary.start_pose,
            chosen.steps(pose_interval) - chosen.step_back,
        );

        let Some(dominant) = self.channels.dominant() else {
            return;
        };
        let time_passed = match self.settings.transition_method {
            TransitionMethod::Blend => dominant.age,
            _ => self.time_since_chosen,
        };
        let position = ChannelPosition::resolve(
            dominant,
            time_passed,
            dominant.start_time + time_passed,
            pose_interval,
        );
        let steps = position.steps(pose_interval);
        let base = database.step_from(dominant.start_pose, steps - position.step_back);
        let fraction = position.time_passed / pose_interval - steps as f32;

        let (before, after, factor): (PoseId, PoseId, f32) = if position.is_backward() {
            let before = database
                .pose(base)
                .and_then(|pose| pose.last_pose)
                .unwrap_or(base);
            (before, base, 1.0 - fraction.abs())
        } else {
            (base, database.next_or_self(base), fraction)
        };

        let mut pose = database.pose_clamped(before).interpolate_linear(
            database.pose_clamped(after),
            factor.clamp(0.0, 1.0),
        );

        if let Some(recorded) = recorded {
            for (joint, slot) in pose.joints.iter_mut().zip(&self.bone_remap) {
                if let Some(slot) = slot
                    && let Some(feature) = recorded.joint_feature(*slot)
                {
                    *joint = feature;
                }
            }
        }

        self.current_pose = pose;
    }
}
