use bevy::log::{error, trace};

use super::{
    ActiveAction, ActiveDistanceMatch, DistanceMatchPayload, MotionActionPayload, MotionMatcher,
    MotionMatchingMode,
};
use crate::{
    blend_channels::{BlendChannel, BlendStatus},
    pose_database::{PoseDatabase, PoseId, distance_match::DistanceMatchIdentifier},
    search::{
        SearchQuery,
        cost::{joint_cost, pose_cost},
    },
    settings::TransitionMethod,
};

impl MotionMatcher {
    /// Immediately plays `pose`, `time_offset` seconds from its start, dropping every other
    /// channel.
    pub fn jump_to_pose(&mut self, database: &PoseDatabase, pose: PoseId, time_offset: f32) {
        self.time_since_chosen = self.time_since_update;
        self.current_chosen_pose = pose;

        if let Some(channel) = self.channel_for(database, pose, BlendStatus::Dominant, time_offset)
        {
            self.channels.cut(channel);
        }
    }

    fn blend_to_pose(&mut self, database: &PoseDatabase, pose: PoseId, time_offset: f32) {
        self.time_since_chosen = self.time_since_update;
        self.current_chosen_pose = pose;

        if let Some(channel) = self.channel_for(database, pose, BlendStatus::Chosen, time_offset) {
            self.channels.crossfade(channel);
        }
    }

    fn channel_for(
        &self,
        database: &PoseDatabase,
        pose: PoseId,
        status: BlendStatus,
        time_offset: f32,
    ) -> Option<BlendChannel> {
        let pose = database.pose(pose)?;
        let Some(source) = database.source(pose.source_type, pose.source_index) else {
            error!(
                "Pose {} refers to missing {:?} source {}",
                pose.id, pose.source_type, pose.source_index
            );
            return None;
        };
        Some(BlendChannel::new(pose, source, status, time_offset))
    }

    /// Switches playback to `pose` using the configured transition method.
    pub(super) fn transition_to_pose(
        &mut self,
        database: &PoseDatabase,
        pose: PoseId,
        time_offset: f32,
    ) {
        match self.settings.transition_method {
            TransitionMethod::Cut => self.jump_to_pose(database, pose, time_offset),
            TransitionMethod::Blend => self.blend_to_pose(database, pose, time_offset),
            TransitionMethod::Inertialization => {
                self.jump_to_pose(database, pose, time_offset);

                match &self.collaborators.inertialization {
                    Some(requester) => {
                        requester.request_inertialization(self.settings.blend_time)
                    }
                    None if !self.reported_missing_inertialization => {
                        error!(
                            "Motion matcher is set to inertialize transitions, but no inertialization requester was provided. Transitions will cut instead."
                        );
                        self.reported_missing_inertialization = true;
                    }
                    None => {}
                }
            }
        }
    }

    /// Picks up playback from the observed pose after the matcher has been re-entered.
    pub(super) fn initialize_matched_transition(&mut self, database: &PoseDatabase) {
        self.time_since_chosen = 0.0;
        self.time_since_update = 0.0;

        let Some(recorder) = self.collaborators.pose_recorder.clone() else {
            self.jump_to_pose(database, 0, 0.0);
            return;
        };

        let recorded = recorder.motion_pose();
        self.compute_current_pose(database, Some(&recorded));

        let best = self
            .final_calibration()
            .and_then(|calibration| {
                SearchQuery::new(
                    &self.current_pose,
                    &self.desired_trajectory,
                    calibration,
                    self.settings.required_traits,
                )
                .lowest_cost_global(database)
            })
            .map_or(self.current_chosen_pose, |result| result.pose);

        let best = best.min(database.poses.len().saturating_sub(1));
        self.jump_to_pose(database, best, 0.0);
    }

    /// Enters distance matching on the section whose matched pose is cheapest to switch to.
    pub(super) fn initialize_distance_matching(
        &mut self,
        database: &PoseDatabase,
        payload: DistanceMatchPayload,
    ) {
        if self.settings.blend_trajectory {
            self.apply_trajectory_blending(database);
        }

        let identifier = DistanceMatchIdentifier::new(payload.match_type, payload.basis);
        let Some(group) = database.distance_match_groups.get(&identifier) else {
            trace!("No distance match group for {identifier:?}");
            return;
        };
        let Some(calibration) = self.final_calibration() else {
            trace!(
                "No calibration for traits {:?}",
                self.settings.required_traits
            );
            return;
        };

        let multipliers = self.settings.cost_multipliers();
        let mut best: Option<(ActiveDistanceMatch, PoseId, f32)> = None;

        for (index, section) in group.sections.iter().enumerate() {
            let mut last_key = 0;
            let time = section.find_matching_time(payload.marker_distance, &mut last_key);
            let pose_id = section.pose_at_time(time, database.pose_interval);
            let Some(pose) = database.pose(pose_id) else {
                continue;
            };

            let cost = pose_cost(
                &self.current_pose,
                &self.desired_trajectory,
                pose,
                calibration,
                multipliers,
            ) * pose.favour;

            if best.as_ref().is_none_or(|(_, _, lowest)| cost < *lowest) {
                best = Some((
                    ActiveDistanceMatch {
                        identifier,
                        section: index,
                        time,
                        last_key,
                    },
                    pose_id,
                    cost,
                ));
            }
        }

        let Some((active, pose_id, _)) = best else {
            return;
        };
        let time_offset = active.time - database.pose_clamped(pose_id).time;

        self.distance_match = Some(active);
        self.mode = MotionMatchingMode::DistanceMatching;
        self.transition_to_pose(database, pose_id, time_offset);
    }

    /// Enters an action, starting `lead_length` seconds before its key moment on the candidate
    /// whose pose best continues the current one.
    pub(super) fn initialize_motion_action(
        &mut self,
        database: &PoseDatabase,
        payload: MotionActionPayload,
    ) {
        let pose_offset = (payload.lead_length / database.pose_interval)
            .round()
            .abs() as i32;
        let Some(calibration) = self.final_calibration() else {
            return;
        };

        let mut best: Option<(usize, PoseId, f32)> = None;
        for (index, action) in database.actions.iter().enumerate() {
            if action.action_id != payload.action_id {
                continue;
            }

            let pose_id = database.step_from(action.pose_id, -pose_offset);
            let pose = database.pose_clamped(pose_id);
            let cost = joint_cost(&pose.joints, &self.current_pose.joints, calibration) * pose.favour;

            if best.is_none_or(|(_, _, lowest)| cost < lowest) {
                best = Some((index, pose_id, cost));
            }
        }

        let Some((index, pose_id, _)) = best else {
            trace!("No action with id {}", payload.action_id);
            return;
        };
        let Some(action) = database.actions.get(index) else {
            return;
        };
        let active = ActiveAction {
            index,
            time: action.time - payload.lead_length,
            end_time: action.time + payload.tail_length,
        };

        self.transition_to_pose(database, pose_id, 0.0);
        self.mode = MotionMatchingMode::Action;
        self.action = Some(active);
    }

    /// Pulls the future part of the desired trajectory towards the current pose's, more
    /// strongly for nearer samples.
    pub(super) fn apply_trajectory_blending(&mut self, database: &PoseDatabase) {
        let horizon = database
            .trajectory_times
            .last()
            .copied()
            .unwrap_or(0.0)
            .max(1e-4);
        let magnitude = self.settings.trajectory_blend_magnitude;

        for ((time, desired), current) in database
            .trajectory_times
            .iter()
            .zip(&mut self.desired_trajectory)
            .zip(&self.current_pose.trajectory)
        {
            if *time <= 0.0 {
                continue;
            }
            let progress = ((horizon - time) / horizon) * magnitude;
            desired.position = desired.position.lerp(current.position, progress);
        }
    }
}
