use bevy::log::trace;

use super::{DistanceMatchPayload, MotionMatcher, MotionMatchingMode};
use crate::{
    pose_database::{PoseDatabase, distance_match::DistanceMatchType},
    search::{
        EquivalenceThresholds, FavouredPose, SearchQuery, is_equivalent_continuation,
        next_pose_within_tolerance,
    },
    settings::{PastTrajectoryMode, PoseMatchMethod, RuntimeToggles},
};

impl MotionMatcher {
    pub(super) fn update_motion_matching_state(
        &mut self,
        database: &PoseDatabase,
        delta_time: f32,
        distance_match: DistanceMatchPayload,
        toggles: RuntimeToggles,
    ) {
        if distance_match.trigger && distance_match.match_type != DistanceMatchType::None {
            self.initialize_distance_matching(database, distance_match);
        } else if self.trigger_transition {
            self.initialize_matched_transition(database);
            self.trigger_transition = false;
        } else {
            self.update_motion_matching(database, delta_time, toggles);
            self.update_blending(delta_time);
        }
    }

    pub(super) fn update_distance_matching_state(
        &mut self,
        database: &PoseDatabase,
        delta_time: f32,
        distance_match: DistanceMatchPayload,
        toggles: RuntimeToggles,
    ) {
        if distance_match.match_type == DistanceMatchType::None {
            self.exit_distance_matching();
            self.initialize_matched_transition(database);
        } else if !self.update_distance_matching(database, delta_time, distance_match) {
            self.exit_distance_matching();
            self.update_motion_matching(database, delta_time, toggles);
            self.update_blending(delta_time);
        }
    }

    pub(super) fn update_motion_action_state(&mut self, delta_time: f32) {
        let step = delta_time * self.settings.playback_rate;
        self.time_since_chosen += step;
        self.time_since_update += step;

        self.update_blending(delta_time);

        let finished = match &mut self.action {
            Some(action) => {
                action.time += step;
                action.time >= action.end_time
            }
            None => true,
        };
        if finished {
            self.mode = MotionMatchingMode::MotionMatching;
            self.action = None;
        }
    }

    fn exit_distance_matching(&mut self) {
        self.mode = MotionMatchingMode::MotionMatching;
        self.distance_match = None;
    }

    fn update_blending(&mut self, delta_time: f32) {
        self.channels.update(
            delta_time,
            self.settings.blend_time,
            self.settings.playback_rate,
        );
    }

    /// Pins the primary channel to the time matching the marker distance. Returns `false` once
    /// the end of the section has been reached.
    fn update_distance_matching(
        &mut self,
        database: &PoseDatabase,
        delta_time: f32,
        distance_match: DistanceMatchPayload,
    ) -> bool {
        self.update_blending(delta_time);

        let Some(active) = &mut self.distance_match else {
            return false;
        };
        let Some(section) = database
            .distance_match_groups
            .get(&active.identifier)
            .and_then(|group| group.sections.get(active.section))
        else {
            return false;
        };

        active.time =
            section.find_matching_time(distance_match.marker_distance, &mut active.last_key);
        if let Some(primary) = self.channels.primary_mut() {
            primary.anim_time = active.time;
        }

        (active.time - section.end_time).abs() >= self.settings.distance_match_end_epsilon
    }

    fn update_motion_matching(
        &mut self,
        database: &PoseDatabase,
        delta_time: f32,
        toggles: RuntimeToggles,
    ) {
        self.force_search = false;
        let step = delta_time * self.settings.playback_rate;
        self.time_since_chosen += step;
        self.time_since_update += step;

        if let Some(primary) = self.channels.primary()
            && !primary.looping
        {
            let blend_out = if self.settings.blend_out_early {
                self.settings.blend_time * primary.weight * self.settings.playback_rate
            } else {
                0.0
            };
            if self.time_since_chosen + primary.start_time + blend_out > primary.anim_length {
                self.force_search = true;
            }
        }

        let recorded = self
            .collaborators
            .pose_recorder
            .as_ref()
            .map(|recorder| recorder.motion_pose());
        self.compute_current_pose(database, recorded.as_ref());

        if self.current_pose.do_not_use {
            self.force_search = true;
        }

        if self.settings.past_trajectory_mode == PastTrajectoryMode::CopyFromCurrentPose {
            for ((time, desired), current) in database
                .trajectory_times
                .iter()
                .zip(&mut self.desired_trajectory)
                .zip(&self.current_pose.trajectory)
            {
                if *time > 0.0 {
                    break;
                }
                *desired = *current;
            }
        }

        if self.time_since_update >= self.settings.update_interval || self.force_search {
            self.time_since_update = 0.0;
            self.schedule_pose_search(database, toggles);
        }
    }

    fn schedule_pose_search(&mut self, database: &PoseDatabase, toggles: RuntimeToggles) {
        if self.settings.blend_trajectory {
            self.apply_trajectory_blending(database);
        }

        self.current_chosen_pose = self
            .current_chosen_pose
            .min(database.poses.len().saturating_sub(1));
        let next = database.next_or_self(self.current_chosen_pose);

        if !self.force_search
            && self.settings.enable_tolerance_test
            && next_pose_within_tolerance(
                database.pose_clamped(next),
                &self.desired_trajectory,
                &database.trajectory_times,
                self.settings.required_traits,
                self.settings.position_tolerance,
                self.settings.rotation_tolerance,
            )
        {
            self.time_since_update = 0.0;
            return;
        }

        let Some(calibration) = self.final_calibration() else {
            trace!(
                "No calibration for traits {:?}, skipping pose search",
                self.settings.required_traits
            );
            return;
        };

        let query = SearchQuery::new(
            &self.current_pose,
            &self.desired_trajectory,
            calibration,
            self.settings.required_traits,
        )
        .with_multipliers(self.settings.cost_multipliers())
        .with_favoured(self.settings.favour_current_pose.then_some(FavouredPose {
            pose: next,
            factor: self.settings.current_pose_favour,
        }));

        let result = match self.pose_match_method {
            PoseMatchMethod::Optimized => {
                let result = query.lowest_cost_filtered(
                    database,
                    self.collaborators.candidate_filter.as_deref(),
                );
                if toggles.compare_with_linear {
                    query.compare_with_linear(database, result);
                }
                result
            }
            PoseMatchMethod::Linear => query.lowest_cost_linear(database),
        };

        let Some(best) = result else {
            return;
        };

        let thresholds: EquivalenceThresholds = self.settings.winner_suppression.into();
        let best_pose = database.pose_clamped(best.pose);
        if is_equivalent_continuation(best_pose, &self.current_pose, thresholds)
            || is_equivalent_continuation(
                best_pose,
                database.pose_clamped(self.current_chosen_pose),
                thresholds,
            )
        {
            return;
        }

        self.transition_to_pose(database, best.pose, 0.0);
    }
}
