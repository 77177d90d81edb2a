//! The motion matching runtime for one character.

mod current_pose;
mod modes;
mod transitions;

use bevy::{
    log::{error, warn},
    platform::collections::HashMap,
    reflect::Reflect,
};

use crate::{
    blend_channels::{BlendChannelPool, ChannelSample},
    calibration::CalibrationData,
    collaborators::Collaborators,
    errors::{MotionMatchingError, MotionMatchingResult},
    pose_database::{
        JointFeature, PoseDatabase, PoseFeature, PoseId, PoseTraits, TrajectoryPoint,
        distance_match::{DistanceMatchBasis, DistanceMatchIdentifier, DistanceMatchType},
    },
    settings::{MotionMatchingSettings, PoseMatchMethod, RuntimeToggles},
};

#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MotionMatchingMode {
    #[default]
    MotionMatching,
    DistanceMatching,
    Action,
}

/// Request to synchronize playback to the distance from a marker.
#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq)]
pub struct DistanceMatchPayload {
    /// Enter distance matching on this update, if currently motion matching
    pub trigger: bool,
    /// Setting this back to [`DistanceMatchType::None`] leaves distance matching
    pub match_type: DistanceMatchType,
    pub basis: DistanceMatchBasis,
    pub marker_distance: f32,
}

/// Request to play a scripted action. The action is searched for on every update the payload
/// is supplied.
#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq)]
pub struct MotionActionPayload {
    pub action_id: u32,
    /// Seconds of animation to play before the action's key moment
    pub lead_length: f32,
    /// Seconds of animation to play after the action's key moment
    pub tail_length: f32,
}

/// Per-update inputs of a [`MotionMatcher`].
#[derive(Reflect, Clone, Debug, PartialEq)]
pub struct MotionMatchingInput {
    pub delta_time: f32,
    pub desired_trajectory: Vec<TrajectoryPoint>,
    pub distance_match: DistanceMatchPayload,
    pub action: Option<MotionActionPayload>,
    pub final_blend_weight: f32,
    pub toggles: RuntimeToggles,
}

impl Default for MotionMatchingInput {
    fn default() -> Self {
        Self {
            delta_time: 0.0,
            desired_trajectory: Vec::new(),
            distance_match: DistanceMatchPayload::default(),
            action: None,
            final_blend_weight: 1.0,
            toggles: RuntimeToggles::default(),
        }
    }
}

/// Playback bookkeeping reported after each update, for synchronization with other players.
#[derive(Reflect, Clone, Copy, Debug, PartialEq)]
pub struct TickRecord {
    pub effective_play_rate: f32,
    pub time_accumulator: f32,
    pub blend_weight: f32,
}

/// What the downstream evaluator should sample.
#[derive(Reflect, Clone, Debug, Default, PartialEq)]
pub enum PoseOutput {
    /// The matcher cannot evaluate, fall back to the skeleton's rest pose
    #[default]
    RestPose,
    Single(ChannelSample),
    Blend(Vec<ChannelSample>),
}

#[derive(Reflect, Clone, Copy, Debug, PartialEq)]
pub struct ActiveDistanceMatch {
    pub identifier: DistanceMatchIdentifier,
    pub section: usize,
    pub time: f32,
    pub last_key: usize,
}

#[derive(Reflect, Clone, Copy, Debug, PartialEq)]
pub struct ActiveAction {
    pub index: usize,
    pub time: f32,
    pub end_time: f32,
}

/// Selects and plays back poses from a [`PoseDatabase`] to follow a desired trajectory.
///
/// Usage:
/// 1. Create with [`MotionMatcher::new`] and optionally inject collaborators.
/// 2. Call [`MotionMatcher::initialize`] once the database is available, and again whenever
///    the owner is re-entered (this triggers a matched transition).
/// 3. Call [`MotionMatcher::update`] then [`MotionMatcher::evaluate`] every frame.
#[derive(Debug, Default)]
pub struct MotionMatcher {
    settings: MotionMatchingSettings,
    collaborators: Collaborators,
    pose_match_method: PoseMatchMethod,
    mode: MotionMatchingMode,
    channels: BlendChannelPool,
    current_pose: PoseFeature,
    desired_trajectory: Vec<TrajectoryPoint>,
    current_chosen_pose: PoseId,
    time_since_chosen: f32,
    time_since_update: f32,
    force_search: bool,
    distance_match: Option<ActiveDistanceMatch>,
    action: Option<ActiveAction>,
    trigger_transition: bool,
    initialized: bool,
    valid: bool,
    reported_missing_inertialization: bool,
    bone_remap: Vec<Option<usize>>,
    final_calibrations: HashMap<PoseTraits, CalibrationData>,
    activated_pose_count: usize,
}

impl MotionMatcher {
    pub fn new(settings: MotionMatchingSettings) -> Self {
        Self {
            pose_match_method: settings.pose_match_method,
            settings,
            ..Default::default()
        }
    }

    pub fn with_collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = collaborators;
        self
    }

    pub fn settings(&self) -> &MotionMatchingSettings {
        &self.settings
    }

    /// Settings changes that affect validation (calibration, search method) only apply on the
    /// next [`MotionMatcher::activate`].
    pub fn settings_mut(&mut self) -> &mut MotionMatchingSettings {
        &mut self.settings
    }

    pub fn mode(&self) -> MotionMatchingMode {
        self.mode
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Search method in use, which may differ from the configured one after a fallback.
    pub fn pose_match_method(&self) -> PoseMatchMethod {
        self.pose_match_method
    }

    pub fn channels(&self) -> &BlendChannelPool {
        &self.channels
    }

    /// Interpolated features of the pose currently being played.
    pub fn current_pose(&self) -> &PoseFeature {
        &self.current_pose
    }

    pub fn current_chosen_pose(&self) -> PoseId {
        self.current_chosen_pose
    }

    /// Desired trajectory used by the last update, after any blending or past-sample copying.
    pub fn desired_trajectory(&self) -> &[TrajectoryPoint] {
        &self.desired_trajectory
    }

    pub fn active_distance_match(&self) -> Option<&ActiveDistanceMatch> {
        self.distance_match.as_ref()
    }

    pub fn active_action(&self) -> Option<&ActiveAction> {
        self.action.as_ref()
    }

    /// Validates the configuration against `database` and starts playing its first pose.
    ///
    /// On error the matcher stays invalid: updates are skipped and evaluation returns
    /// [`PoseOutput::RestPose`].
    pub fn activate(&mut self, database: Option<&PoseDatabase>) -> MotionMatchingResult<()> {
        self.valid = false;

        let database = database.ok_or(MotionMatchingError::MissingPoseDatabase)?;
        database.validate()?;

        let trajectory_len = database.trajectory_len();
        let joint_len = database.joint_len();
        if database
            .feature_deviations
            .values()
            .any(|deviations| !deviations.is_valid_with(trajectory_len, joint_len))
        {
            return Err(MotionMatchingError::CalibrationMismatch {
                trajectory: trajectory_len,
                joints: joint_len,
            });
        }

        self.pose_match_method = self.settings.pose_match_method;
        if self.pose_match_method == PoseMatchMethod::Optimized
            && !self
                .collaborators
                .candidate_filter
                .as_ref()
                .is_some_and(|filter| filter.is_valid())
        {
            warn!(
                "Motion matcher was set to use optimized search, but no valid candidate filter is available. Falling back to linear search."
            );
            self.pose_match_method = PoseMatchMethod::Linear;
        }

        let mut user_calibration = self
            .settings
            .user_calibration
            .clone()
            .or_else(|| database.calibration.clone())
            .ok_or(MotionMatchingError::MissingCalibration)?;
        user_calibration.validate_data(trajectory_len, joint_len);

        self.final_calibrations = database
            .feature_deviations
            .iter()
            .map(|(traits, deviations)| {
                (*traits, user_calibration.generate_final_weights(deviations))
            })
            .collect();

        self.current_pose = PoseFeature {
            trajectory: vec![TrajectoryPoint::default(); trajectory_len],
            joints: vec![JointFeature::default(); joint_len],
            ..Default::default()
        };
        self.desired_trajectory = vec![TrajectoryPoint::default(); trajectory_len];
        self.mode = MotionMatchingMode::MotionMatching;
        self.distance_match = None;
        self.action = None;
        self.time_since_chosen = 0.0;
        self.time_since_update = 0.0;
        self.activated_pose_count = database.poses.len();

        self.jump_to_pose(database, 0, 0.0);
        self.valid = true;

        Ok(())
    }

    /// (Re)initializes the matcher, activating it first if needed. Calling this on a matcher
    /// that has already been updated arms a matched transition for the next update.
    pub fn initialize(&mut self, database: Option<&PoseDatabase>) -> MotionMatchingResult<()> {
        if !self.valid {
            self.activate(database)?;
        }

        self.mode = MotionMatchingMode::MotionMatching;
        self.distance_match = None;
        self.action = None;

        if self.initialized {
            self.trigger_transition = true;
        }

        Ok(())
    }

    /// Advances the matcher by `input.delta_time`. Returns the tick record for this update, or
    /// `None` if the matcher is not valid.
    pub fn update(
        &mut self,
        database: Option<&PoseDatabase>,
        input: &MotionMatchingInput,
    ) -> Option<TickRecord> {
        let Some(database) = database.filter(|db| {
            self.valid && !self.channels.is_empty() && db.poses.len() == self.activated_pose_count
        }) else {
            error!("Motion matcher failed to update as its setup is not valid");
            return None;
        };

        if !self.initialized {
            self.register_pose_bones(database);
            self.initialized = true;
        }

        self.load_desired_trajectory(&input.desired_trajectory);

        let distance_match = if input.toggles.distance_matching_enabled {
            input.distance_match
        } else {
            DistanceMatchPayload::default()
        };

        if let Some(action) = input.action {
            self.initialize_motion_action(database, action);
        }

        let delta_time = input.delta_time;
        match self.mode {
            MotionMatchingMode::MotionMatching => self.update_motion_matching_state(
                database,
                delta_time,
                distance_match,
                input.toggles,
            ),
            MotionMatchingMode::DistanceMatching => self.update_distance_matching_state(
                database,
                delta_time,
                distance_match,
                input.toggles,
            ),
            MotionMatchingMode::Action => self.update_motion_action_state(delta_time),
        }

        self.channels.primary().map(|primary| TickRecord {
            effective_play_rate: self.settings.playback_rate * primary.play_rate,
            time_accumulator: primary.sample_time(),
            blend_weight: input.final_blend_weight,
        })
    }

    /// Describes the pose to output. Never mutates the matcher.
    pub fn evaluate(&self) -> PoseOutput {
        if !self.valid || self.channels.is_empty() {
            return PoseOutput::RestPose;
        }

        let mut samples = self.channels.samples();
        if samples.len() > 1 && self.settings.blend_time > 1e-5 {
            PoseOutput::Blend(samples)
        } else {
            match samples.pop() {
                Some(mut primary) => {
                    primary.weight = 1.0;
                    PoseOutput::Single(primary)
                }
                None => PoseOutput::RestPose,
            }
        }
    }

    fn register_pose_bones(&mut self, database: &PoseDatabase) {
        self.bone_remap = match &self.collaborators.pose_recorder {
            Some(recorder) => recorder.register_bones_to_record(&database.pose_bones),
            None => Vec::new(),
        };
    }

    /// Copies the caller's trajectory into the scratch buffer, padded or truncated to the
    /// database's trajectory length.
    fn load_desired_trajectory(&mut self, desired: &[TrajectoryPoint]) {
        let len = self.desired_trajectory.len();
        self.desired_trajectory.clear();
        self.desired_trajectory
            .extend(desired.iter().copied().take(len));
        self.desired_trajectory.resize(len, TrajectoryPoint::default());
    }

    fn final_calibration(&self) -> Option<&CalibrationData> {
        self.final_calibrations.get(&self.settings.required_traits)
    }
}
