use bevy::{asset::prelude::*, ecs::prelude::*, log::prelude::*, reflect::prelude::*};

use crate::{
    collaborators::Collaborators,
    errors::MotionMatchingError,
    motion_matcher::{
        DistanceMatchPayload, MotionActionPayload, MotionMatcher, MotionMatchingInput, PoseOutput,
        TickRecord,
    },
    pose_database::{
        PoseDatabase, TrajectoryPoint,
        distance_match::{DistanceMatchBasis, DistanceMatchType},
    },
    settings::{MotionMatchingSettings, RuntimeToggles},
};

/// Motion matching controls for one character
#[derive(Component, Default, Reflect)]
#[reflect(Component)]
pub struct MotionMatchingPlayer {
    pub(crate) paused: bool,
    pub(crate) database: Option<Handle<PoseDatabase>>,
    pub(crate) settings: Option<Handle<MotionMatchingSettings>>,
    #[reflect(ignore)]
    pub(crate) matcher: MotionMatcher,
    pub(crate) input: MotionMatchingInput,
    pub(crate) output: PoseOutput,
    pub(crate) last_tick: Option<TickRecord>,
    pending_initialize: bool,
    /// Error that ocurred during the last activation
    #[reflect(ignore)]
    error: Option<MotionMatchingError>,
}

impl MotionMatchingPlayer {
    /// Create a new player with the given settings, with no database set
    pub fn new(settings: MotionMatchingSettings) -> Self {
        Self {
            matcher: MotionMatcher::new(settings),
            pending_initialize: true,
            ..Default::default()
        }
    }

    /// Set the pose database to match against
    pub fn with_database(mut self, database: Handle<PoseDatabase>) -> Self {
        self.database = Some(database);
        self
    }

    /// Take the matcher settings from an asset instead, once it is loaded
    pub fn with_settings_asset(mut self, settings: Handle<MotionMatchingSettings>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_collaborators(mut self, collaborators: Collaborators) -> Self {
        self.matcher = std::mem::take(&mut self.matcher).with_collaborators(collaborators);
        self
    }

    /// Start matching against a new database, reactivating the matcher.
    pub fn start(&mut self, database: Handle<PoseDatabase>) -> &mut Self {
        self.database = Some(database);
        self.reinitialize()
    }

    /// Re-initialize on the next update. On an already running matcher this triggers a matched
    /// transition from the recorded pose.
    pub fn reinitialize(&mut self) -> &mut Self {
        self.pending_initialize = true;
        self
    }

    pub fn set_desired_trajectory(&mut self, trajectory: Vec<TrajectoryPoint>) -> &mut Self {
        self.input.desired_trajectory = trajectory;
        self
    }

    /// Enter distance matching on the next update
    pub fn start_distance_matching(
        &mut self,
        match_type: DistanceMatchType,
        basis: DistanceMatchBasis,
        marker_distance: f32,
    ) -> &mut Self {
        self.input.distance_match = DistanceMatchPayload {
            trigger: true,
            match_type,
            basis,
            marker_distance,
        };
        self
    }

    pub fn set_marker_distance(&mut self, marker_distance: f32) -> &mut Self {
        self.input.distance_match.marker_distance = marker_distance;
        self
    }

    pub fn stop_distance_matching(&mut self) -> &mut Self {
        self.input.distance_match = DistanceMatchPayload::default();
        self
    }

    /// Play an action on the next update
    pub fn trigger_action(&mut self, action: MotionActionPayload) -> &mut Self {
        self.input.action = Some(action);
        self
    }

    pub fn set_toggles(&mut self, toggles: RuntimeToggles) -> &mut Self {
        self.input.toggles = toggles;
        self
    }

    pub fn set_final_blend_weight(&mut self, weight: f32) -> &mut Self {
        self.input.final_blend_weight = weight;
        self
    }

    pub fn pause(&mut self) -> &mut Self {
        self.paused = true;
        self
    }

    pub fn resume(&mut self) -> &mut Self {
        self.paused = false;
        self
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn matcher(&self) -> &MotionMatcher {
        &self.matcher
    }

    /// Pose to sample, as of the last update
    pub fn output(&self) -> &PoseOutput {
        &self.output
    }

    pub fn last_tick(&self) -> Option<TickRecord> {
        self.last_tick
    }

    pub fn get_database(&self) -> Option<Handle<PoseDatabase>> {
        self.database.clone()
    }

    /// If the last activation failed return the error, otherwise return `None`.
    pub fn get_error(&self) -> Option<MotionMatchingError> {
        self.error.clone()
    }

    /// Advances the matcher and stores its new output. Waits for the database (and settings
    /// asset, if any) to load before activating.
    pub(crate) fn update(
        &mut self,
        delta_time: f32,
        databases: &Assets<PoseDatabase>,
        settings: &Assets<MotionMatchingSettings>,
    ) {
        let Some(database) = self.database.as_ref().and_then(|h| databases.get(h)) else {
            return;
        };

        if self.pending_initialize {
            if let Some(handle) = &self.settings {
                let Some(settings) = settings.get(handle) else {
                    return;
                };
                *self.matcher.settings_mut() = settings.clone();
            }

            self.pending_initialize = false;
            match self.matcher.initialize(Some(database)) {
                Ok(()) => self.error = None,
                Err(error) => {
                    error!("Failed to activate motion matching player: {error}");
                    self.error = Some(error);
                }
            }
        }

        if !self.matcher.is_valid() {
            self.output = PoseOutput::RestPose;
            self.last_tick = None;
            return;
        }

        self.input.delta_time = delta_time;
        self.last_tick = self.matcher.update(Some(database), &self.input);
        self.output = self.matcher.evaluate();

        self.input.distance_match.trigger = false;
        self.input.action = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{calibration::CalibrationData, pose_database::test_support::linear_database};

    fn assets(
        calibrated: bool,
    ) -> (
        Assets<PoseDatabase>,
        Assets<MotionMatchingSettings>,
        Handle<PoseDatabase>,
    ) {
        let mut db = linear_database(5, 2, 1);
        db.calibration = calibrated.then(|| CalibrationData::uniform(2, 1, 1.0));
        db.feature_deviations
            .insert(Default::default(), CalibrationData::uniform(2, 1, 1.0));

        let mut databases = Assets::<PoseDatabase>::default();
        let handle = databases.add(db);
        (databases, Assets::default(), handle)
    }

    #[test]
    fn test_player_waits_for_database() {
        let (databases, settings, _) = assets(true);
        let mut player = MotionMatchingPlayer::new(MotionMatchingSettings::default())
            .with_database(databases.reserve_handle());

        player.update(0.1, &databases, &settings);

        assert_eq!(player.output(), &PoseOutput::RestPose);
        assert!(!player.matcher().is_valid());
    }

    #[test]
    fn test_player_activates_and_evaluates() {
        let (databases, settings, handle) = assets(true);
        let mut player =
            MotionMatchingPlayer::new(MotionMatchingSettings::default()).with_database(handle);

        player.update(0.1, &databases, &settings);

        assert!(player.get_error().is_none());
        assert!(matches!(player.output(), PoseOutput::Single(_)));
        assert!(player.last_tick().is_some());
    }

    #[test]
    fn test_player_reports_activation_error() {
        let (databases, settings, handle) = assets(false);
        let mut player =
            MotionMatchingPlayer::new(MotionMatchingSettings::default()).with_database(handle);

        player.update(0.1, &databases, &settings);

        assert_eq!(
            player.get_error(),
            Some(MotionMatchingError::MissingCalibration)
        );
        assert_eq!(player.output(), &PoseOutput::RestPose);
    }

    #[test]
    fn test_player_waits_for_settings_asset() {
        let (databases, mut settings, handle) = assets(true);
        let settings_handle = settings.reserve_handle();
        let mut player = MotionMatchingPlayer::new(MotionMatchingSettings::default())
            .with_database(handle)
            .with_settings_asset(settings_handle.clone());

        player.update(0.1, &databases, &settings);
        assert!(!player.matcher().is_valid());

        let _ = settings.insert(
            &settings_handle,
            MotionMatchingSettings {
                blend_time: 0.5,
                ..Default::default()
            },
        );
        player.update(0.1, &databases, &settings);

        assert!(player.matcher().is_valid());
        assert_eq!(player.matcher().settings().blend_time, 0.5);
    }

    #[test]
    fn test_one_shot_payloads_are_cleared() {
        let (databases, settings, handle) = assets(true);
        let mut player =
            MotionMatchingPlayer::new(MotionMatchingSettings::default()).with_database(handle);
        player
            .start_distance_matching(
                DistanceMatchType::Backward,
                DistanceMatchBasis::Positional,
                3.0,
            )
            .trigger_action(MotionActionPayload::default());

        player.update(0.1, &databases, &settings);

        assert!(!player.input.distance_match.trigger);
        assert_eq!(
            player.input.distance_match.match_type,
            DistanceMatchType::Backward
        );
        assert!(player.input.action.is_none());
    }
}
