use bevy::{
    app::{App, Plugin, Update},
    asset::AssetApp,
    ecs::{
        intern::Interned,
        schedule::{IntoScheduleConfigs, ScheduleLabel, SystemSet},
    },
};

use crate::{
    calibration::{CalibrationData, JointWeights, TrajectoryWeights},
    distance_matching::{DistanceMatchingPlayer, DistanceMatchingSettings},
    motion_matcher::{MotionMatchingInput, MotionMatchingMode, PoseOutput, TickRecord},
    player::MotionMatchingPlayer,
    pose_database::{
        AnimSource, PoseDatabase, PoseFeature, TrajectoryPoint, loader::PoseDatabaseLoader,
    },
    settings::{MotionMatchingSettings, RuntimeToggles, loader::MotionMatchingSettingsLoader},
    systems::motion_matching_players,
};

/// Adds motion matching support to an app
pub struct MotionMatchingCorePlugin {
    /// Schedule the players are updated in
    pub schedule: Interned<dyn ScheduleLabel>,
}

impl Default for MotionMatchingCorePlugin {
    fn default() -> Self {
        Self {
            schedule: Update.intern(),
        }
    }
}

#[derive(Clone, Debug, Copy, PartialEq, Eq, Hash, SystemSet)]
pub enum MotionMatchingSet {
    /// Players pick and advance their poses in this set. Systems that write desired
    /// trajectories should run before it, systems sampling the output after it.
    Update,
}

impl Plugin for MotionMatchingCorePlugin {
    fn build(&self, app: &mut App) {
        self.register_assets(app);
        self.register_types(app);

        app.add_systems(
            self.schedule,
            motion_matching_players.in_set(MotionMatchingSet::Update),
        );
    }
}

impl MotionMatchingCorePlugin {
    /// Registers asset types and their loaders
    fn register_assets(&self, app: &mut App) {
        app.init_asset::<PoseDatabase>()
            .init_asset_loader::<PoseDatabaseLoader>()
            .register_asset_reflect::<PoseDatabase>();
        app.init_asset::<MotionMatchingSettings>()
            .init_asset_loader::<MotionMatchingSettingsLoader>()
            .register_asset_reflect::<MotionMatchingSettings>();
    }

    /// "Other" reflect registrations
    fn register_types(&self, app: &mut App) {
        app //
            .register_type::<MotionMatchingPlayer>()
            .register_type::<MotionMatchingInput>()
            .register_type::<MotionMatchingMode>()
            .register_type::<PoseOutput>()
            .register_type::<TickRecord>()
            .register_type::<RuntimeToggles>()
            .register_type::<PoseFeature>()
            .register_type::<TrajectoryPoint>()
            .register_type::<AnimSource>()
            .register_type::<CalibrationData>()
            .register_type::<TrajectoryWeights>()
            .register_type::<JointWeights>()
            .register_type::<DistanceMatchingSettings>()
            .register_type::<DistanceMatchingPlayer>();
    }
}
