use bevy::{asset::prelude::*, ecs::prelude::*, time::prelude::*};

use crate::{
    player::MotionMatchingPlayer, pose_database::PoseDatabase, settings::MotionMatchingSettings,
};

/// Advances every unpaused [`MotionMatchingPlayer`] by the frame's delta time.
pub fn motion_matching_players(
    time: Res<Time>,
    databases: Res<Assets<PoseDatabase>>,
    settings: Res<Assets<MotionMatchingSettings>>,
    mut players: Query<&mut MotionMatchingPlayer>,
) {
    for mut player in &mut players {
        if player.paused {
            continue;
        }
        player.update(time.delta_secs(), &databases, &settings);
    }
}
