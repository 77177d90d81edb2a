//! # Bevy Motion Matching
//!
//! **Bevy Motion Matching** is a motion matching runtime for [Bevy](https://bevyengine.org/).
//!
//! ## Introduction
//!
//! Instead of authoring a state machine of clips and transitions, a motion matching character
//! picks, a few times per second, the frame of its animation library that best continues the
//! pose it is currently in while following the trajectory the gameplay code wants it to take.
//!
//! There are two kinds of assets introduced by this library:
//! - [`PoseDatabase`], defined in `*.posedb.ron` files. A pose database holds the features
//!   (root trajectory, joint positions and velocities, momentum) sampled at a fixed interval from
//!   a set of source animations, together with the calibration data used to weigh them. Pose
//!   databases are produced by an offline preprocessing step and are read-only at runtime. They
//!   are validated when loaded, so a database with broken pose links or inconsistent feature
//!   lengths fails to load instead of misbehaving later.
//! - [`MotionMatchingSettings`], defined in `*.mmsettings.ron` files. Every field is optional and
//!   falls back to its default, for example:
//!   ```ron
//!   (
//!       update_interval: 0.1,
//!       blend_time: 0.3,
//!       transition_method: Blend,
//!       quality_vs_responsiveness: 0.7,
//!   )
//!   ```
//!
//! A [`MotionMatchingPlayer`] component drives one character. Each frame it is fed a desired
//! trajectory and optional distance matching or action requests, and it exposes a
//! [`PoseOutput`] describing which source animations to sample, at which times and with which
//! weights. Sampling the clips and applying the pose to the skeleton is left to the user.
//!
//! ## Modes
//!
//! - Motion matching: the default. The matcher searches the database every
//!   [`MotionMatchingSettings::update_interval`] seconds, or sooner when the current clip is
//!   about to run out.
//! - Distance matching: started with [`MotionMatchingPlayer::start_distance_matching`]. Playback
//!   is pinned to the distance from a marker (e.g. a stop location) using the distance curves
//!   stored in the database, until the end of the matched section.
//! - Actions: started with [`MotionMatchingPlayer::trigger_action`]. Plays a scripted action
//!   from the database, entered on the candidate whose pose best continues the current one.
//!
//! ## Collaborators
//!
//! The matcher can be given, through [`Collaborators`]:
//! - a [`PoseRecorder`] (e.g. [`SharedPoseRecorder`]) supplying the observed pose of the
//!   character, used to pick up playback seamlessly when the matcher is re-entered;
//! - a [`CandidateFilter`] narrowing down the poses to evaluate on each search;
//! - an [`InertializationRequester`] that hides pose discontinuities after a cut.
//!
//! All of them are optional.
//!
//! ## Example
//!
//! ```ignore
//! fn setup(mut commands: Commands, asset_server: Res<AssetServer>) {
//!     commands.spawn(
//!         MotionMatchingPlayer::new(MotionMatchingSettings::default())
//!             .with_database(asset_server.load("databases/locomotion.posedb.ron")),
//!     );
//! }
//!
//! fn steer(mut players: Query<&mut MotionMatchingPlayer>) {
//!     for mut player in &mut players {
//!         player.set_desired_trajectory(predict_trajectory());
//!     }
//! }
//! ```
//!
//! [`PoseDatabase`]: prelude::PoseDatabase
//! [`MotionMatchingSettings`]: prelude::MotionMatchingSettings
//! [`MotionMatchingSettings::update_interval`]: prelude::MotionMatchingSettings::update_interval
//! [`MotionMatchingPlayer`]: prelude::MotionMatchingPlayer
//! [`MotionMatchingPlayer::start_distance_matching`]: prelude::MotionMatchingPlayer::start_distance_matching
//! [`MotionMatchingPlayer::trigger_action`]: prelude::MotionMatchingPlayer::trigger_action
//! [`PoseOutput`]: prelude::PoseOutput
//! [`Collaborators`]: prelude::Collaborators
//! [`PoseRecorder`]: prelude::PoseRecorder
//! [`SharedPoseRecorder`]: prelude::SharedPoseRecorder
//! [`CandidateFilter`]: prelude::CandidateFilter
//! [`InertializationRequester`]: prelude::InertializationRequester

use bevy::app::{App, Plugin};

pub use bevy_motion_matching_core as core;

/// Adds motion matching support to an app
#[derive(Default)]
pub struct MotionMatchingPlugin {
    pub core: core::plugin::MotionMatchingCorePlugin,
}

impl Plugin for MotionMatchingPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(core::plugin::MotionMatchingCorePlugin {
            schedule: self.core.schedule,
        });
    }
}

pub mod prelude {
    pub use super::MotionMatchingPlugin;
    pub use super::core::{
        calibration::CalibrationData,
        collaborators::{
            CachedMotionPose, CandidateFilter, Collaborators, DistanceToMarkerProvider,
            InertializationRequester, PoseRecorder, SharedPoseRecorder,
        },
        distance_matching::{DistanceMatchingPlayer, DistanceMatchingSettings},
        errors::{AssetLoaderError, MotionMatchingError},
        motion_matcher::{
            MotionActionPayload, MotionMatcher, MotionMatchingInput, MotionMatchingMode,
            PoseOutput, TickRecord,
        },
        player::MotionMatchingPlayer,
        plugin::{MotionMatchingCorePlugin, MotionMatchingSet},
        pose_database::{
            PoseDatabase, PoseTraits, TrajectoryPoint,
            distance_match::{DistanceMatchBasis, DistanceMatchType},
        },
        search::TraitPartitionFilter,
        settings::{
            MotionMatchingSettings, PastTrajectoryMode, PoseMatchMethod, RuntimeToggles,
            TransitionMethod,
        },
        time_matching::TimeMatchingPlayer,
    };
}
