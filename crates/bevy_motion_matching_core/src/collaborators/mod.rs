//! Contracts for the systems a motion matcher cooperates with.
//!
//! Collaborators are handed to the matcher once, at construction, through [`Collaborators`].
//! All of them are optional; the matcher falls back to a defined behaviour when one is missing.

mod recorder;

use std::{fmt, sync::Arc};

pub use recorder::*;

use crate::{
    calibration::CalibrationData,
    pose_database::{PoseFeature, PoseId, PoseTraits},
};

/// Supplies the observed skeletal state of the character.
pub trait PoseRecorder: Send + Sync {
    /// Starts recording the given bones. Returns, for each requested bone, its slot in
    /// [`CachedMotionPose::bones`], or `None` if the bone cannot be recorded.
    fn register_bones_to_record(&self, bones: &[String]) -> Vec<Option<usize>>;

    fn motion_pose(&self) -> CachedMotionPose;
}

/// Accelerated candidate lookup, e.g. a spatial index over the pose features.
///
/// Must be safe to query from many matchers at once.
pub trait CandidateFilter: Send + Sync {
    fn is_valid(&self) -> bool;

    /// Returns the subset of poses worth evaluating, or `None` if the filter cannot answer.
    fn filtered_pose_list(
        &self,
        current: &PoseFeature,
        traits: PoseTraits,
        calibration: &CalibrationData,
    ) -> Option<Vec<PoseId>>;
}

/// A downstream smoothing system that hides pose discontinuities after a cut.
pub trait InertializationRequester: Send + Sync {
    fn request_inertialization(&self, blend_time: f32);
}

/// Reports how long until the character reaches a marker, used by time matching.
pub trait DistanceToMarkerProvider: Send + Sync {
    fn time_to_marker(&self) -> f32;
}

#[derive(Clone, Default)]
pub struct Collaborators {
    pub pose_recorder: Option<Arc<dyn PoseRecorder>>,
    pub candidate_filter: Option<Arc<dyn CandidateFilter>>,
    pub inertialization: Option<Arc<dyn InertializationRequester>>,
}

impl Collaborators {
    pub fn with_pose_recorder(mut self, recorder: Arc<dyn PoseRecorder>) -> Self {
        self.pose_recorder = Some(recorder);
        self
    }

    pub fn with_candidate_filter(mut self, filter: Arc<dyn CandidateFilter>) -> Self {
        self.candidate_filter = Some(filter);
        self
    }

    pub fn with_inertialization(mut self, requester: Arc<dyn InertializationRequester>) -> Self {
        self.inertialization = Some(requester);
        self
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("pose_recorder", &self.pose_recorder.is_some())
            .field("candidate_filter", &self.candidate_filter.is_some())
            .field("inertialization", &self.inertialization.is_some())
            .finish()
    }
}
