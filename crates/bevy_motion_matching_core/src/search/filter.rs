use bevy::platform::collections::HashMap;

use crate::{
    calibration::CalibrationData,
    collaborators::CandidateFilter,
    pose_database::{PoseDatabase, PoseFeature, PoseId, PoseTraits},
};

/// Exact [`CandidateFilter`] that only removes poses which could never win: those flagged
/// do-not-use or carrying other traits.
#[derive(Debug, Default, Clone)]
pub struct TraitPartitionFilter {
    partitions: HashMap<PoseTraits, Vec<PoseId>>,
}

impl TraitPartitionFilter {
    pub fn new(database: &PoseDatabase) -> Self {
        let mut partitions: HashMap<PoseTraits, Vec<PoseId>> = HashMap::default();
        for pose in database.poses.iter().filter(|p| !p.do_not_use) {
            partitions.entry(pose.traits).or_default().push(pose.id);
        }
        Self { partitions }
    }
}

impl CandidateFilter for TraitPartitionFilter {
    fn is_valid(&self) -> bool {
        !self.partitions.is_empty()
    }

    fn filtered_pose_list(
        &self,
        _current: &PoseFeature,
        traits: PoseTraits,
        _calibration: &CalibrationData,
    ) -> Option<Vec<PoseId>> {
        self.partitions.get(&traits).cloned()
    }
}
