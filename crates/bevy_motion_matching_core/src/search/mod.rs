//! Nearest neighbour search over the pose database.

pub mod cost;
mod filter;

use bevy::log::debug;

pub use filter::TraitPartitionFilter;

use crate::{
    calibration::CalibrationData,
    collaborators::CandidateFilter,
    pose_database::{PoseDatabase, PoseFeature, PoseId, PoseTraits, TrajectoryPoint},
    utils::math::delta_angle,
};
use cost::{CostMultipliers, angular_cost, joint_cost, momentum_cost, trajectory_cost};

/// A pose whose cost gets scaled by `factor` to make it stickier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FavouredPose {
    pub pose: PoseId,
    pub factor: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SearchResult {
    pub pose: PoseId,
    pub cost: f32,
}

/// Everything a search compares candidates against.
#[derive(Clone, Copy, Debug)]
pub struct SearchQuery<'a> {
    pub current: &'a PoseFeature,
    pub desired_trajectory: &'a [TrajectoryPoint],
    pub calibration: &'a CalibrationData,
    pub traits: PoseTraits,
    pub multipliers: CostMultipliers,
    pub favoured: Option<FavouredPose>,
}

impl<'a> SearchQuery<'a> {
    pub fn new(
        current: &'a PoseFeature,
        desired_trajectory: &'a [TrajectoryPoint],
        calibration: &'a CalibrationData,
        traits: PoseTraits,
    ) -> Self {
        Self {
            current,
            desired_trajectory,
            calibration,
            traits,
            multipliers: CostMultipliers::UNIT,
            favoured: None,
        }
    }

    pub fn with_multipliers(mut self, multipliers: CostMultipliers) -> Self {
        self.multipliers = multipliers;
        self
    }

    pub fn with_favoured(mut self, favoured: Option<FavouredPose>) -> Self {
        self.favoured = favoured;
        self
    }

    /// Cost of `candidate`, or `None` once it is known to be worse than `lowest`.
    fn pruned_cost(&self, candidate: &PoseFeature, lowest: f32) -> Option<f32> {
        let mut cost = (momentum_cost(self.current, candidate, self.calibration)
            + angular_cost(self.current, candidate, self.calibration))
            * self.multipliers.pose;
        if cost > lowest {
            return None;
        }

        cost += trajectory_cost(
            self.desired_trajectory,
            &candidate.trajectory,
            self.calibration,
        ) * self.multipliers.trajectory;
        if cost > lowest {
            return None;
        }

        cost += joint_cost(&self.current.joints, &candidate.joints, self.calibration)
            * self.multipliers.pose;

        cost *= candidate.favour;
        if let Some(favoured) = self.favoured
            && favoured.pose == candidate.id
        {
            cost *= favoured.factor;
        }

        Some(cost)
    }

    /// Lowest cost eligible pose among `candidates`. Ties keep the earliest candidate.
    pub fn lowest_cost_among(
        &self,
        database: &PoseDatabase,
        candidates: impl IntoIterator<Item = PoseId>,
    ) -> Option<SearchResult> {
        let mut best: Option<SearchResult> = None;

        for id in candidates {
            let Some(pose) = database.pose(id) else {
                continue;
            };
            if !pose.is_candidate_for(self.traits) {
                continue;
            }

            let lowest = best.map_or(f32::INFINITY, |b| b.cost);
            if let Some(cost) = self.pruned_cost(pose, lowest)
                && cost < lowest
            {
                best = Some(SearchResult { pose: id, cost });
            }
        }

        best
    }

    pub fn lowest_cost_linear(&self, database: &PoseDatabase) -> Option<SearchResult> {
        self.lowest_cost_among(database, 0..database.poses.len())
    }

    /// Searches the candidates proposed by `filter`, falling back to a linear scan when there
    /// is no usable filter.
    pub fn lowest_cost_filtered(
        &self,
        database: &PoseDatabase,
        filter: Option<&dyn CandidateFilter>,
    ) -> Option<SearchResult> {
        let candidates = filter
            .filter(|f| f.is_valid())
            .and_then(|f| f.filtered_pose_list(self.current, self.traits, self.calibration));

        match candidates {
            Some(candidates) => self.lowest_cost_among(database, candidates),
            None => self.lowest_cost_linear(database),
        }
    }

    /// Full scan without pruning, multipliers or angular cost. Used to reconcile state after
    /// the matcher is re-entered.
    pub fn lowest_cost_global(&self, database: &PoseDatabase) -> Option<SearchResult> {
        let mut best: Option<SearchResult> = None;

        for pose in database
            .poses
            .iter()
            .filter(|p| p.is_candidate_for(self.traits))
        {
            let cost = (trajectory_cost(self.desired_trajectory, &pose.trajectory, self.calibration)
                + joint_cost(&self.current.joints, &pose.joints, self.calibration)
                + momentum_cost(self.current, pose, self.calibration))
                * pose.favour;

            if cost < best.map_or(f32::INFINITY, |b| b.cost) {
                best = Some(SearchResult {
                    pose: pose.id,
                    cost,
                });
            }
        }

        best
    }

    /// Logs how far a filtered result is from the exact linear one.
    pub fn compare_with_linear(&self, database: &PoseDatabase, filtered: Option<SearchResult>) {
        let linear = self.lowest_cost_linear(database);

        match (filtered, linear) {
            (Some(filtered), Some(linear)) if filtered.pose != linear.pose => {
                let filtered_pose = database.pose_clamped(filtered.pose);
                let linear_pose = database.pose_clamped(linear.pose);
                let trajectory_error: Vec<f32> = filtered_pose
                    .trajectory
                    .iter()
                    .zip(&linear_pose.trajectory)
                    .map(|(a, b)| a.position.distance(b.position))
                    .collect();
                let joint_error: Vec<f32> = filtered_pose
                    .joints
                    .iter()
                    .zip(&linear_pose.joints)
                    .map(|(a, b)| a.position.distance(b.position))
                    .collect();
                debug!(
                    "Filtered search chose pose {} (cost {}) but linear chose pose {} (cost {}); trajectory error {:?}, joint error {:?}",
                    filtered.pose,
                    filtered.cost,
                    linear.pose,
                    linear.cost,
                    trajectory_error,
                    joint_error,
                );
            }
            (filtered, linear) if filtered.map(|r| r.pose) != linear.map(|r| r.pose) => {
                debug!(
                    "Filtered search result {:?} differs from linear result {:?}",
                    filtered, linear
                );
            }
            _ => {}
        }
    }
}

/// Whether continuing to `next` keeps the character within a tolerance band of the desired
/// trajectory. The band grows linearly with each sample's prediction time. Past samples are
/// not tested.
pub fn next_pose_within_tolerance(
    next: &PoseFeature,
    desired_trajectory: &[TrajectoryPoint],
    trajectory_times: &[f32],
    traits: PoseTraits,
    position_tolerance: f32,
    rotation_tolerance: f32,
) -> bool {
    if !next.is_candidate_for(traits) {
        return false;
    }

    trajectory_times
        .iter()
        .zip(desired_trajectory)
        .zip(&next.trajectory)
        .filter(|((time, _), _)| **time > 0.0)
        .all(|((time, desired), candidate)| {
            let position_band = time * position_tolerance;
            let angle_band = time * rotation_tolerance;

            candidate.position.distance_squared(desired.position) <= position_band * position_band
                && delta_angle(desired.facing, candidate.facing).abs() <= angle_band
        })
}

/// Thresholds for treating two poses as the same playback location.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EquivalenceThresholds {
    pub time: f32,
    pub blend_space_distance_sq: f32,
}

/// Whether switching from `reference` to `best` would not visibly change playback.
pub fn is_equivalent_continuation(
    best: &PoseFeature,
    reference: &PoseFeature,
    thresholds: EquivalenceThresholds,
) -> bool {
    best.source_index == reference.source_index
        && best.mirrored == reference.mirrored
        && (best.time - reference.time).abs() < thresholds.time
        && best
            .blend_space_position
            .distance_squared(reference.blend_space_position)
            < thresholds.blend_space_distance_sq
}

#[cfg(test)]
mod tests {
    use bevy::math::Vec3;

    use super::*;
    use crate::pose_database::test_support::linear_database;

    fn momentum_only(trajectory_len: usize) -> CalibrationData {
        let mut calibration = CalibrationData::uniform(trajectory_len, 0, 0.0);
        calibration.momentum = 1.0;
        calibration
    }

    #[test]
    fn test_momentum_only_picks_matching_velocity() {
        let mut db = linear_database(4, 3, 0);
        for pose in &mut db.poses {
            pose.local_velocity = Vec3::new(5.0, 0.0, 0.0);
        }
        db.poses[2].local_velocity = Vec3::new(1.0, 0.0, 0.0);

        let current = PoseFeature {
            trajectory: vec![TrajectoryPoint::default(); 3],
            ..Default::default()
        };
        let desired = vec![TrajectoryPoint::default(); 3];
        let calibration = momentum_only(3);

        let query = SearchQuery::new(&current, &desired, &calibration, PoseTraits::default());

        assert_eq!(query.lowest_cost_linear(&db).map(|r| r.pose), Some(2));
    }

    #[test]
    fn test_filtered_matches_linear_on_full_set() {
        let mut db = linear_database(12, 3, 2);
        for pose in &mut db.poses {
            let i = pose.id as f32;
            pose.local_velocity = Vec3::new((i * 1.7).sin() * 3.0, 0.0, i * 0.3);
            pose.rotational_velocity = (i * 0.9).cos() * 40.0;
            for (k, point) in pose.trajectory.iter_mut().enumerate() {
                point.position = Vec3::new(i.cos() * k as f32, 0.0, i * 0.2 * k as f32);
                point.facing = (i * 37.0) % 360.0 - 180.0;
            }
            for (k, joint) in pose.joints.iter_mut().enumerate() {
                joint.position = Vec3::splat((i + k as f32).sin());
                joint.velocity = Vec3::splat((i * k as f32).cos());
            }
        }
        db.poses[5].do_not_use = true;

        let current = db.poses[7].clone();
        let desired = db.poses[3].trajectory.clone();
        let calibration = CalibrationData::uniform(3, 2, 0.7);
        let full_set = FullSetFilter(db.poses.len());

        for ratio in [0.0, 0.3, 0.5, 1.0] {
            let query = SearchQuery::new(&current, &desired, &calibration, PoseTraits::default())
                .with_multipliers(CostMultipliers::from_ratio(ratio))
                .with_favoured(Some(FavouredPose {
                    pose: 8,
                    factor: 0.95,
                }));

            assert_eq!(
                query.lowest_cost_linear(&db),
                query.lowest_cost_filtered(&db, Some(&full_set))
            );
            assert_eq!(
                query.lowest_cost_linear(&db),
                query.lowest_cost_filtered(&db, Some(&TraitPartitionFilter::new(&db)))
            );
        }
    }

    struct FullSetFilter(usize);

    impl CandidateFilter for FullSetFilter {
        fn is_valid(&self) -> bool {
            true
        }

        fn filtered_pose_list(
            &self,
            _current: &PoseFeature,
            _traits: PoseTraits,
            _calibration: &CalibrationData,
        ) -> Option<Vec<PoseId>> {
            Some((0..self.0).collect())
        }
    }

    struct BrokenFilter;

    impl CandidateFilter for BrokenFilter {
        fn is_valid(&self) -> bool {
            false
        }

        fn filtered_pose_list(
            &self,
            _current: &PoseFeature,
            _traits: PoseTraits,
            _calibration: &CalibrationData,
        ) -> Option<Vec<PoseId>> {
            Some(vec![0])
        }
    }

    #[test]
    fn test_invalid_filter_falls_back_to_linear() {
        let mut db = linear_database(4, 1, 0);
        db.poses[3].local_velocity = Vec3::X;
        let current = PoseFeature {
            local_velocity: Vec3::X,
            ..Default::default()
        };
        let desired = vec![TrajectoryPoint::default()];
        let calibration = momentum_only(1);
        let query = SearchQuery::new(&current, &desired, &calibration, PoseTraits::default());

        let result = query.lowest_cost_filtered(&db, Some(&BrokenFilter));

        assert_eq!(result.map(|r| r.pose), Some(3));
    }

    #[test]
    fn test_exact_match_is_global_minimum() {
        let mut db = linear_database(6, 2, 1);
        for pose in &mut db.poses {
            let i = pose.id as f32;
            pose.local_velocity = Vec3::new(i, 0.0, 0.0);
            pose.rotational_velocity = i * 10.0;
            pose.trajectory[1].position = Vec3::new(0.0, 0.0, i);
            pose.joints[0].velocity = Vec3::new(0.0, i, 0.0);
        }

        let target = db.poses[4].clone();
        let calibration = CalibrationData::uniform(2, 1, 1.0);
        let query = SearchQuery::new(&target, &target.trajectory, &calibration, PoseTraits::default());

        let best = query.lowest_cost_linear(&db).unwrap();

        assert_eq!(best.pose, 4);
        assert_eq!(best.cost, 0.0);
        assert_eq!(query.lowest_cost_global(&db).map(|r| r.pose), Some(4));
    }

    #[test]
    fn test_ties_keep_first_pose() {
        let db = linear_database(3, 1, 0);
        let current = PoseFeature::default();
        let desired = vec![TrajectoryPoint::default()];
        let calibration = CalibrationData::uniform(1, 0, 1.0);
        let query = SearchQuery::new(&current, &desired, &calibration, PoseTraits::default());

        assert_eq!(query.lowest_cost_linear(&db).map(|r| r.pose), Some(0));
    }

    #[test]
    fn test_traits_and_do_not_use_are_excluded() {
        let mut db = linear_database(3, 1, 0);
        db.poses[0].do_not_use = true;
        db.poses[1].traits = PoseTraits(1);
        let current = PoseFeature::default();
        let desired = vec![TrajectoryPoint::default()];
        let calibration = CalibrationData::uniform(1, 0, 1.0);

        let query = SearchQuery::new(&current, &desired, &calibration, PoseTraits::default());
        assert_eq!(query.lowest_cost_linear(&db).map(|r| r.pose), Some(2));

        let query = SearchQuery::new(&current, &desired, &calibration, PoseTraits(1));
        assert_eq!(query.lowest_cost_linear(&db).map(|r| r.pose), Some(1));

        let query = SearchQuery::new(&current, &desired, &calibration, PoseTraits(7));
        assert_eq!(query.lowest_cost_linear(&db), None);
    }

    #[test]
    fn test_favoured_pose_wins_close_call() {
        let mut db = linear_database(2, 1, 0);
        db.poses[0].local_velocity = Vec3::new(1.02, 0.0, 0.0);
        db.poses[1].local_velocity = Vec3::new(1.0, 0.0, 0.0);
        let current = PoseFeature::default();
        let desired = vec![TrajectoryPoint::default()];
        let calibration = momentum_only(1);

        let query = SearchQuery::new(&current, &desired, &calibration, PoseTraits::default());
        assert_eq!(query.lowest_cost_linear(&db).map(|r| r.pose), Some(1));

        let query = query.with_favoured(Some(FavouredPose {
            pose: 0,
            factor: 0.9,
        }));
        assert_eq!(query.lowest_cost_linear(&db).map(|r| r.pose), Some(0));
    }

    fn tolerance_fixture() -> (PoseFeature, Vec<TrajectoryPoint>, Vec<f32>) {
        let times = vec![-0.5, 0.5, 1.0];
        let next = PoseFeature {
            trajectory: vec![
                TrajectoryPoint::new(Vec3::new(0.0, 0.0, -50.0), 0.0),
                TrajectoryPoint::new(Vec3::new(0.0, 0.0, 50.0), 0.0),
                TrajectoryPoint::new(Vec3::new(0.0, 0.0, 100.0), 0.0),
            ],
            ..Default::default()
        };
        let desired = next.trajectory.clone();
        (next, desired, times)
    }

    #[test]
    fn test_tolerance_accepts_identical_trajectories() {
        let (next, desired, times) = tolerance_fixture();
        assert!(next_pose_within_tolerance(
            &next,
            &desired,
            &times,
            PoseTraits::default(),
            0.0,
            0.0
        ));
    }

    #[test]
    fn test_tolerance_ignores_past_samples() {
        let (next, mut desired, times) = tolerance_fixture();
        desired[0].position = Vec3::new(1000.0, 0.0, 0.0);
        desired[0].facing = 90.0;

        assert!(next_pose_within_tolerance(
            &next,
            &desired,
            &times,
            PoseTraits::default(),
            50.0,
            2.0
        ));
    }

    #[test]
    fn test_tolerance_is_monotonic_in_radius() {
        let (next, mut desired, times) = tolerance_fixture();
        // 20 units off at t = 0.5, so the band needs a tolerance of at least 40
        desired[1].position.x += 20.0;

        let passes = |tolerance: f32| {
            next_pose_within_tolerance(
                &next,
                &desired,
                &times,
                PoseTraits::default(),
                tolerance,
                2.0,
            )
        };

        let results: Vec<bool> = [0.0, 10.0, 39.0, 40.0, 41.0, 80.0]
            .into_iter()
            .map(passes)
            .collect();
        assert_eq!(results, vec![false, false, false, true, true, true]);
    }

    #[test]
    fn test_tolerance_rejects_unusable_next_pose() {
        let (mut next, desired, times) = tolerance_fixture();
        next.do_not_use = true;
        assert!(!next_pose_within_tolerance(
            &next,
            &desired,
            &times,
            PoseTraits::default(),
            50.0,
            2.0
        ));
    }

    #[test]
    fn test_equivalent_continuation() {
        let thresholds = EquivalenceThresholds {
            time: 0.25,
            blend_space_distance_sq: 1.0,
        };
        let reference = PoseFeature {
            time: 1.0,
            ..Default::default()
        };

        let close = PoseFeature {
            time: 1.2,
            ..Default::default()
        };
        let far = PoseFeature {
            time: 1.3,
            ..Default::default()
        };
        let mirrored = PoseFeature {
            time: 1.0,
            mirrored: true,
            ..Default::default()
        };

        assert!(is_equivalent_continuation(&close, &reference, thresholds));
        assert!(!is_equivalent_continuation(&far, &reference, thresholds));
        assert!(!is_equivalent_continuation(&mirrored, &reference, thresholds));
    }
}
