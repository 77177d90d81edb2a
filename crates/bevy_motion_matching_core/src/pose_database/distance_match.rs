use bevy::reflect::Reflect;
use serde::{Deserialize, Serialize};

use super::PoseId;

#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistanceMatchType {
    #[default]
    None,
    /// Approaching a marker, e.g. stopping at a point
    Backward,
    /// Leaving a marker, e.g. starting from rest
    Forward,
    Both,
}

#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistanceMatchBasis {
    #[default]
    Positional,
    Rotational,
}

#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DistanceMatchIdentifier {
    pub match_type: DistanceMatchType,
    pub basis: DistanceMatchBasis,
}

impl DistanceMatchIdentifier {
    pub fn new(match_type: DistanceMatchType, basis: DistanceMatchBasis) -> Self {
        Self { match_type, basis }
    }
}

#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DistanceKey {
    pub time: f32,
    /// Distance to the marker at `time`. Positive before the marker, negative after it.
    pub distance: f32,
}

/// Time ordered curve of distance to a marker.
#[derive(Reflect, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DistanceCurve {
    pub keys: Vec<DistanceKey>,
}

impl DistanceCurve {
    pub fn new(keys: Vec<DistanceKey>) -> Self {
        Self { keys }
    }

    /// Builds a curve from `(time, distance)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (f32, f32)>) -> Self {
        Self::new(
            pairs
                .into_iter()
                .map(|(time, distance)| DistanceKey { time, distance })
                .collect(),
        )
    }

    pub fn start_time(&self) -> f32 {
        self.keys.first().map(|k| k.time).unwrap_or(0.0)
    }

    pub fn end_time(&self) -> f32 {
        self.keys.last().map(|k| k.time).unwrap_or(0.0)
    }

    /// Finds the time at which the curve reaches `distance`.
    ///
    /// The scan starts at `last_key` and only moves forward, so repeated lookups against a
    /// monotonic curve never go back in time. `last_key` is updated to the segment that matched.
    /// Distances not yet reached return the time of `last_key`; distances past the end of the
    /// curve return the end time.
    pub fn find_matching_time(&self, distance: f32, last_key: &mut usize) -> f32 {
        let Some(first) = self.keys.first() else {
            return 0.0;
        };
        if self.keys.len() == 1 {
            return first.time;
        }

        let last_segment = self.keys.len() - 2;
        let start = (*last_key).min(last_segment);

        for i in start..=last_segment {
            let a = self.keys[i];
            let b = self.keys[i + 1];
            let (low, high) = if a.distance <= b.distance {
                (a.distance, b.distance)
            } else {
                (b.distance, a.distance)
            };

            if (low..=high).contains(&distance) {
                *last_key = i;
                let span = b.distance - a.distance;
                let f = if span.abs() <= f32::EPSILON {
                    0.0
                } else {
                    (distance - a.distance) / span
                };
                return a.time + (b.time - a.time) * f;
            }
        }

        let direction = self.keys[last_segment + 1].distance - first.distance;
        let from_start = distance - self.keys[start].distance;
        if direction == 0.0 || from_start * direction < 0.0 {
            *last_key = start;
            self.keys[start].time
        } else {
            *last_key = last_segment;
            self.end_time()
        }
    }
}

/// A run of consecutive poses annotated with a distance to marker curve.
#[derive(Reflect, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DistanceMatchSection {
    pub start_pose: PoseId,
    pub end_pose: PoseId,
    pub start_time: f32,
    pub end_time: f32,
    pub curve: DistanceCurve,
}

impl DistanceMatchSection {
    pub fn find_matching_time(&self, distance: f32, last_key: &mut usize) -> f32 {
        self.curve.find_matching_time(distance, last_key)
    }

    /// Pose of this section sampled closest to `time`.
    pub fn pose_at_time(&self, time: f32, pose_interval: f32) -> PoseId {
        let steps = ((time - self.start_time) / pose_interval).round().max(0.0) as usize;
        (self.start_pose + steps).min(self.end_pose)
    }
}

#[derive(Reflect, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DistanceMatchGroup {
    pub identifier: DistanceMatchIdentifier,
    pub sections: Vec<DistanceMatchSection>,
}
