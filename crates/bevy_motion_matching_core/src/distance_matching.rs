//! Playback of a single clip driven by the distance to a marker, outside of motion matching.

use bevy::reflect::Reflect;
use serde::{Deserialize, Serialize};

use crate::{
    motion_matcher::TickRecord,
    pose_database::{
        AnimSource,
        distance_match::{DistanceCurve, DistanceMatchType},
    },
    settings::RuntimeToggles,
};

#[derive(Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceMatchingSettings {
    pub match_type: DistanceMatchType,
    /// Distances at or beyond this fall back to plain playback. Negative means no limit.
    pub distance_limit: f32,
    /// When moving forward towards a marker, distances below this count as arrived and fall
    /// back to plain playback.
    pub destination_reached_threshold: f32,
    /// Lerp factor towards the matched time. Non-positive disables smoothing.
    pub smooth_rate: f32,
    /// Smoothing only applies while the matched time is this close to the current one.
    pub smooth_time_threshold: f32,
    /// Look the curve up with the distance's sign flipped
    pub negate_curve: bool,
    pub play_rate: f32,
}

impl Default for DistanceMatchingSettings {
    fn default() -> Self {
        Self {
            match_type: DistanceMatchType::None,
            distance_limit: -1.0,
            destination_reached_threshold: 5.0,
            smooth_rate: -1.0,
            smooth_time_threshold: 0.15,
            negate_curve: false,
            play_rate: 1.0,
        }
    }
}

#[derive(Reflect, Clone, Debug, PartialEq)]
pub struct DistanceMatchingInput {
    pub delta_time: f32,
    pub desired_distance: f32,
    pub final_blend_weight: f32,
    pub toggles: RuntimeToggles,
}

impl Default for DistanceMatchingInput {
    fn default() -> Self {
        Self {
            delta_time: 0.0,
            desired_distance: 0.0,
            final_blend_weight: 1.0,
            toggles: RuntimeToggles::default(),
        }
    }
}

#[derive(Reflect, Clone, Debug, Default, PartialEq)]
pub struct DistanceMatchingPlayer {
    pub settings: DistanceMatchingSettings,
    clip: AnimSource,
    curve: DistanceCurve,
    last_key: usize,
    time_accumulator: f32,
}

impl DistanceMatchingPlayer {
    pub fn new(clip: AnimSource, curve: DistanceCurve, settings: DistanceMatchingSettings) -> Self {
        let mut player = Self {
            settings,
            clip,
            curve,
            last_key: 0,
            time_accumulator: 0.0,
        };
        player.initialize();
        player
    }

    pub fn clip(&self) -> &AnimSource {
        &self.clip
    }

    pub fn time_accumulator(&self) -> f32 {
        self.time_accumulator
    }

    pub fn effective_play_rate(&self) -> f32 {
        self.settings.play_rate * self.clip.play_rate
    }

    /// Restarts playback and the curve lookup from the beginning. Reversed playback starts at
    /// the end of the clip.
    pub fn initialize(&mut self) {
        self.last_key = 0;
        self.time_accumulator = if self.effective_play_rate() < 0.0 {
            self.clip.duration
        } else {
            0.0
        };
    }

    pub fn update(&mut self, input: &DistanceMatchingInput) -> TickRecord {
        match self.matched_time(input) {
            Some(time) => {
                let time = time.clamp(0.0, self.clip.duration);
                self.time_accumulator = if self.settings.smooth_rate > 0.0
                    && (time - self.time_accumulator).abs() < self.settings.smooth_time_threshold
                {
                    self.time_accumulator
                        + (time - self.time_accumulator) * self.settings.smooth_rate
                } else {
                    time
                };
            }
            None => {
                self.time_accumulator = self.clip.advance(
                    self.time_accumulator,
                    input.delta_time * self.effective_play_rate(),
                );
            }
        }

        TickRecord {
            effective_play_rate: self.effective_play_rate(),
            time_accumulator: self.time_accumulator,
            blend_weight: input.final_blend_weight,
        }
    }

    /// Clip time matching the desired distance, or `None` if playback should run freely.
    fn matched_time(&mut self, input: &DistanceMatchingInput) -> Option<f32> {
        let distance = input.desired_distance;
        let within_limit =
            self.settings.distance_limit < 0.0 || distance < self.settings.distance_limit;
        let destination_reached = self.settings.match_type == DistanceMatchType::Forward
            && distance < self.settings.destination_reached_threshold;

        if !input.toggles.distance_matching_enabled || !within_limit || destination_reached {
            return None;
        }

        let distance = if self.settings.negate_curve {
            -distance
        } else {
            distance
        };
        Some(self.curve.find_matching_time(distance, &mut self.last_key))
    }
}
