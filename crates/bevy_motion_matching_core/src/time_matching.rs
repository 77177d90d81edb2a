//! Playback of a single clip started so that a marker in the clip lines up with the moment
//! the character reaches its destination.

use std::{fmt, sync::Arc};

use crate::{
    collaborators::DistanceToMarkerProvider, motion_matcher::TickRecord,
    pose_database::AnimSource, settings::RuntimeToggles,
};

#[derive(Clone)]
pub struct TimeMatchingPlayer {
    clip: AnimSource,
    /// Time of the marker within the clip
    pub marker_time: f32,
    pub start_position: f32,
    pub play_rate: f32,
    provider: Option<Arc<dyn DistanceToMarkerProvider>>,
    desired_time: f32,
    time_accumulator: f32,
}

impl TimeMatchingPlayer {
    pub fn new(clip: AnimSource, marker_time: f32) -> Self {
        Self {
            clip,
            marker_time,
            start_position: 0.0,
            play_rate: 1.0,
            provider: None,
            desired_time: 0.0,
            time_accumulator: 0.0,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn DistanceToMarkerProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn clip(&self) -> &AnimSource {
        &self.clip
    }

    pub fn time_accumulator(&self) -> f32 {
        self.time_accumulator
    }

    /// Clip time the character is expected to need before reaching the marker, as of the last
    /// initialization.
    pub fn desired_time(&self) -> f32 {
        self.desired_time
    }

    pub fn effective_play_rate(&self) -> f32 {
        self.play_rate * self.clip.play_rate
    }

    /// Picks the start time so that the marker is reached when the provider expects the
    /// character to arrive.
    pub fn initialize(&mut self, toggles: RuntimeToggles) {
        self.time_accumulator = self.start_position;

        if let Some(provider) = &self.provider {
            self.desired_time = provider.time_to_marker();
        }
        self.desired_time *= self.effective_play_rate();

        if toggles.time_matching_enabled {
            self.time_accumulator = self.marker_time - self.desired_time;
        }

        if self.start_position == 0.0 && self.effective_play_rate() < 0.0 {
            self.time_accumulator = self.clip.duration;
        }
    }

    pub fn update(&mut self, delta_time: f32, final_blend_weight: f32) -> TickRecord {
        self.time_accumulator = self
            .clip
            .advance(self.time_accumulator, delta_time * self.effective_play_rate());

        TickRecord {
            effective_play_rate: self.effective_play_rate(),
            time_accumulator: self.time_accumulator,
            blend_weight: final_blend_weight,
        }
    }
}

impl fmt::Debug for TimeMatchingPlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeMatchingPlayer")
            .field("clip", &self.clip.name)
            .field("marker_time", &self.marker_time)
            .field("start_position", &self.start_position)
            .field("play_rate", &self.play_rate)
            .field("provider", &self.provider.is_some())
            .field("time_accumulator", &self.time_accumulator)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider(f32);

    impl DistanceToMarkerProvider for FixedProvider {
        fn time_to_marker(&self) -> f32 {
            self.0
        }
    }

    fn player(clip_rate: f32) -> TimeMatchingPlayer {
        TimeMatchingPlayer::new(
            AnimSource {
                name: "vault".into(),
                duration: 2.0,
                play_rate: clip_rate,
                ..Default::default()
            },
            1.0,
        )
        .with_provider(Arc::new(FixedProvider(0.4)))
    }

    #[test]
    fn test_starts_ahead_of_marker() {
        let mut player = player(1.0);
        player.initialize(RuntimeToggles::default());

        assert!((player.time_accumulator() - 0.6).abs() < 1e-5);

        let record = player.update(0.4, 1.0);
        assert!((record.time_accumulator - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_desired_time_scales_with_play_rate() {
        let mut player = player(2.0);
        player.initialize(RuntimeToggles::default());

        assert!((player.desired_time() - 0.8).abs() < 1e-5);
        assert!((player.time_accumulator() - 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_disabled_starts_at_start_position() {
        let mut player = player(1.0);
        player.start_position = 0.3;
        player.initialize(RuntimeToggles {
            time_matching_enabled: false,
            ..Default::default()
        });

        assert_eq!(player.time_accumulator(), 0.3);
    }

    #[test]
    fn test_reversed_playback_starts_at_end() {
        let mut player = player(1.0);
        player.play_rate = -1.0;
        player.initialize(RuntimeToggles::default());

        assert_eq!(player.time_accumulator(), 2.0);
    }
}
