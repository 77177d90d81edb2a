use bevy::{math::Vec2, reflect::Reflect};

use crate::{
    blend_space::{BlendSampleWeight, sample_weights},
    pose_database::{AnimSource, AnimSourceType, PoseFeature, PoseId},
    utils::math::wrap_time,
};

/// Non-current channels whose weight falls below this are removed from the pool.
pub const CHANNEL_REMOVAL_THRESHOLD: f32 = -0.05;

#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlendStatus {
    #[default]
    Dominant,
    /// Newly chosen, still fading in
    Chosen,
    /// Replaced by a newer channel, fading out
    Decay,
}

/// One in-flight playback of a source animation.
#[derive(Reflect, Clone, Debug, PartialEq)]
pub struct BlendChannel {
    pub start_pose: PoseId,
    pub source_type: AnimSourceType,
    pub source_index: usize,
    /// Time within the source at which the channel started playing
    pub start_time: f32,
    /// Current time within the source. Not wrapped for looping sources, see
    /// [`BlendChannel::sample_time`].
    pub anim_time: f32,
    pub anim_length: f32,
    pub age: f32,
    /// Time spent in the current [`BlendStatus`]
    pub status_age: f32,
    pub weight: f32,
    pub decay_start_weight: f32,
    pub status: BlendStatus,
    pub looping: bool,
    pub play_rate: f32,
    pub mirrored: bool,
    pub blend_space_position: Vec2,
    pub blend_sample_weights: Vec<BlendSampleWeight>,
}

impl BlendChannel {
    /// Starts playing `source` at `pose`, offset by `time_offset` seconds.
    pub fn new(
        pose: &PoseFeature,
        source: &AnimSource,
        status: BlendStatus,
        time_offset: f32,
    ) -> Self {
        let start_time = (pose.time + time_offset).max(0.0);
        let blend_sample_weights = match pose.source_type {
            AnimSourceType::BlendSpace => {
                sample_weights(&source.blend_samples, pose.blend_space_position)
            }
            _ => Vec::new(),
        };

        Self {
            start_pose: pose.id,
            source_type: pose.source_type,
            source_index: pose.source_index,
            start_time,
            anim_time: start_time,
            anim_length: source.duration,
            age: 0.0,
            status_age: 0.0,
            weight: match status {
                BlendStatus::Chosen => 0.0,
                _ => 1.0,
            },
            decay_start_weight: 1.0,
            status,
            looping: source.looping,
            play_rate: source.play_rate,
            mirrored: pose.mirrored,
            blend_space_position: pose.blend_space_position,
            blend_sample_weights,
        }
    }

    /// Time to sample the source at, wrapped into the clip for looping sources.
    pub fn sample_time(&self) -> f32 {
        if self.looping {
            wrap_time(self.anim_time, self.anim_length)
        } else {
            self.anim_time.clamp(0.0, self.anim_length)
        }
    }

    /// Ages the channel by `delta_time` scaled by `playback_rate` and returns its new weight.
    ///
    /// The current channel fades in over `blend_time` and then stays dominant. Any other
    /// channel fades out linearly from the weight it had when it stopped being current.
    pub fn update(
        &mut self,
        delta_time: f32,
        blend_time: f32,
        is_current: bool,
        playback_rate: f32,
    ) -> f32 {
        let step = delta_time * playback_rate;
        self.age += step;
        self.anim_time += step * self.play_rate;
        if !self.looping {
            self.anim_time = self.anim_time.min(self.anim_length);
        }

        if is_current {
            self.status_age += step;
            if self.status == BlendStatus::Chosen {
                self.weight = if blend_time > 0.0 {
                    (self.status_age / blend_time).min(1.0)
                } else {
                    1.0
                };
                if self.weight >= 1.0 {
                    self.status = BlendStatus::Dominant;
                    self.status_age = 0.0;
                }
            }
        } else {
            if self.status != BlendStatus::Decay {
                self.status = BlendStatus::Decay;
                self.decay_start_weight = self.weight;
                self.status_age = 0.0;
            }
            self.status_age += step;
            self.weight = if blend_time > 0.0 {
                self.decay_start_weight - self.status_age / blend_time
            } else {
                CHANNEL_REMOVAL_THRESHOLD - 1.0
            };
        }

        self.weight
    }
}

/// What the downstream evaluator needs to sample one channel.
#[derive(Reflect, Clone, Debug, PartialEq)]
pub struct ChannelSample {
    pub source_type: AnimSourceType,
    pub source_index: usize,
    pub time: f32,
    pub mirrored: bool,
    pub weight: f32,
    pub blend_sample_weights: Vec<BlendSampleWeight>,
}

/// Ordered set of concurrently playing channels. The last channel is always the most recently
/// chosen one.
#[derive(Reflect, Clone, Debug, Default, PartialEq)]
pub struct BlendChannelPool {
    channels: Vec<BlendChannel>,
    dominant: usize,
}

impl BlendChannelPool {
    pub fn channels(&self) -> &[BlendChannel] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn clear(&mut self) {
        self.channels.clear();
        self.dominant = 0;
    }

    /// The most recently chosen channel.
    pub fn primary(&self) -> Option<&BlendChannel> {
        self.channels.last()
    }

    pub fn primary_mut(&mut self) -> Option<&mut BlendChannel> {
        self.channels.last_mut()
    }

    /// The channel with the highest weight after the last update.
    pub fn dominant(&self) -> Option<&BlendChannel> {
        self.channels.get(self.dominant).or(self.channels.last())
    }

    pub fn dominant_index(&self) -> usize {
        self.dominant
    }

    /// Replaces every channel with `channel`, which becomes dominant.
    pub fn cut(&mut self, mut channel: BlendChannel) {
        channel.status = BlendStatus::Dominant;
        channel.weight = 1.0;
        self.channels.clear();
        self.channels.push(channel);
        self.dominant = 0;
    }

    /// Adds `channel` as the new current channel, fading in over the older ones.
    pub fn crossfade(&mut self, mut channel: BlendChannel) {
        channel.status = BlendStatus::Chosen;
        channel.status_age = 0.0;
        channel.weight = 0.0;
        self.channels.push(channel);
    }

    /// Ages all channels and drops the ones that finished fading out.
    pub fn update(&mut self, delta_time: f32, blend_time: f32, playback_rate: f32) {
        let mut highest_weight = f32::NEG_INFINITY;
        let mut highest = 0;
        let mut i = 0;

        while i < self.channels.len() {
            let is_current = i + 1 == self.channels.len();
            let weight = self.channels[i].update(delta_time, blend_time, is_current, playback_rate);

            if !is_current && weight < CHANNEL_REMOVAL_THRESHOLD {
                self.channels.remove(i);
                continue;
            }

            if weight > highest_weight {
                highest_weight = weight;
                highest = i;
            }
            i += 1;
        }

        self.dominant = highest;
    }

    /// Final blend weight of each channel. Newer channels are favoured by their position in the
    /// pool and the result is normalized to sum to one. If no channel has any weight, the
    /// primary channel gets all of it.
    pub fn blend_weights(&self) -> Vec<f32> {
        let count = self.channels.len();
        let mut weights: Vec<f32> = self
            .channels
            .iter()
            .enumerate()
            .map(|(i, c)| c.weight.max(0.0) * (i + 1) as f32 / count as f32)
            .collect();

        let total: f32 = weights.iter().sum();
        if total > 0.0 {
            for w in &mut weights {
                *w /= total;
            }
        } else if let Some(last) = weights.last_mut() {
            *last = 1.0;
        }

        weights
    }

    pub fn samples(&self) -> Vec<ChannelSample> {
        self.channels
            .iter()
            .zip(self.blend_weights())
            .map(|(channel, weight)| ChannelSample {
                source_type: channel.source_type,
                source_index: channel.source_index,
                time: channel.sample_time(),
                mirrored: channel.mirrored,
                weight,
                blend_sample_weights: channel.blend_sample_weights.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(pose: PoseId) -> BlendChannel {
        let pose = PoseFeature {
            id: pose,
            time: pose as f32 * 0.1,
            ..Default::default()
        };
        let source = AnimSource {
            duration: 10.0,
            looping: true,
            ..Default::default()
        };
        BlendChannel::new(&pose, &source, BlendStatus::Dominant, 0.0)
    }

    #[test]
    fn test_decayed_channel_is_removed() {
        let mut pool = BlendChannelPool::default();
        pool.cut(channel(0));
        pool.crossfade(channel(5));
        assert_eq!(pool.len(), 2);

        let dt = 0.35 / 21.0;
        for _ in 0..21 {
            pool.update(dt, 0.3, 1.0);
        }

        assert_eq!(pool.len(), 1);
        assert_eq!(pool.primary().map(|c| c.start_pose), Some(5));
        assert_eq!(pool.primary().map(|c| c.status), Some(BlendStatus::Dominant));
        assert_eq!(pool.blend_weights(), vec![1.0]);
    }

    #[test]
    fn test_coarse_ticks_still_remove() {
        let mut pool = BlendChannelPool::default();
        pool.cut(channel(0));
        pool.crossfade(channel(5));

        for _ in 0..7 {
            pool.update(0.05, 0.3, 1.0);
        }

        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_pool_converges_after_many_transitions() {
        let mut pool = BlendChannelPool::default();
        pool.cut(channel(0));
        for i in 1..6 {
            pool.crossfade(channel(i));
            pool.update(0.05, 0.3, 1.0);
        }
        assert!(pool.len() > 1);

        for _ in 0..20 {
            pool.update(0.05, 0.3, 1.0);
        }

        assert_eq!(pool.len(), 1);
        assert_eq!(pool.primary().map(|c| c.start_pose), Some(5));
    }

    #[test]
    fn test_dominant_tracks_highest_weight() {
        let mut pool = BlendChannelPool::default();
        pool.cut(channel(0));
        pool.crossfade(channel(3));

        pool.update(0.1, 0.3, 1.0);
        assert_eq!(pool.dominant_index(), 0);

        pool.update(0.1, 0.3, 1.0);
        assert_eq!(pool.dominant_index(), 1);
    }

    #[test]
    fn test_blend_weights_are_normalized() {
        let mut pool = BlendChannelPool::default();
        pool.cut(channel(0));
        pool.crossfade(channel(3));
        pool.update(0.15, 0.3, 1.0);

        let weights = pool.blend_weights();
        let total: f32 = weights.iter().sum();

        assert!((total - 1.0).abs() < 1e-5);
        // Old channel at 0.5, new channel at 0.5 but counted twice
        assert!((weights[0] - 1.0 / 3.0).abs() < 1e-5);
        assert!((weights[1] - 2.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_zero_weight_falls_back_to_primary() {
        let mut pool = BlendChannelPool::default();
        pool.cut(channel(0));
        pool.crossfade(channel(3));

        assert_eq!(pool.blend_weights(), vec![1.0, 0.0]);

        pool.channels[0].weight = 0.0;
        assert_eq!(pool.blend_weights(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_non_looping_channel_clamps_time() {
        let pose = PoseFeature {
            time: 0.9,
            ..Default::default()
        };
        let source = AnimSource {
            duration: 1.0,
            ..Default::default()
        };
        let mut channel = BlendChannel::new(&pose, &source, BlendStatus::Dominant, 0.0);

        channel.update(0.5, 0.3, true, 1.0);

        assert_eq!(channel.anim_time, 1.0);
        assert!((channel.age - 0.5).abs() < 1e-6);
    }
}
