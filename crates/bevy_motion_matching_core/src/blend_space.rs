use bevy::{math::Vec2, reflect::Reflect};

use crate::pose_database::BlendSample;

const EXACT_HIT_DISTANCE_SQ: f32 = 1e-8;

/// Contribution of one blend space sample to a sampled position.
#[derive(Reflect, Clone, Copy, Debug, PartialEq)]
pub struct BlendSampleWeight {
    pub sample: usize,
    pub weight: f32,
}

/// Computes per-sample weights for a position in a blend space, using inverse squared distance
/// weighting. Weights sum to one. A position on top of a sample gives that sample full weight.
pub fn sample_weights(samples: &[BlendSample], position: Vec2) -> Vec<BlendSampleWeight> {
    if let Some(hit) = samples
        .iter()
        .position(|s| s.position.distance_squared(position) < EXACT_HIT_DISTANCE_SQ)
    {
        return vec![BlendSampleWeight {
            sample: hit,
            weight: 1.0,
        }];
    }

    let mut weights: Vec<_> = samples
        .iter()
        .enumerate()
        .map(|(sample, s)| BlendSampleWeight {
            sample,
            weight: 1.0 / s.position.distance_squared(position),
        })
        .collect();

    let total: f32 = weights.iter().map(|w| w.weight).sum();
    if total > 0.0 {
        for w in &mut weights {
            w.weight /= total;
        }
    }

    weights
}
