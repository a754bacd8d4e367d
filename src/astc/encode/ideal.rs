// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Endpoint lines before any quantization, and the least squares refit that follows each
//! weight quantization.

use arrayvec::ArrayVec;
use vector_victor::Matrix;

use crate::astc::imageblock::{ErrorWeightBlock, ImageBlock};
use crate::astc::partition::PartitionInfo;
use crate::astc::{MAX_PARTITIONS, MAX_TEXELS};
use crate::color::{ColorF, ColorFImpl};

const POWER_ITERATIONS: usize = 8;

/// A pair of endpoints in 0..=255
pub type EndpointPair = (ColorF, ColorF);

/// Unquantized fit of one partitioning, optionally with one channel on its own weight plane
#[derive(Clone, Debug)]
pub struct IdealFit {
    pub endpoints: ArrayVec<EndpointPair, MAX_PARTITIONS>,
    /// Per texel position along its partition's line, 0..=1
    pub weights: ArrayVec<f32, MAX_TEXELS>,
    /// Per texel weights of the second plane; empty for single plane fits
    pub plane2_weights: ArrayVec<f32, MAX_TEXELS>,
    pub plane2_component: Option<usize>,
    /// Error added per texel by a unit change of its plane 1 weight
    pub sensitivity: ArrayVec<f32, MAX_TEXELS>,
    pub plane2_sensitivity: ArrayVec<f32, MAX_TEXELS>,
    /// Weighted squared error of the unquantized fit
    pub error: f32,
}

/// Texels of a partition that count, or all of them if none do
fn active_texels<'a>(texels: &'a [u8], weights: &'a ErrorWeightBlock) -> impl Iterator<Item = usize> + 'a {
    let any = texels.iter().any(|&t| !weights.is_zero(t as usize));
    texels
        .iter()
        .map(|&t| t as usize)
        .filter(move |&t| !any || !weights.is_zero(t))
}

fn importance(weights: &ErrorWeightBlock, texel: usize) -> f32 {
    weights.texel_weight(texel).max(1e-6)
}

/// Dominant direction of a set of points, by power iteration on their covariance
fn principal_direction(
    block: &ImageBlock,
    texels: &[usize],
    weights: &ErrorWeightBlock,
    mean: ColorF,
    mask: ColorF,
) -> ColorF {
    let covariance: Matrix<f32, 4, 4> = texels
        .iter()
        .map(|&t| {
            let d = (block.texel(t) - mean) * mask;
            d.mmul(&d.transpose()) * importance(weights, t)
        })
        .sum();

    // start from the column of the channel that varies most
    let widest = (0..4)
        .max_by(|&a, &b| covariance[(a, a)].total_cmp(&covariance[(b, b)]))
        .unwrap_or(0);
    let mut direction = covariance.col(widest);
    if direction.sqrmag() <= 1e-12 {
        return ColorF::default();
    }
    for _ in 0..POWER_ITERATIONS {
        match covariance.mmul(&direction).normalized() {
            Some(next) => direction = next,
            None => break,
        }
    }
    direction.normalized().unwrap_or_default()
}

/// Fit a line through every partition of `partitioning`. With `plane2` set, that channel is
/// fitted on its own.
pub fn compute_ideal(
    block: &ImageBlock,
    weights: &ErrorWeightBlock,
    partitioning: &PartitionInfo,
    plane2: Option<usize>,
) -> IdealFit {
    let texel_count = block.texel_count();
    let mut mask = ColorF::fill(1.0);
    if let Some(c) = plane2 {
        mask[c] = 0.0;
    }

    let mut ideal: ArrayVec<f32, MAX_TEXELS> = (0..texel_count).map(|_| 0.0).collect();
    let mut ideal2 = ideal.clone();
    let mut endpoints = ArrayVec::new();

    for p in 0..partitioning.partition_count() {
        let all = partitioning.texels(p);
        let texels: ArrayVec<usize, MAX_TEXELS> = active_texels(all, weights).collect();
        if texels.is_empty() {
            endpoints.push((ColorF::default(), ColorF::default()));
            continue;
        }

        let total: f32 = texels.iter().map(|&t| importance(weights, t)).sum();
        let mean = texels
            .iter()
            .map(|&t| block.texel(t) * importance(weights, t))
            .sum::<ColorF>()
            * (1.0 / total);

        let direction = principal_direction(block, &texels, weights, mean, mask);
        let project = |t: usize| ((block.texel(t) - mean) * mask).dot(&direction);
        let (lo, hi) = texels
            .iter()
            .map(|&t| project(t))
            .fold((f32::MAX, f32::MIN), |(lo, hi), s| (lo.min(s), hi.max(s)));

        let mut e0 = mean * mask;
        let mut e1 = e0;
        if hi - lo > 1e-6 {
            e0 = e0 + direction * lo;
            e1 = e1 + direction * hi;
            for &t in all {
                ideal[t as usize] = ((project(t as usize) - lo) / (hi - lo)).clamp(0.0, 1.0);
            }
        }

        // the decoder wants the brighter endpoint second
        if e1.rgb_sum() < e0.rgb_sum() {
            std::mem::swap(&mut e0, &mut e1);
            for &t in all {
                ideal[t as usize] = 1.0 - ideal[t as usize];
            }
        }

        if let Some(c) = plane2 {
            let (lo, hi) = texels
                .iter()
                .map(|&t| block.texel(t)[c])
                .fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
            e0[c] = lo;
            e1[c] = hi;
            if hi > lo {
                for &t in all {
                    ideal2[t as usize] = ((block.texel(t as usize)[c] - lo) / (hi - lo)).clamp(0.0, 1.0);
                }
            }
        }

        endpoints.push((e0.clamped(0.0, 255.0), e1.clamped(0.0, 255.0)));
    }

    let mut sensitivity = ArrayVec::new();
    let mut plane2_sensitivity = ArrayVec::new();
    let mut error = 0f32;
    for t in 0..texel_count {
        let (e0, e1) = endpoints[partitioning.partition_of(t)];
        let w = weights.weight(t);
        let delta = e1 - e0;
        let plane1_delta = delta * mask;
        sensitivity.push((plane1_delta * plane1_delta).dot(&w));
        if let Some(c) = plane2 {
            plane2_sensitivity.push(delta[c] * delta[c] * w[c]);
        }

        let texel = block.texel(t);
        for c in 0..4 {
            let u = if Some(c) == plane2 { ideal2[t] } else { ideal[t] };
            let d = e0[c] + u * delta[c] - texel[c];
            error += w[c] * d * d;
        }
    }

    IdealFit {
        endpoints,
        weights: ideal,
        plane2_weights: if plane2.is_some() {
            ideal2
        } else {
            ArrayVec::new()
        },
        plane2_component: plane2,
        sensitivity,
        plane2_sensitivity,
        error,
    }
}

/// For every channel, how well it tracks the other channels across the block: its largest
/// absolute correlation with any other varying channel. Channels that do not vary, or have
/// nothing to vary with, score 1.
pub fn channel_correlations(block: &ImageBlock, weights: &ErrorWeightBlock) -> [f32; 4] {
    let texels: ArrayVec<usize, MAX_TEXELS> = (0..block.texel_count())
        .filter(|&t| !weights.is_zero(t))
        .collect();
    if texels.len() < 2 {
        return [1.0; 4];
    }

    let n = texels.len() as f32;
    let mean = texels.iter().map(|&t| block.texel(t)).sum::<ColorF>() * (1.0 / n);
    let covariance: Matrix<f32, 4, 4> = texels
        .iter()
        .map(|&t| {
            let d = block.texel(t) - mean;
            d.mmul(&d.transpose())
        })
        .sum();
    let variance = |c: usize| covariance[(c, c)];

    std::array::from_fn(|c| {
        if variance(c) <= 1e-3 {
            return 1.0;
        }
        (0..4)
            .filter(|&d| d != c && variance(d) > 1e-3)
            .map(|d| covariance[(c, d)].abs() / (variance(c) * variance(d)).sqrt())
            .reduce(f32::max)
            .unwrap_or(1.0)
    })
}

/// Least squares endpoints for fixed texel weights (0..=64).
///
/// Each channel of each partition is solved on its own; `plane2` names the channel driven by
/// the second weight plane and that plane's texel weights.
pub fn refit_endpoints(
    block: &ImageBlock,
    weights: &ErrorWeightBlock,
    partitioning: &PartitionInfo,
    plane1: &[u8],
    plane2: Option<(usize, &[u8])>,
) -> ArrayVec<EndpointPair, MAX_PARTITIONS> {
    (0..partitioning.partition_count())
        .map(|p| {
            let texels: ArrayVec<usize, MAX_TEXELS> =
                active_texels(partitioning.texels(p), weights).collect();
            let mut e0 = ColorF::default();
            let mut e1 = ColorF::default();

            for c in 0..4 {
                let plane = match plane2 {
                    Some((component, plane2)) if component == c => plane2,
                    _ => plane1,
                };
                let (mut a, mut b, mut cc, mut d0, mut d1, mut total, mut sum) =
                    (0f64, 0f64, 0f64, 0f64, 0f64, 0f64, 0f64);
                for &t in &texels {
                    let w = weights.weight(t)[c].max(1e-6) as f64;
                    let u = plane[t] as f64 / 64.0;
                    let x = block.texel(t)[c] as f64;
                    a += w * (1.0 - u) * (1.0 - u);
                    b += w * u * (1.0 - u);
                    cc += w * u * u;
                    d0 += w * (1.0 - u) * x;
                    d1 += w * u * x;
                    total += w;
                    sum += w * x;
                }

                let det = a * cc - b * b;
                let (v0, v1) = if total <= 0.0 {
                    (0.0, 0.0)
                } else if det.abs() <= 1e-9 * (a + cc) * (a + cc) {
                    let mean = sum / total;
                    (mean, mean)
                } else {
                    ((cc * d0 - b * d1) / det, (a * d1 - b * d0) / det)
                };
                e0[c] = v0.clamp(0.0, 255.0) as f32;
                e1[c] = v1.clamp(0.0, 255.0) as f32;
            }
            (e0, e1)
        })
        .collect()
}
