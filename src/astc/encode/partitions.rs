// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Ranking partitionings against a quick clustering of the block.
//!
//! The block's sampled texels are split into `count` clusters with a few rounds of k-means.
//! Each encodable partitioning is then scored by how many sampled texels it places in a
//! different group than the clustering does, under the best relabeling of its partitions.

use arrayvec::ArrayVec;
use itertools::Itertools;

use crate::astc::imageblock::{ErrorWeightBlock, ImageBlock};
use crate::astc::partition::{PartitionTable, SAMPLE_TEXELS};
use crate::astc::MAX_PARTITIONS;
use crate::color::ColorF;

const KMEANS_ROUNDS: usize = 4;

fn nearest(centroids: &[ColorF], point: ColorF) -> usize {
    centroids
        .iter()
        .map(|&c| (point - c).sqrmag())
        .position_min_by(|a, b| a.total_cmp(b))
        .unwrap_or(0)
}

/// One coverage bitmap per cluster, over the sampled texels
pub fn cluster_bitmaps(
    block: &ImageBlock,
    weights: &ErrorWeightBlock,
    sample: &[u8],
    count: usize,
) -> (ArrayVec<u64, MAX_PARTITIONS>, u64) {
    let points: ArrayVec<(usize, ColorF), SAMPLE_TEXELS> = sample
        .iter()
        .enumerate()
        .filter(|&(_, &t)| !weights.is_zero(t as usize))
        .map(|(bit, &t)| (bit, block.texel(t as usize)))
        .collect();
    let mask = points.iter().fold(0u64, |mask, &(bit, _)| mask | 1 << bit);

    let mut centroids: ArrayVec<ColorF, MAX_PARTITIONS> = ArrayVec::new();
    let average = block.average();
    let farthest_from = |centroids: &[ColorF]| {
        points
            .iter()
            .map(|&(_, p)| match centroids {
                [] => (p - average).sqrmag(),
                _ => centroids
                    .iter()
                    .map(|&c| (p - c).sqrmag())
                    .fold(f32::MAX, f32::min),
            })
            .position_max_by(|a, b| a.total_cmp(b))
            .map(|i| points[i].1)
    };
    while centroids.len() < count {
        let seed = farthest_from(&centroids).unwrap_or(average);
        centroids.push(seed);
    }

    let mut labels: ArrayVec<usize, SAMPLE_TEXELS> = points.iter().map(|_| 0).collect();
    for _ in 0..KMEANS_ROUNDS {
        for (label, &(_, p)) in labels.iter_mut().zip(&points) {
            *label = nearest(&centroids, p);
        }
        for (k, centroid) in centroids.iter_mut().enumerate() {
            let members = labels.iter().zip(&points).filter(|(&l, _)| l == k);
            let (sum, n) = members.fold((ColorF::default(), 0), |(sum, n), (_, &(_, p))| (sum + p, n + 1));
            if n > 0 {
                *centroid = sum * (1.0 / n as f32);
            }
        }
    }

    let mut bitmaps: ArrayVec<u64, MAX_PARTITIONS> = (0..count).map(|_| 0).collect();
    for (&label, &(bit, _)) in labels.iter().zip(&points) {
        bitmaps[label] |= 1 << bit;
    }
    (bitmaps, mask)
}

/// Fill `ranked` with (mismatch, seed) for every encodable partitioning of `count`
/// partitions, best first
pub fn rank_partitionings(
    block: &ImageBlock,
    weights: &ErrorWeightBlock,
    table: &PartitionTable,
    count: usize,
    ranked: &mut Vec<(u32, u16)>,
) {
    ranked.clear();
    let (bitmaps, mask) = cluster_bitmaps(block, weights, table.sample(), count);
    let permutations = (0..count).permutations(count).collect_vec();

    ranked.extend(table.encodable(count).iter().map(|&seed| {
        let info = table.get(count, seed);
        let mismatch = permutations
            .iter()
            .map(|perm| {
                perm.iter()
                    .enumerate()
                    .map(|(p, &k)| ((info.coverage(p) ^ bitmaps[k]) & mask).count_ones())
                    .sum::<u32>()
            })
            .min()
            .unwrap_or(0);
        (mismatch, seed)
    }));
    ranked.sort_unstable();
}
