// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Partition assignment.
//!
//! Partitionings are not stored in the bitstream; both sides regenerate them from a 10 bit
//! seed with the same hash, so the function below has to match other decoders bit for bit.

use std::collections::HashSet;

use arrayvec::ArrayVec;

use crate::astc::{Footprint, MAX_PARTITIONS, MAX_TEXELS, PARTITION_SEEDS};

/// Texels sampled for coverage bitmaps when ranking partitionings
pub const SAMPLE_TEXELS: usize = 64;

fn hash52(p: u32) -> u32 {
    let mut p = std::num::Wrapping(p);
    p ^= p >> 15;
    p -= p << 17;
    p += p << 7;
    p += p << 4;
    p ^= p >> 5;
    p += p << 16;
    p ^= p >> 7;
    p ^= p >> 3;
    p ^= p << 6;
    p ^= p >> 17;
    p.0
}

/// Partition of the texel at (`x`, `y`, `z`) for a seed and partition count
pub fn select_partition(seed: u32, x: u32, y: u32, z: u32, count: usize, small_block: bool) -> usize {
    if count <= 1 {
        return 0;
    }

    let (x, y, z) = if small_block {
        (x << 1, y << 1, z << 1)
    } else {
        (x, y, z)
    };

    let seed = seed + (count as u32 - 1) * 1024;
    let rnum = hash52(seed);

    let mut seeds: [u32; 12] = [
        rnum & 0xF,
        (rnum >> 4) & 0xF,
        (rnum >> 8) & 0xF,
        (rnum >> 12) & 0xF,
        (rnum >> 16) & 0xF,
        (rnum >> 20) & 0xF,
        (rnum >> 24) & 0xF,
        (rnum >> 28) & 0xF,
        (rnum >> 18) & 0xF,
        (rnum >> 22) & 0xF,
        (rnum >> 26) & 0xF,
        ((rnum >> 30) | (rnum << 2)) & 0xF,
    ];
    for s in seeds.iter_mut() {
        *s *= *s;
    }

    let (sh1, sh2) = if seed & 1 != 0 {
        (
            if seed & 2 != 0 { 4 } else { 5 },
            if count == 3 { 6 } else { 5 },
        )
    } else {
        (
            if count == 3 { 6 } else { 5 },
            if seed & 2 != 0 { 4 } else { 5 },
        )
    };
    let sh3 = if seed & 0x10 != 0 { sh1 } else { sh2 };

    for (i, s) in seeds.iter_mut().enumerate() {
        *s >>= match i {
            0..=7 if i % 2 == 0 => sh1,
            0..=7 => sh2,
            _ => sh3,
        };
    }

    let a = (seeds[0] * x + seeds[1] * y + seeds[10] * z + (rnum >> 14)) & 0x3F;
    let b = (seeds[2] * x + seeds[3] * y + seeds[11] * z + (rnum >> 10)) & 0x3F;
    let c = if count >= 3 {
        (seeds[4] * x + seeds[5] * y + seeds[8] * z + (rnum >> 6)) & 0x3F
    } else {
        0
    };
    let d = if count >= 4 {
        (seeds[6] * x + seeds[7] * y + seeds[9] * z + (rnum >> 2)) & 0x3F
    } else {
        0
    };

    if a >= b && a >= c && a >= d {
        0
    } else if b >= c && b >= d {
        1
    } else if c >= d {
        2
    } else {
        3
    }
}

/// Texel indices used for coverage bitmaps: every texel for small footprints, otherwise an
/// evenly strided subset
pub fn sample_texels(texel_count: usize) -> ArrayVec<u8, SAMPLE_TEXELS> {
    if texel_count <= SAMPLE_TEXELS {
        (0..texel_count).map(|t| t as u8).collect()
    } else {
        (0..SAMPLE_TEXELS)
            .map(|i| (i * texel_count / SAMPLE_TEXELS) as u8)
            .collect()
    }
}

/// One partitioning of a footprint
#[derive(Clone, Debug)]
pub struct PartitionInfo {
    count: usize,
    index: u16,
    assignment: ArrayVec<u8, MAX_TEXELS>,
    texels: [ArrayVec<u8, MAX_TEXELS>; MAX_PARTITIONS],
    coverage: [u64; MAX_PARTITIONS],
}

impl PartitionInfo {
    pub fn new(footprint: Footprint, count: usize, index: u16, sample: &[u8]) -> Self {
        let small = footprint.is_small();
        let mut assignment = ArrayVec::new();
        let mut texels: [ArrayVec<u8, MAX_TEXELS>; MAX_PARTITIONS] = Default::default();

        for y in 0..footprint.height() {
            for x in 0..footprint.width() {
                let partition = select_partition(index as u32, x, y, 0, count, small);
                texels[partition].push(assignment.len() as u8);
                assignment.push(partition as u8);
            }
        }

        let mut coverage = [0u64; MAX_PARTITIONS];
        for (bit, &texel) in sample.iter().enumerate() {
            coverage[assignment[texel as usize] as usize] |= 1 << bit;
        }

        Self {
            count,
            index,
            assignment,
            texels,
            coverage,
        }
    }

    /// The trivial partitioning with every texel in partition 0
    pub fn single(footprint: Footprint, sample: &[u8]) -> Self {
        Self::new(footprint, 1, 0, sample)
    }

    pub fn partition_count(&self) -> usize {
        self.count
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn partition_of(&self, texel: usize) -> usize {
        self.assignment[texel] as usize
    }

    pub fn assignment(&self) -> &[u8] {
        &self.assignment
    }

    /// Texel indices belonging to `partition`
    pub fn texels(&self, partition: usize) -> &[u8] {
        &self.texels[partition]
    }

    /// Sampled texels belonging to `partition`, one bit per sample
    pub fn coverage(&self, partition: usize) -> u64 {
        self.coverage[partition]
    }

    /// Whether every one of the requested partitions received at least one texel
    pub fn is_complete(&self) -> bool {
        self.texels[..self.count].iter().all(|t| !t.is_empty())
    }

    /// Assignment relabeled in order of first appearance, identical for equivalent partitionings
    fn canonical(&self) -> ArrayVec<u8, MAX_TEXELS> {
        let mut relabel = [u8::MAX; MAX_PARTITIONS];
        let mut next = 0;
        self.assignment
            .iter()
            .map(|&p| {
                if relabel[p as usize] == u8::MAX {
                    relabel[p as usize] = next;
                    next += 1;
                }
                relabel[p as usize]
            })
            .collect()
    }
}

/// Every partitioning of one footprint for 2, 3 and 4 partitions
#[derive(Clone, Debug)]
pub struct PartitionTable {
    single: PartitionInfo,
    tables: [Vec<PartitionInfo>; MAX_PARTITIONS - 1],
    encodable: [Vec<u16>; MAX_PARTITIONS - 1],
    sample: ArrayVec<u8, SAMPLE_TEXELS>,
}

impl PartitionTable {
    pub fn new(footprint: Footprint) -> Self {
        let sample = sample_texels(footprint.texel_count());
        let single = PartitionInfo::single(footprint, &sample);

        let mut tables: [Vec<PartitionInfo>; MAX_PARTITIONS - 1] = Default::default();
        let mut encodable: [Vec<u16>; MAX_PARTITIONS - 1] = Default::default();
        for count in 2..=MAX_PARTITIONS {
            let table: Vec<PartitionInfo> = (0..PARTITION_SEEDS as u16)
                .map(|index| PartitionInfo::new(footprint, count, index, &sample))
                .collect();

            // seeds that collapse a partition, or repeat an earlier seed, are never searched
            let mut seen = HashSet::new();
            encodable[count - 2] = table
                .iter()
                .filter(|info| info.is_complete() && seen.insert(info.canonical()))
                .map(|info| info.index())
                .collect();
            tables[count - 2] = table;
        }

        Self {
            single,
            tables,
            encodable,
            sample,
        }
    }

    /// The partitioning for a count and seed. Count 1 ignores the seed.
    pub fn get(&self, count: usize, index: u16) -> &PartitionInfo {
        match count {
            0 | 1 => &self.single,
            count => &self.tables[count.min(MAX_PARTITIONS) - 2][index as usize % PARTITION_SEEDS],
        }
    }

    /// Seeds worth searching for a partition count
    pub fn encodable(&self, count: usize) -> &[u16] {
        match count {
            2..=MAX_PARTITIONS => &self.encodable[count - 2],
            _ => &[],
        }
    }

    pub fn sample(&self) -> &[u8] {
        &self.sample
    }
}
