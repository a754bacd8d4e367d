// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Block modes and the per-footprint tables built from them.

use itertools::Itertools;
use log::debug;

use crate::astc::decimation::DecimationTable;
use crate::astc::partition::PartitionTable;
use crate::astc::quant::QuantLevel;
use crate::astc::{Footprint, MAX_PARTITIONS, MAX_WEIGHTS};

/// Number of raw 11 bit block mode values
pub const BLOCK_MODE_COUNT: usize = 2048;
pub const MIN_WEIGHT_BITS: usize = 24;
pub const MAX_WEIGHT_BITS: usize = 96;

/// What the 11 bit block mode field of a block says
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BlockModeKind {
    VoidExtent { hdr: bool },
    Reserved,
    Normal(BlockMode),
}

/// Weight grid layout for a normal block
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockMode {
    raw: u16,
    grid_width: u8,
    grid_height: u8,
    dual_plane: bool,
    weight_quant: QuantLevel,
}

impl BlockMode {
    /// Decode the block mode field. Only the low 11 bits of `raw` are used.
    pub fn decode(raw: u16) -> BlockModeKind {
        let bm = (raw & 0x7FF) as u32;

        if bm & 0x1FF == 0x1FC {
            return BlockModeKind::VoidExtent {
                hdr: bm & 0x200 != 0,
            };
        }
        if bm & 0xF == 0 || (bm & 0x3 == 0 && bm & 0x1C0 == 0x1C0) {
            return BlockModeKind::Reserved;
        }

        let layout = if bm & 0x3 != 0 {
            match (bm & 0x8 != 0, bm & 0x4 != 0) {
                (true, true) if bm & 0x100 != 0 => 4,
                (true, true) => 3,
                (true, false) => 2,
                (false, true) => 1,
                (false, false) => 0,
            }
        } else if bm & 0x100 != 0 {
            match (bm & 0x80 != 0, bm & 0x20 != 0) {
                (true, true) => 8,
                (true, false) => 7,
                (false, _) => 9,
            }
        } else if bm & 0x80 != 0 {
            6
        } else {
            5
        };

        let range = ((bm & 0x10) >> 4)
            | if layout < 5 {
                (bm & 0x3) << 1
            } else {
                (bm & 0xC) >> 1
            };

        let a = (bm >> 5) & 0x3;
        let b = (bm >> 7) & 0x3;
        let (width, height) = match layout {
            0 => (b + 4, a + 2),
            1 => (b + 8, a + 2),
            2 => (a + 2, b + 8),
            3 => (a + 2, (b & 1) + 6),
            4 => ((b & 1) + 2, a + 2),
            5 => (12, a + 2),
            6 => (a + 2, 12),
            7 => (6, 10),
            8 => (10, 6),
            _ => (a + 6, ((bm >> 9) & 0x3) + 6),
        };

        let dual_plane = layout != 9 && bm & 0x400 != 0;
        let high_precision = layout != 9 && bm & 0x200 != 0;

        // ranges 0 and 1 only occur in reserved patterns caught above
        let Some(weight_quant) = QuantLevel::from_index(
            (range as usize).saturating_sub(2) + if high_precision { 6 } else { 0 },
        ) else {
            return BlockModeKind::Reserved;
        };

        BlockModeKind::Normal(BlockMode {
            raw: bm as u16,
            grid_width: width as u8,
            grid_height: height as u8,
            dual_plane,
            weight_quant,
        })
    }

    pub fn raw(&self) -> u16 {
        self.raw
    }

    pub fn grid_width(&self) -> u32 {
        self.grid_width as u32
    }

    pub fn grid_height(&self) -> u32 {
        self.grid_height as u32
    }

    pub fn is_dual_plane(&self) -> bool {
        self.dual_plane
    }

    pub fn weight_quant(&self) -> QuantLevel {
        self.weight_quant
    }

    /// Weights per plane
    pub fn grid_size(&self) -> usize {
        self.grid_width as usize * self.grid_height as usize
    }

    /// Weights stored, counting both planes
    pub fn weight_count(&self) -> usize {
        self.grid_size() * if self.dual_plane { 2 } else { 1 }
    }

    pub fn weight_bits(&self) -> usize {
        self.weight_quant.bitcount(self.weight_count())
    }

    /// Whether a decoder accepts this mode for `footprint`
    pub fn is_valid_for(&self, footprint: Footprint) -> bool {
        self.grid_width() <= footprint.width()
            && self.grid_height() <= footprint.height()
            && self.weight_count() <= MAX_WEIGHTS
            && (MIN_WEIGHT_BITS..=MAX_WEIGHT_BITS).contains(&self.weight_bits())
    }
}

/// A weight grid size reachable at a footprint, and the finest weight levels it supports
#[derive(Clone, Debug)]
pub struct DecimationMode {
    pub table: DecimationTable,
    /// Finest weight level of any valid single plane mode on this grid
    pub max_quant_single: Option<QuantLevel>,
    /// Finest weight level of any valid dual plane mode on this grid
    pub max_quant_dual: Option<QuantLevel>,
}

/// A valid block mode with its grid and search preference
#[derive(Clone, Debug)]
pub struct BlockModeEntry {
    pub mode: BlockMode,
    /// Index into [`BlockSizeDescriptor::decimation`]
    pub decimation: usize,
    /// 0 for the most promising mode, 1 for the least
    pub percentile: f32,
}

/// Everything derived from a footprint: valid block modes, their weight grids and the
/// partition tables. Built once and shared read-only.
#[derive(Clone, Debug)]
pub struct BlockSizeDescriptor {
    footprint: Footprint,
    modes: Vec<BlockModeEntry>,
    decimations: Vec<DecimationMode>,
    lookup: Vec<Option<u16>>,
    partitions: PartitionTable,
}

/// Rough cost used to order modes: grids near 64 weight bits with dense grids tend to win
fn preference_cost(mode: &BlockMode, footprint: Footprint) -> f32 {
    let bits = mode.weight_bits() as f32;
    let density = mode.grid_size() as f32 / footprint.texel_count() as f32;
    (bits - 64.0).abs() / 64.0
        + (1.0 - density) * 0.5
        + if mode.is_dual_plane() { 0.5 } else { 0.0 }
}

impl BlockSizeDescriptor {
    pub fn new(footprint: Footprint) -> Self {
        let mut valid: Vec<BlockMode> = (0..BLOCK_MODE_COUNT as u16)
            .filter_map(|raw| match BlockMode::decode(raw) {
                BlockModeKind::Normal(mode) if mode.is_valid_for(footprint) => Some(mode),
                _ => None,
            })
            .collect();
        valid.sort_by_key(|m| m.raw());

        let grids: Vec<(u32, u32)> = valid
            .iter()
            .map(|m| (m.grid_width(), m.grid_height()))
            .unique()
            .sorted()
            .collect();

        let decimations: Vec<DecimationMode> = grids
            .iter()
            .map(|&(w, h)| {
                let on_grid = valid
                    .iter()
                    .filter(|m| (m.grid_width(), m.grid_height()) == (w, h));
                DecimationMode {
                    table: DecimationTable::new(footprint, w, h),
                    max_quant_single: on_grid
                        .clone()
                        .filter(|m| !m.is_dual_plane())
                        .map(|m| m.weight_quant())
                        .max(),
                    max_quant_dual: on_grid
                        .filter(|m| m.is_dual_plane())
                        .map(|m| m.weight_quant())
                        .max(),
                }
            })
            .collect();

        let ranked: Vec<usize> = (0..valid.len())
            .sorted_by(|&a, &b| {
                preference_cost(&valid[a], footprint)
                    .total_cmp(&preference_cost(&valid[b], footprint))
                    .then(valid[a].raw().cmp(&valid[b].raw()))
            })
            .collect();
        let mut percentiles = vec![0.0f32; valid.len()];
        let denominator = valid.len().saturating_sub(1).max(1) as f32;
        for (rank, &index) in ranked.iter().enumerate() {
            percentiles[index] = rank as f32 / denominator;
        }

        let mut lookup = vec![None; BLOCK_MODE_COUNT];
        let modes: Vec<BlockModeEntry> = valid
            .into_iter()
            .zip(percentiles)
            .enumerate()
            .map(|(i, (mode, percentile))| {
                lookup[mode.raw() as usize] = Some(i as u16);
                let grid = (mode.grid_width(), mode.grid_height());
                BlockModeEntry {
                    mode,
                    decimation: grids.binary_search(&grid).unwrap_or_default(),
                    percentile,
                }
            })
            .collect();

        let partitions = PartitionTable::new(footprint);

        debug!(
            "Built {} tables: {} block modes, {} weight grids, {:?} encodable partitionings",
            footprint,
            modes.len(),
            decimations.len(),
            (2..=MAX_PARTITIONS)
                .map(|c| partitions.encodable(c).len())
                .collect_vec()
        );

        Self {
            footprint,
            modes,
            decimations,
            lookup,
            partitions,
        }
    }

    pub fn footprint(&self) -> Footprint {
        self.footprint
    }

    /// Every block mode valid at this footprint, in raw value order
    pub fn modes(&self) -> &[BlockModeEntry] {
        &self.modes
    }

    /// The entry for a raw block mode value, if it is valid at this footprint
    pub fn mode(&self, raw: u16) -> Option<&BlockModeEntry> {
        self.lookup
            .get(raw as usize)
            .copied()
            .flatten()
            .map(|i| &self.modes[i as usize])
    }

    pub fn decimation(&self, index: usize) -> &DecimationMode {
        &self.decimations[index]
    }

    pub fn decimations(&self) -> &[DecimationMode] {
        &self.decimations
    }

    pub fn partitions(&self) -> &PartitionTable {
        &self.partitions
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn decodes_known_modes() {
        // layout 0, A = 2, B = 0, R = 4
        let BlockModeKind::Normal(mode) = BlockMode::decode(0b000_0100_0010) else {
            panic!("expected a normal block mode");
        };
        assert_eq!((mode.grid_width(), mode.grid_height()), (4, 4));
        assert_eq!(mode.weight_quant(), QuantLevel::Quant4);
        assert!(!mode.is_dual_plane());

        assert_eq!(BlockMode::decode(0x1FC), BlockModeKind::VoidExtent { hdr: false });
        assert_eq!(BlockMode::decode(0x3FC), BlockModeKind::VoidExtent { hdr: true });
        assert_eq!(BlockMode::decode(0), BlockModeKind::Reserved);
        assert_eq!(BlockMode::decode(0x1C0 | 0x4), BlockModeKind::Reserved);
    }

    #[test]
    fn layout_nine_has_no_dual_plane() {
        // layout 9 with A = B = 3 and bit 10 set
        let BlockModeKind::Normal(mode) = BlockMode::decode(0b111_0110_0100) else {
            panic!("expected a normal block mode");
        };
        assert!(!mode.is_dual_plane());
        assert_eq!((mode.grid_width(), mode.grid_height()), (9, 9));
    }

    #[rstest]
    fn every_footprint_has_usable_modes(#[values(0, 3, 9, 13)] which: usize) {
        let footprint = Footprint::ALL[which];
        let descriptor = BlockSizeDescriptor::new(footprint);
        assert!(!descriptor.modes().is_empty());
        for entry in descriptor.modes() {
            let mode = entry.mode;
            assert!(mode.is_valid_for(footprint));
            assert_eq!(descriptor.mode(mode.raw()).map(|e| e.mode), Some(mode));
            let table = &descriptor.decimation(entry.decimation).table;
            assert_eq!(table.grid_width(), mode.grid_width());
            assert_eq!(table.grid_height(), mode.grid_height());
            assert!((0.0..=1.0).contains(&entry.percentile));
        }
        assert!(descriptor.modes().iter().any(|e| e.percentile == 0.0));
        assert!(descriptor.mode(0x1FC).is_none());
    }
}
