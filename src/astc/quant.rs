// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Quantization levels and their transfer tables.
//!
//! A quantized value is stored as an ISE *symbol*: `(trit_or_quint << bits) | low_bits`.
//! Symbols are not ordered by the value they unquantize to, so every table here also keeps a
//! *rank* ordering, which is what the encoder's local search walks along.

use arrayvec::ArrayVec;
use strum::VariantArray;

/// The 21 quantization ranges ASTC defines, named by how many distinct values they hold
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::FromRepr,
    strum::VariantArray,
)]
#[repr(u8)]
pub enum QuantLevel {
    Quant2 = 0,
    Quant3,
    Quant4,
    Quant5,
    Quant6,
    Quant8,
    Quant10,
    Quant12,
    Quant16,
    Quant20,
    Quant24,
    Quant32,
    Quant40,
    Quant48,
    Quant64,
    Quant80,
    Quant96,
    Quant128,
    Quant160,
    Quant192,
    Quant256,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IseKind {
    Bits,
    Trits,
    Quints,
}

/// How a quantization level is stored: a trit or quint (or nothing) plus `bits` low bits
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IseEncoding {
    pub kind: IseKind,
    pub bits: u32,
}

impl QuantLevel {
    /// Finest level usable for weights
    pub const MAX_WEIGHT: QuantLevel = QuantLevel::Quant32;
    /// Coarsest level a decoder accepts for endpoint colors
    pub const MIN_COLOR: QuantLevel = QuantLevel::Quant6;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        u8::try_from(index).ok().and_then(Self::from_repr)
    }

    /// Number of distinct values
    pub fn values(self) -> u32 {
        use QuantLevel::*;
        match self {
            Quant2 => 2,
            Quant3 => 3,
            Quant4 => 4,
            Quant5 => 5,
            Quant6 => 6,
            Quant8 => 8,
            Quant10 => 10,
            Quant12 => 12,
            Quant16 => 16,
            Quant20 => 20,
            Quant24 => 24,
            Quant32 => 32,
            Quant40 => 40,
            Quant48 => 48,
            Quant64 => 64,
            Quant80 => 80,
            Quant96 => 96,
            Quant128 => 128,
            Quant160 => 160,
            Quant192 => 192,
            Quant256 => 256,
        }
    }

    pub fn encoding(self) -> IseEncoding {
        let values = self.values();
        let (kind, base) = if values % 3 == 0 {
            (IseKind::Trits, values / 3)
        } else if values % 5 == 0 {
            (IseKind::Quints, values / 5)
        } else {
            (IseKind::Bits, values)
        };
        IseEncoding {
            kind,
            bits: base.trailing_zeros(),
        }
    }

    /// Bits needed to store `items` values at this level
    pub fn bitcount(self, items: usize) -> usize {
        let encoding = self.encoding();
        let base = encoding.bits as usize * items;
        match encoding.kind {
            IseKind::Bits => base,
            IseKind::Trits => base + (8 * items + 4) / 5,
            IseKind::Quints => base + (7 * items + 2) / 3,
        }
    }

    /// Iterate levels from coarsest to finest
    pub fn all() -> impl DoubleEndedIterator<Item = QuantLevel> {
        QuantLevel::VARIANTS.iter().copied()
    }
}

/// Bits needed to encode `items` integers at `level` with the integer sequence encoding
pub fn bitcount(items: usize, level: QuantLevel) -> usize {
    level.bitcount(items)
}

/// The finest color level for `items` integers that fits in `bits`, if any
pub fn color_quant_for(items: usize, bits: usize) -> Option<QuantLevel> {
    QuantLevel::all().rev().find(|level| level.bitcount(items) <= bits)
}

/// Replicate the low `from` bits of `value` until they fill `to` bits
fn replicate(value: u32, from: u32, to: u32) -> u32 {
    if from == 0 {
        return 0;
    }
    let mut result = 0;
    let mut filled = 0;
    while filled < to {
        let shift = to as i32 - filled as i32 - from as i32;
        result |= if shift >= 0 {
            value << shift
        } else {
            value >> -shift
        };
        filled += from;
    }
    result & ((1 << to) - 1)
}

/// Unquantize a weight symbol to the 0..=64 interpolation range
pub fn unquantize_weight(level: QuantLevel, symbol: u8) -> u8 {
    let encoding = level.encoding();
    let symbol = symbol as u32;
    let low = symbol & ((1 << encoding.bits) - 1);
    let high = symbol >> encoding.bits;

    let value = match encoding.kind {
        IseKind::Bits => replicate(low, encoding.bits, 6),
        IseKind::Trits | IseKind::Quints => {
            let a = (low & 1) * 0x7F;
            let x = low >> 1;
            let (c, b) = match (encoding.kind, encoding.bits) {
                (IseKind::Trits, 0) => return [0, 32, 64][high.min(2) as usize],
                (IseKind::Trits, 1) => (50, 0),
                (IseKind::Trits, 2) => (23, (x << 6) | (x << 2) | x),
                (IseKind::Trits, _) => (11, (x << 5) | x),
                (IseKind::Quints, 0) => return [0, 16, 32, 48, 64][high.min(4) as usize],
                (IseKind::Quints, 1) => (28, 0),
                (_, _) => (13, (x << 6) | (x << 1)),
            };
            let t = (high * c + b) ^ a;
            (a & 0x20) | (t >> 2)
        }
    };

    if value > 32 {
        value as u8 + 1
    } else {
        value as u8
    }
}

/// Unquantize a color endpoint symbol to the 0..=255 range
pub fn unquantize_color(level: QuantLevel, symbol: u8) -> u8 {
    let encoding = level.encoding();
    let symbol = symbol as u32;
    let low = symbol & ((1 << encoding.bits) - 1);
    let high = symbol >> encoding.bits;

    match encoding.kind {
        IseKind::Bits => replicate(low, encoding.bits, 8) as u8,
        IseKind::Trits | IseKind::Quints => {
            let a = (low & 1) * 0x1FF;
            let x = low >> 1;
            let (c, b) = match (encoding.kind, encoding.bits) {
                // b000b0bb0
                (IseKind::Trits, 2) => (93, (x << 8) | (x << 4) | (x << 2) | (x << 1)),
                // cb000cbcb
                (IseKind::Trits, 3) => (44, (x << 7) | (x << 2) | x),
                // dcb000dcb
                (IseKind::Trits, 4) => (22, (x << 6) | x),
                // edcb000ed
                (IseKind::Trits, 5) => (11, (x << 5) | (x >> 2)),
                // fedcb000f
                (IseKind::Trits, 6) => (5, (x << 4) | (x >> 4)),
                (IseKind::Trits, _) => (204, 0),
                // b0000bb00
                (IseKind::Quints, 2) => (54, (x << 8) | (x << 3) | (x << 2)),
                // cb0000cbc
                (IseKind::Quints, 3) => (26, (x << 7) | (x << 1) | (x >> 1)),
                // dcb0000dc
                (IseKind::Quints, 4) => (13, (x << 6) | (x >> 1)),
                // edcb0000e
                (IseKind::Quints, 5) => (6, (x << 5) | (x >> 3)),
                (_, _) => (113, 0),
            };
            if encoding.bits == 0 {
                // trits and quints without low bits never appear in color data, spread them evenly
                return ((high * 255) / (level.values() - 1)).min(255) as u8;
            }
            let t = (high * c + b) ^ a;
            ((a & 0x80) | (t >> 2)) as u8
        }
    }
}

/// Symbols of a level ordered by the value they unquantize to
fn ranked_symbols(level: QuantLevel, unquantized: &[u8]) -> Vec<u8> {
    let mut ranked: Vec<u8> = (0..level.values() as usize).map(|s| s as u8).collect();
    ranked.sort_by_key(|&s| (unquantized[s as usize], s));
    ranked
}

/// Weight quantization table for one level.
///
/// Holds the unquantized value of every symbol (0..=64), links to the neighboring symbol in
/// value order, and a 1025 entry nearest-symbol lookup indexed by `round(weight * 1024)`.
#[derive(Clone, Debug)]
pub struct QuantizationTable {
    unquantized: ArrayVec<u8, 32>,
    prev: ArrayVec<u8, 32>,
    next: ArrayVec<u8, 32>,
    nearest: Box<[u8; 1025]>,
}

impl QuantizationTable {
    pub fn new(level: QuantLevel) -> Self {
        debug_assert!(level <= QuantLevel::MAX_WEIGHT);
        let count = level.values() as usize;
        let unquantized: ArrayVec<u8, 32> =
            (0..count).map(|s| unquantize_weight(level, s as u8)).collect();

        let ranked = ranked_symbols(level, &unquantized);
        let mut prev: ArrayVec<u8, 32> = (0..count as u8).collect();
        let mut next = prev.clone();
        for (rank, &symbol) in ranked.iter().enumerate() {
            prev[symbol as usize] = ranked[rank.saturating_sub(1)];
            next[symbol as usize] = ranked[usize::min(rank + 1, count - 1)];
        }

        let mut nearest = Box::new([0u8; 1025]);
        let mut rank = 0;
        for (i, entry) in nearest.iter_mut().enumerate() {
            let target = i as f32 * 64.0 / 1024.0;
            // walk up the ranks while the next value is strictly closer
            while rank + 1 < count {
                let here = (unquantized[ranked[rank] as usize] as f32 - target).abs();
                let above = (unquantized[ranked[rank + 1] as usize] as f32 - target).abs();
                if above < here {
                    rank += 1;
                } else {
                    break;
                }
            }
            *entry = ranked[rank];
        }

        Self {
            unquantized,
            prev,
            next,
            nearest,
        }
    }

    /// Weight in 0..=64 for a symbol
    pub fn unquantize(&self, symbol: u8) -> u8 {
        self.unquantized[symbol as usize]
    }

    /// Symbol nearest to a weight in 0.0..=1.0
    pub fn quantize(&self, weight: f32) -> u8 {
        let index = (weight.clamp(0.0, 1.0) * 1024.0).round() as usize;
        self.nearest[index.min(1024)]
    }

    /// Next lower symbol in value order, or the same symbol at the bottom
    pub fn prev(&self, symbol: u8) -> u8 {
        self.prev[symbol as usize]
    }

    /// Next higher symbol in value order, or the same symbol at the top
    pub fn next(&self, symbol: u8) -> u8 {
        self.next[symbol as usize]
    }
}

/// Color endpoint quantization table for one level
#[derive(Clone, Debug)]
pub struct ColorQuantTable {
    unquantized: Vec<u8>,
    nearest: [u8; 256],
}

impl ColorQuantTable {
    pub fn new(level: QuantLevel) -> Self {
        let count = level.values() as usize;
        let unquantized: Vec<u8> = (0..count).map(|s| unquantize_color(level, s as u8)).collect();
        let ranked = ranked_symbols(level, &unquantized);

        let mut nearest = [0u8; 256];
        let mut rank = 0;
        for (value, entry) in nearest.iter_mut().enumerate() {
            while rank + 1 < count {
                let here = (unquantized[ranked[rank] as usize] as i32 - value as i32).abs();
                let above = (unquantized[ranked[rank + 1] as usize] as i32 - value as i32).abs();
                if above < here {
                    rank += 1;
                } else {
                    break;
                }
            }
            *entry = ranked[rank];
        }

        Self {
            unquantized,
            nearest,
        }
    }

    pub fn unquantize(&self, symbol: u8) -> u8 {
        self.unquantized[symbol as usize]
    }

    /// Symbol whose unquantized value is nearest to `value`
    pub fn quantize(&self, value: f32) -> u8 {
        self.nearest[value.round().clamp(0.0, 255.0) as usize]
    }

    /// Symbol nearest to `value`, restricted to those whose unquantized value satisfies `keep`
    pub fn quantize_where(&self, value: i32, keep: impl Fn(u8) -> bool) -> Option<u8> {
        (0..self.unquantized.len())
            .filter(|&s| keep(self.unquantized[s]))
            .min_by_key(|&s| ((self.unquantized[s] as i32 - value).abs(), self.unquantized[s]))
            .map(|s| s as u8)
    }
}

/// Every weight and color table, built once and shared read-only by all workers
#[derive(Clone, Debug)]
pub struct QuantTables {
    weights: Vec<QuantizationTable>,
    colors: Vec<ColorQuantTable>,
}

impl QuantTables {
    pub fn new() -> Self {
        Self {
            weights: QuantLevel::all()
                .take_while(|&level| level <= QuantLevel::MAX_WEIGHT)
                .map(QuantizationTable::new)
                .collect(),
            colors: QuantLevel::all().map(ColorQuantTable::new).collect(),
        }
    }

    pub fn weight(&self, level: QuantLevel) -> &QuantizationTable {
        &self.weights[level.index().min(self.weights.len() - 1)]
    }

    pub fn color(&self, level: QuantLevel) -> &ColorQuantTable {
        &self.colors[level.index()]
    }
}

impl Default for QuantTables {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;

    #[test]
    fn bitcount_matches_published_costs() {
        use QuantLevel::*;
        // sixteen weights, as in a full 4x4 grid
        let costs: Vec<usize> = [
            Quant2, Quant3, Quant4, Quant5, Quant6, Quant8, Quant10, Quant12, Quant16, Quant20,
            Quant24, Quant32,
        ]
        .into_iter()
        .map(|level| bitcount(16, level))
        .collect();
        assert_eq!(costs, [16, 26, 32, 38, 42, 48, 54, 58, 64, 70, 74, 80]);

        assert_eq!(bitcount(1, Quant3), 2);
        assert_eq!(bitcount(4, Quant3), 7);
        assert_eq!(bitcount(2, Quant5), 5);
        assert_eq!(bitcount(18, Quant256), 144);
        assert_eq!(bitcount(8, Quant6), 21);
    }

    #[test]
    fn encodings_follow_value_counts() {
        for level in QuantLevel::all() {
            let encoding = level.encoding();
            let multiplier = match encoding.kind {
                IseKind::Bits => 1,
                IseKind::Trits => 3,
                IseKind::Quints => 5,
            };
            assert_eq!(multiplier << encoding.bits, level.values(), "{level:?}");
        }
    }

    #[test]
    fn unquantized_values_are_monotonic_in_rank_order() {
        for level in QuantLevel::all() {
            let colors = ColorQuantTable::new(level);
            let values = (0..level.values())
                .map(|s| colors.unquantize(s as u8))
                .sorted()
                .collect_vec();
            assert!(values.windows(2).all(|w| w[0] < w[1]), "{level:?} colors {values:?}");
            assert_eq!(values.first(), Some(&0));
            assert_eq!(values.last(), Some(&255));
        }

        for level in QuantLevel::all().take_while(|&l| l <= QuantLevel::MAX_WEIGHT) {
            let table = QuantizationTable::new(level);
            let mut symbol = table.quantize(0.0);
            assert_eq!(table.unquantize(symbol), 0);
            for _ in 1..level.values() {
                let next = table.next(symbol);
                assert!(table.unquantize(next) > table.unquantize(symbol), "{level:?}");
                assert_eq!(table.prev(next), symbol);
                symbol = next;
            }
            assert_eq!(table.unquantize(symbol), 64);
            assert_eq!(table.next(symbol), symbol);
        }
    }

    #[test]
    fn known_trit_colors() {
        let values = (0..6)
            .map(|s| unquantize_color(QuantLevel::Quant6, s))
            .collect_vec();
        assert_eq!(values, [0, 255, 51, 204, 102, 153]);
        let identity = (0..=255u8).all(|v| unquantize_color(QuantLevel::Quant256, v) == v);
        assert!(identity);
    }

    #[test]
    fn nearest_lookup_picks_closest_weight() {
        let table = QuantizationTable::new(QuantLevel::Quant3);
        assert_eq!(table.unquantize(table.quantize(0.2)), 0);
        assert_eq!(table.unquantize(table.quantize(0.3)), 32);
        assert_eq!(table.unquantize(table.quantize(0.9)), 64);

        let colors = ColorQuantTable::new(QuantLevel::Quant6);
        assert_eq!(colors.unquantize(colors.quantize(140.0)), 153);
        assert_eq!(colors.unquantize(colors.quantize(20.0)), 0);
    }

    #[test]
    fn color_level_fits_budget() {
        assert_eq!(color_quant_for(2, 16), Some(QuantLevel::Quant256));
        assert_eq!(color_quant_for(8, 21), Some(QuantLevel::Quant6));
        assert_eq!(color_quant_for(18, 10), None);
    }
}
