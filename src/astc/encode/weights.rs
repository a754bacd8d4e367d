// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Weight grids: spreading ideal texel weights onto a decimated grid, estimating what a grid
//! and weight precision will cost, and nudging quantized weights once endpoints are known.

use arrayvec::ArrayVec;

use crate::astc::decimation::DecimationTable;
use crate::astc::quant::{QuantLevel, QuantizationTable};
use crate::astc::MAX_WEIGHTS;

/// Keeps flat texels from dropping out of the weighted average entirely
const SENSITIVITY_FLOOR: f32 = 1e-4;

/// Grid weights (0..=1) that best reproduce per texel `ideal` weights, favoring texels
/// where a weight error costs more
pub fn decimate(table: &DecimationTable, ideal: &[f32], sensitivity: &[f32]) -> ArrayVec<f32, MAX_WEIGHTS> {
    if table.is_full() {
        return ideal.iter().copied().collect();
    }
    (0..table.weight_count())
        .map(|w| {
            let (sum, total) = table
                .weight_texels(w)
                .iter()
                .map(|c| {
                    let t = c.index as usize;
                    let factor = c.factor as f32 * (sensitivity[t] + SENSITIVITY_FLOOR);
                    (factor * ideal[t], factor)
                })
                .fold((0.0, 0.0), |(s, n), (a, b)| (s + a, n + b));
            if total > 0.0 {
                (sum / total).clamp(0.0, 1.0)
            } else {
                0.0
            }
        })
        .collect()
}

/// Error of interpolating `grid` back onto the texels, before any quantization
pub fn decimation_error(table: &DecimationTable, grid: &[f32], ideal: &[f32], sensitivity: &[f32]) -> f32 {
    table
        .infill_f32(grid)
        .iter()
        .zip(ideal)
        .zip(sensitivity)
        .map(|((&got, &want), &s)| s * (got - want) * (got - want))
        .sum()
}

/// Expected error of rounding uniformly spread weights to `level`, per unit of sensitivity
pub fn quantization_error(level: QuantLevel) -> f32 {
    let step = 1.0 / (level.values() - 1) as f32;
    step * step / 12.0
}

pub fn quantize(table: &QuantizationTable, grid: &[f32]) -> ArrayVec<u8, MAX_WEIGHTS> {
    grid.iter().map(|&w| table.quantize(w)).collect()
}

pub fn unquantize(table: &QuantizationTable, symbols: &[u8]) -> ArrayVec<u8, MAX_WEIGHTS> {
    symbols.iter().map(|&s| table.unquantize(s)).collect()
}

/// Step each grid weight to a neighboring level when that lowers the error with the
/// endpoints held fixed.
///
/// `texel_error(t, w)` is the exact error of texel `t` when it decodes with interpolated
/// weight `w`. Returns the total change in error, zero or negative.
pub fn realign(
    table: &DecimationTable,
    quant: &QuantizationTable,
    symbols: &mut [u8],
    texel_error: impl Fn(usize, u8) -> f64,
) -> f64 {
    let mut values = unquantize(quant, symbols);
    let mut texel_weights = table.infill(&values);
    let mut change = 0.0;

    for w in 0..symbols.len() {
        let current = symbols[w];
        let mut best: Option<(f64, u8)> = None;

        for candidate in [quant.prev(current), quant.next(current)] {
            if candidate == current {
                continue;
            }
            let value = quant.unquantize(candidate);
            let delta: f64 = table
                .weight_texels(w)
                .iter()
                .map(|c| {
                    let t = c.index as usize;
                    let sum: u32 = table
                        .texel_weights(t)
                        .iter()
                        .map(|k| {
                            let v = if k.index as usize == w { value } else { values[k.index as usize] };
                            v as u32 * k.factor as u32
                        })
                        .sum();
                    let moved = ((sum + 8) >> 4) as u8;
                    texel_error(t, moved) - texel_error(t, texel_weights[t])
                })
                .sum();
            if delta < 0.0 && best.map_or(true, |(d, _)| delta < d) {
                best = Some((delta, candidate));
            }
        }

        if let Some((delta, candidate)) = best {
            symbols[w] = candidate;
            values[w] = quant.unquantize(candidate);
            for c in table.weight_texels(w) {
                let t = c.index as usize;
                let sum: u32 = table
                    .texel_weights(t)
                    .iter()
                    .map(|k| values[k.index as usize] as u32 * k.factor as u32)
                    .sum();
                texel_weights[t] = ((sum + 8) >> 4) as u8;
            }
            change += delta;
        }
    }
    change
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astc::Footprint;

    #[test]
    fn full_grids_keep_ideal_weights() {
        let table = DecimationTable::new(Footprint::ASTC_4X4, 4, 4);
        let ideal: Vec<f32> = (0..16).map(|i| i as f32 / 15.0).collect();
        let grid = decimate(&table, &ideal, &[1.0; 16]);
        assert_eq!(grid.as_slice(), ideal.as_slice());
        assert!(decimation_error(&table, &grid, &ideal, &[1.0; 16]) < 1e-9);
    }

    #[test]
    fn coarse_grids_follow_smooth_ramps() {
        let table = DecimationTable::new(Footprint::ASTC_8X8, 4, 4);
        let ideal: Vec<f32> = (0..64).map(|t| (t % 8) as f32 / 7.0).collect();
        let grid = decimate(&table, &ideal, &[1.0; 64]);
        assert_eq!(grid.len(), 16);
        assert!(grid[0] < grid[1] && grid[1] < grid[2] && grid[2] < grid[3]);
        assert!(decimation_error(&table, &grid, &ideal, &[1.0; 64]) < 0.1);
    }

    #[test]
    fn finer_levels_cost_less() {
        assert!(quantization_error(QuantLevel::Quant2) > quantization_error(QuantLevel::Quant32));
    }

    #[test]
    fn realign_moves_weights_toward_lower_error() {
        let table = DecimationTable::new(Footprint::ASTC_4X4, 4, 4);
        let quant = QuantizationTable::new(QuantLevel::Quant8);
        let mut symbols = [quant.quantize(0.0); 16];
        // every texel would rather decode at weight 64
        let change = realign(&table, &quant, &mut symbols, |_, w| (64 - w as i32).pow(2) as f64);
        assert!(change < 0.0);
        assert!(symbols.iter().all(|&s| quant.unquantize(s) > 0));

        let mut settled = [quant.quantize(1.0); 16];
        let change = realign(&table, &quant, &mut settled, |_, w| (64 - w as i32).pow(2) as f64);
        assert_eq!(change, 0.0);
    }
}
