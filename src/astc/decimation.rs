// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use arrayvec::ArrayVec;

use crate::astc::{Footprint, MAX_TEXELS, MAX_WEIGHTS};

/// A weight index and its bilinear contribution in sixteenths
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Contribution {
    pub index: u8,
    pub factor: u8,
}

/// Maps a reduced weight grid onto the full texel grid of a footprint.
///
/// Every texel interpolates between at most four grid weights with factors that sum to 16.
/// The reverse mapping lists the texels each weight contributes to, which the encoder uses to
/// spread ideal per-texel weights back onto the grid.
#[derive(Clone, Debug)]
pub struct DecimationTable {
    grid_width: u8,
    grid_height: u8,
    texel_weights: Vec<ArrayVec<Contribution, 4>>,
    weight_texels: Vec<Vec<Contribution>>,
}

impl DecimationTable {
    pub fn new(footprint: Footprint, grid_width: u32, grid_height: u32) -> Self {
        let (bw, bh) = (footprint.width(), footprint.height());
        let weight_count = (grid_width * grid_height) as usize;
        debug_assert!(weight_count <= MAX_WEIGHTS);

        let ds = (1024 + bw / 2) / (bw - 1);
        let dt = (1024 + bh / 2) / (bh - 1);

        let mut texel_weights = Vec::with_capacity(footprint.texel_count());
        let mut weight_texels = vec![Vec::new(); weight_count];

        for t in 0..bh {
            for s in 0..bw {
                let texel = texel_weights.len();
                let gs = (ds * s * (grid_width - 1) + 32) >> 6;
                let gt = (dt * t * (grid_height - 1) + 32) >> 6;
                let (js, fs) = (gs >> 4, gs & 0xF);
                let (jt, ft) = (gt >> 4, gt & 0xF);

                let v0 = js + jt * grid_width;
                let w11 = (fs * ft + 8) >> 4;
                let w10 = ft - w11;
                let w01 = fs - w11;
                let w00 = 16 + w11 - fs - ft;

                let mut contributions = ArrayVec::new();
                for (index, factor) in [
                    (v0, w00),
                    (v0 + 1, w01),
                    (v0 + grid_width, w10),
                    (v0 + grid_width + 1, w11),
                ] {
                    if factor == 0 {
                        continue;
                    }
                    let contribution = Contribution {
                        index: index as u8,
                        factor: factor as u8,
                    };
                    contributions.push(contribution);
                    weight_texels[index as usize].push(Contribution {
                        index: texel as u8,
                        factor: factor as u8,
                    });
                }
                texel_weights.push(contributions);
            }
        }

        Self {
            grid_width: grid_width as u8,
            grid_height: grid_height as u8,
            texel_weights,
            weight_texels,
        }
    }

    pub fn grid_width(&self) -> u32 {
        self.grid_width as u32
    }

    pub fn grid_height(&self) -> u32 {
        self.grid_height as u32
    }

    pub fn weight_count(&self) -> usize {
        self.grid_width as usize * self.grid_height as usize
    }

    pub fn texel_count(&self) -> usize {
        self.texel_weights.len()
    }

    /// Whether every texel has its own weight
    pub fn is_full(&self) -> bool {
        self.weight_count() == self.texel_count()
    }

    /// Grid weights feeding `texel`
    pub fn texel_weights(&self, texel: usize) -> &[Contribution] {
        &self.texel_weights[texel]
    }

    /// Texels fed by grid weight `weight`, with the factor they receive
    pub fn weight_texels(&self, weight: usize) -> &[Contribution] {
        &self.weight_texels[weight]
    }

    /// Interpolate unquantized grid weights (0..=64) to one weight per texel
    pub fn infill(&self, weights: &[u8]) -> ArrayVec<u8, MAX_TEXELS> {
        self.texel_weights
            .iter()
            .map(|contributions| {
                let sum: u32 = contributions
                    .iter()
                    .map(|c| weights[c.index as usize] as u32 * c.factor as u32)
                    .sum();
                ((sum + 8) >> 4) as u8
            })
            .collect()
    }

    /// Interpolate fractional grid weights without rounding
    pub fn infill_f32(&self, weights: &[f32]) -> ArrayVec<f32, MAX_TEXELS> {
        self.texel_weights
            .iter()
            .map(|contributions| {
                contributions
                    .iter()
                    .map(|c| weights[c.index as usize] * c.factor as f32)
                    .sum::<f32>()
                    / 16.0
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Footprint::ASTC_4X4, 4, 4)]
    #[case(Footprint::ASTC_4X4, 2, 3)]
    #[case(Footprint::ASTC_8X8, 5, 4)]
    #[case(Footprint::ASTC_12X12, 8, 8)]
    #[case(Footprint::ASTC_10X5, 10, 2)]
    fn contributions_sum_to_sixteen(
        #[case] footprint: Footprint,
        #[case] grid_width: u32,
        #[case] grid_height: u32,
    ) {
        let table = DecimationTable::new(footprint, grid_width, grid_height);
        assert_eq!(table.texel_count(), footprint.texel_count());
        for texel in 0..table.texel_count() {
            let contributions = table.texel_weights(texel);
            assert!(contributions.len() <= 4);
            let sum: u32 = contributions.iter().map(|c| c.factor as u32).sum();
            assert_eq!(sum, 16, "texel {texel}");
            assert!(contributions
                .iter()
                .all(|c| (c.index as usize) < table.weight_count()));
        }
    }

    #[test]
    fn full_grid_maps_one_to_one() {
        let table = DecimationTable::new(Footprint::ASTC_6X5, 6, 5);
        assert!(table.is_full());
        for texel in 0..30 {
            assert_eq!(
                table.texel_weights(texel),
                &[Contribution {
                    index: texel as u8,
                    factor: 16
                }]
            );
        }
    }

    #[test]
    fn infill_preserves_flat_weights() {
        let table = DecimationTable::new(Footprint::ASTC_8X8, 3, 5);
        let texels = table.infill(&[40u8; 15]);
        assert!(texels.iter().all(|&w| w == 40));

        let ramp = table.infill_f32(&[0.0, 0.5, 1.0].repeat(5));
        assert_eq!(ramp[0], 0.0);
        assert_eq!(ramp[7], 1.0);
        assert!(ramp[1] > 0.0 && ramp[1] < 0.5);
    }
}
