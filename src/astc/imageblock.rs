// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use arrayvec::ArrayVec;
use enumflags2::{bitflags, BitFlags};

use crate::astc::{Footprint, MAX_TEXELS};
use vector_victor::Vector;

use crate::color::{Color, ColorF, ColorImpl};
use crate::dimensions::Dimensioned;
use crate::texture::TextureBuffer;

#[bitflags]
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageBlockFlag {
    /// Every covered texel has R = G = B
    Grayscale = 0x1,
    /// Every covered texel has full alpha
    Opaque = 0x2,
    /// Every covered texel has the same color
    Constant = 0x4,
}

/// One block of texels in working form
#[derive(Clone, Debug)]
pub struct ImageBlock {
    footprint: Footprint,
    texels: ArrayVec<ColorF, MAX_TEXELS>,
    colors: ArrayVec<Color, MAX_TEXELS>,
    covered: ArrayVec<bool, MAX_TEXELS>,
    flags: BitFlags<ImageBlockFlag>,
}

impl ImageBlock {
    /// Build a block from its texels in row-major order. `covered` tells which texels lie
    /// inside the image.
    pub fn new(footprint: Footprint, colors: &[Color], covered: impl Fn(usize) -> bool) -> Self {
        let colors: ArrayVec<Color, MAX_TEXELS> = colors.iter().copied().collect();
        let covered: ArrayVec<bool, MAX_TEXELS> = (0..colors.len()).map(covered).collect();
        let texels = colors.iter().map(|c| c.to_float()).collect();

        let mut flags = BitFlags::from(ImageBlockFlag::Grayscale)
            | ImageBlockFlag::Opaque
            | ImageBlockFlag::Constant;
        let first = colors
            .iter()
            .zip(&covered)
            .find(|(_, covered)| **covered)
            .map(|(color, _)| *color);

        for (color, &is_covered) in colors.iter().zip(&covered) {
            if !is_covered {
                continue;
            }
            if !color.is_gray() {
                flags.remove(ImageBlockFlag::Grayscale);
            }
            if color.a() != u8::MAX {
                flags.remove(ImageBlockFlag::Opaque);
            }
            if Some(*color) != first {
                flags.remove(ImageBlockFlag::Constant);
            }
        }

        Self {
            footprint,
            texels,
            colors,
            covered,
            flags,
        }
    }

    /// Fetch the block whose top-left texel is (`x`, `y`), replicating edge texels past the
    /// image boundary
    pub fn load<B: AsRef<[u8]>>(texture: &TextureBuffer<B>, footprint: Footprint, x: u32, y: u32) -> Self {
        let (width, height) = (footprint.width(), footprint.height());
        let mut colors = [[0u8; 4]; MAX_TEXELS];
        let colors = &mut colors[..footprint.texel_count()];
        texture.read_block(x, y, width, height, colors);

        let dimensions = texture.dimensions();
        let covered = |texel: usize| {
            let (col, row) = (texel as u32 % width, texel as u32 / width);
            dimensions.contains(x + col, y + row)
        };
        Self::new(footprint, colors, covered)
    }

    pub fn footprint(&self) -> Footprint {
        self.footprint
    }

    pub fn texel_count(&self) -> usize {
        self.texels.len()
    }

    /// Texel as floats in 0..=255
    pub fn texel(&self, index: usize) -> ColorF {
        self.texels[index]
    }

    pub fn color(&self, index: usize) -> Color {
        self.colors[index]
    }

    pub fn is_covered(&self, index: usize) -> bool {
        self.covered[index]
    }

    pub fn is_grayscale(&self) -> bool {
        self.flags.contains(ImageBlockFlag::Grayscale)
    }

    pub fn is_opaque(&self) -> bool {
        self.flags.contains(ImageBlockFlag::Opaque)
    }

    /// The single color shared by every covered texel, if there is one
    pub fn constant_color(&self) -> Option<Color> {
        if !self.flags.contains(ImageBlockFlag::Constant) {
            return None;
        }
        (0..self.texel_count())
            .find(|&i| self.covered[i])
            .map(|i| self.colors[i])
            .or_else(|| self.colors.first().copied())
    }

    /// Mean color over the covered texels
    pub fn average(&self) -> ColorF {
        let (sum, count) = (0..self.texel_count())
            .filter(|&i| self.covered[i])
            .fold((ColorF::default(), 0usize), |(sum, n), i| (sum + self.texels[i], n + 1));
        match count {
            0 => ColorF::default(),
            n => sum * (1.0 / n as f32),
        }
    }
}

/// Per texel, per channel importance used by the encoder's error metric
#[derive(Clone, Debug)]
pub struct ErrorWeightBlock {
    weights: ArrayVec<ColorF, MAX_TEXELS>,
    texel_weights: ArrayVec<f32, MAX_TEXELS>,
}

impl ErrorWeightBlock {
    /// Texels outside the image get zero weight, all others `channel_weights`
    pub fn new(block: &ImageBlock, channel_weights: [f32; 4]) -> Self {
        let channel_weights = Vector::vec(channel_weights);
        let weights: ArrayVec<ColorF, MAX_TEXELS> = (0..block.texel_count())
            .map(|i| {
                if block.is_covered(i) {
                    channel_weights
                } else {
                    ColorF::default()
                }
            })
            .collect();
        let texel_weights = weights.iter().map(|w| w.elements().sum()).collect();
        Self {
            weights,
            texel_weights,
        }
    }

    pub fn weight(&self, texel: usize) -> ColorF {
        self.weights[texel]
    }

    /// Sum of a texel's channel weights
    pub fn texel_weight(&self, texel: usize) -> f32 {
        self.texel_weights[texel]
    }

    /// Whether a texel can be ignored by the search
    pub fn is_zero(&self, texel: usize) -> bool {
        self.texel_weights[texel] <= 0.0
    }
}
