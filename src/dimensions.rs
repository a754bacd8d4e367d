// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fmt::{Display, Formatter};

use crate::astc::Footprint;
use crate::util::div_ceil;

/// Width and height of a 2D image, in texels
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn width(self) -> u32 {
        self.width
    }

    pub fn height(self) -> u32 {
        self.height
    }

    pub fn texel_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn contains(self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height
    }

    /// The grid of blocks covering these dimensions, as columns by rows.
    /// Partial blocks at the right and bottom edges count as whole blocks.
    pub fn block_grid(self, footprint: Footprint) -> Dimensions {
        Dimensions {
            width: div_ceil(self.width, footprint.width()),
            height: div_ceil(self.height, footprint.height()),
        }
    }

    /// Size in bytes of the ASTC stream for an image of these dimensions
    pub fn compressed_size(self, footprint: Footprint) -> usize {
        self.block_grid(footprint).texel_count() * crate::astc::BLOCK_BYTES
    }
}

impl From<[u32; 2]> for Dimensions {
    fn from(value: [u32; 2]) -> Self {
        Dimensions::new(value[0], value[1])
    }
}

impl From<Dimensions> for [u32; 2] {
    fn from(value: Dimensions) -> Self {
        [value.width, value.height]
    }
}

impl Display for Dimensions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

pub trait Dimensioned {
    fn dimensions(&self) -> Dimensions;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_grid_rounds_partial_blocks_up() {
        let dims = Dimensions::new(33, 17);
        assert_eq!(dims.block_grid(Footprint::ASTC_4X4), Dimensions::new(9, 5));
        assert_eq!(dims.block_grid(Footprint::ASTC_12X10), Dimensions::new(3, 2));
        assert_eq!(dims.compressed_size(Footprint::ASTC_4X4), 9 * 5 * 16);
    }

    #[test]
    fn displays_as_width_by_height() {
        assert_eq!(Dimensions::from([640, 480]).to_string(), "640x480");
    }
}
