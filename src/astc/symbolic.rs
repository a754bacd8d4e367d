// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use arrayvec::ArrayVec;

use crate::astc::block_size::BlockMode;
use crate::astc::quant::QuantLevel;
use crate::astc::{MAX_PARTITIONS, MAX_WEIGHTS};

/// Most color integers a block may carry
pub const MAX_COLOR_INTS: usize = 18;

/// [`SymbolicBlock::block_mode`] of an error block
pub const ERROR_BLOCK_MODE: i32 = -1;
/// [`SymbolicBlock::block_mode`] of a constant color block
pub const CONSTANT_BLOCK_MODE: i32 = -2;

/// The 16 color endpoint formats, numbered as in the bitstream
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, strum::FromRepr, strum::VariantArray)]
#[repr(u8)]
pub enum EndpointFormat {
    Luminance = 0,
    LuminanceDelta = 1,
    HdrLuminanceLargeRange = 2,
    HdrLuminanceSmallRange = 3,
    LuminanceAlpha = 4,
    LuminanceAlphaDelta = 5,
    RgbScale = 6,
    HdrRgbScale = 7,
    Rgb = 8,
    RgbDelta = 9,
    RgbScaleAlpha = 10,
    HdrRgb = 11,
    Rgba = 12,
    RgbaDelta = 13,
    HdrRgbLdrAlpha = 14,
    HdrRgba = 15,
}

impl EndpointFormat {
    pub fn from_bits(bits: u32) -> Self {
        // every 4 bit value names a format
        Self::from_repr((bits & 0xF) as u8).unwrap_or(EndpointFormat::Luminance)
    }

    /// Size class 0..=3; a format of class `c` takes `2 (c + 1)` integers
    pub fn class(self) -> usize {
        self as usize >> 2
    }

    pub fn int_count(self) -> usize {
        2 * (self.class() + 1)
    }

    pub fn is_hdr(self) -> bool {
        use EndpointFormat::*;
        matches!(
            self,
            HdrLuminanceLargeRange
                | HdrLuminanceSmallRange
                | HdrRgbScale
                | HdrRgb
                | HdrRgbLdrAlpha
                | HdrRgba
        )
    }
}

/// A void extent block's color
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ConstantColor {
    /// Channels are FP16 bit patterns rather than UNORM16
    pub hdr: bool,
    pub color: [u16; 4],
}

impl ConstantColor {
    /// The UNORM16 constant that decodes back to exactly `color` in LDR modes
    pub fn from_ldr(color: [u8; 4]) -> Self {
        Self {
            hdr: false,
            color: color.map(|c| c as u16 * 257),
        }
    }
}

/// A block with endpoints and weights, not yet packed into bits.
///
/// Colors and weights hold ISE symbols of their quantization levels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalBlock {
    pub block_mode: BlockMode,
    pub partition_index: u16,
    pub formats: ArrayVec<EndpointFormat, MAX_PARTITIONS>,
    pub color_quant: QuantLevel,
    /// Color integers of every partition in order
    pub colors: ArrayVec<u8, MAX_COLOR_INTS>,
    pub weights: ArrayVec<u8, MAX_WEIGHTS>,
    /// Second weight plane, present only for dual plane modes
    pub plane2_weights: ArrayVec<u8, MAX_WEIGHTS>,
    /// Channel driven by the second plane
    pub plane2_component: Option<u8>,
    /// Formats are named by the mixed selector, even when they all agree
    pub mixed_selector: bool,
}

impl NormalBlock {
    pub fn partition_count(&self) -> usize {
        self.formats.len()
    }

    /// Color integers belonging to `partition`
    pub fn partition_colors(&self, partition: usize) -> &[u8] {
        let start: usize = self.formats[..partition].iter().map(|f| f.int_count()).sum();
        &self.colors[start..start + self.formats[partition].int_count()]
    }

    pub fn is_dual_plane(&self) -> bool {
        self.plane2_component.is_some()
    }
}

/// Intermediate form of one block between the encoder search and the bitstream
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SymbolicBlock {
    /// A block a decoder must reject; it decodes to the error color
    Error,
    ConstantColor(ConstantColor),
    Normal(NormalBlock),
}

impl SymbolicBlock {
    /// Partition count, 0 for error and constant blocks
    pub fn partition_count(&self) -> usize {
        match self {
            SymbolicBlock::Normal(block) => block.partition_count(),
            _ => 0,
        }
    }

    /// The raw block mode of a normal block, or a negative sentinel
    pub fn block_mode(&self) -> i32 {
        match self {
            SymbolicBlock::Error => ERROR_BLOCK_MODE,
            SymbolicBlock::ConstantColor(_) => CONSTANT_BLOCK_MODE,
            SymbolicBlock::Normal(block) => block.block_mode.raw() as i32,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SymbolicBlock::Error)
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, SymbolicBlock::ConstantColor(_))
    }
}
