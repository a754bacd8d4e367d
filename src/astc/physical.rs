// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The 128 bit block layout.
//!
//! ```text
//! bits 0..11    block mode
//! bits 11..13   partition count - 1
//! 1 partition:  bits 13..17 endpoint format, colors from bit 17
//! 2+ partitions: bits 13..23 partition seed, 23..29 format selector, colors from bit 29
//! ...           (extra format bits) (plane 2 channel) weights, bit reversed from bit 127
//! ```

use arrayvec::ArrayVec;
use bitvec::prelude::*;

use crate::astc::block_size::{BlockMode, BlockModeKind, BlockSizeDescriptor};
use crate::astc::quant::{color_quant_for, QuantLevel};
use crate::astc::symbolic::{
    ConstantColor, EndpointFormat, NormalBlock, SymbolicBlock, MAX_COLOR_INTS,
};
use crate::astc::{ise, BLOCK_BYTES, MAX_PARTITIONS, MAX_WEIGHTS};
use crate::error::{CodecError, CodecResult};
use crate::pack::{reverse_bits, BitReader, BitWriter, Pack, Unpack};

/// Block mode, partition count and reserved bits of a void extent block
const VOID_EXTENT_LDR: u16 = 0xDFC;
const VOID_EXTENT_HDR: u16 = 0xFFC;
/// Extent coordinate meaning "no extent"
const NO_EXTENT: u16 = 0x1FFF;

/// One encoded block as stored in a texture
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PhysicalBlock([u8; BLOCK_BYTES]);

/// Bits taken by the extra format selector of a mixed format block
fn extra_format_bits(partitions: usize, mixed: bool) -> usize {
    if mixed {
        3 * partitions - 4
    } else {
        0
    }
}

/// Base class of a mixed format selector; the selector can only name classes 0..=2 as base
fn base_class(formats: &[EndpointFormat]) -> usize {
    formats.iter().map(|f| f.class()).min().unwrap_or(0).min(2)
}

/// Whether one format code covers every partition
fn uniform_formats(formats: &[EndpointFormat]) -> bool {
    formats.iter().all(|&f| f == formats[0])
}

/// First bit of the color data for a partition count
pub fn color_start(partition_count: usize) -> usize {
    if partition_count > 1 {
        29
    } else {
        17
    }
}

/// Whether formats need the mixed selector, which costs extra bits below the weights
pub fn needs_mixed_selector(formats: &[EndpointFormat]) -> bool {
    formats.len() > 1 && !uniform_formats(formats)
}

/// Whether a selector of the given style can name these formats
fn selector_fits(formats: &[EndpointFormat], mixed: bool) -> bool {
    if !mixed {
        return uniform_formats(formats);
    }
    let base = base_class(formats);
    formats.len() > 1 && formats.iter().all(|f| (base..=base + 1).contains(&f.class()))
}

/// Color bits left over once the fixed fields and weights of a block are placed
fn color_bits_available(mode: &BlockMode, partitions: usize, mixed: bool) -> usize {
    let below_weights = 128 - mode.weight_bits() - extra_format_bits(partitions, mixed);
    let ccs = if mode.is_dual_plane() { 2 } else { 0 };
    (below_weights - ccs).saturating_sub(color_start(partitions))
}

/// The color quantization a decoder derives for these formats under one selector style
fn selector_color_quant(mode: &BlockMode, formats: &[EndpointFormat], mixed: bool) -> Option<QuantLevel> {
    let ints: usize = formats.iter().map(|f| f.int_count()).sum();
    if ints > MAX_COLOR_INTS || !selector_fits(formats, mixed) {
        return None;
    }
    color_quant_for(ints, color_bits_available(mode, formats.len(), mixed)).filter(|&q| q >= QuantLevel::MIN_COLOR)
}

/// The color quantization a decoder derives for these formats, if it can hold them at all
pub fn color_quant_for_block(mode: &BlockMode, formats: &[EndpointFormat]) -> Option<QuantLevel> {
    selector_color_quant(mode, formats, needs_mixed_selector(formats))
}

impl PhysicalBlock {
    pub fn new(bytes: [u8; BLOCK_BYTES]) -> Self {
        PhysicalBlock(bytes)
    }

    pub fn bytes(&self) -> &[u8; BLOCK_BYTES] {
        &self.0
    }

    /// Pack a symbolic block.
    ///
    /// Error blocks pack to all zeroes, which every decoder rejects as a reserved mode. A normal
    /// block whose fields disagree with what a decoder would derive from them is refused.
    pub fn encode(symbolic: &SymbolicBlock) -> CodecResult<Self> {
        match symbolic {
            SymbolicBlock::Error => Ok(PhysicalBlock::default()),
            SymbolicBlock::ConstantColor(constant) => Ok(Self::encode_constant(constant)),
            SymbolicBlock::Normal(block) => Self::encode_normal(block),
        }
    }

    fn encode_constant(constant: &ConstantColor) -> Self {
        let mut bytes = [0u8; BLOCK_BYTES];
        let bits = bytes.view_bits_mut::<Lsb0>();
        bits[0..12].store_le(if constant.hdr {
            VOID_EXTENT_HDR
        } else {
            VOID_EXTENT_LDR
        });
        bits[12..64].chunks_mut(13).pack_le([NO_EXTENT; 4]);
        bits[64..128].chunks_mut(16).pack_le(constant.color);
        PhysicalBlock(bytes)
    }

    fn encode_normal(block: &NormalBlock) -> CodecResult<Self> {
        let mode = &block.block_mode;
        let partitions = block.partition_count();
        let formats = &block.formats;
        let mixed = block.mixed_selector;

        if selector_color_quant(mode, formats, mixed) != Some(block.color_quant) {
            return Err(CodecError::InvalidBlock("color quantization does not match the formats"));
        }
        let ints: usize = formats.iter().map(|f| f.int_count()).sum();
        if block.colors.len() != ints {
            return Err(CodecError::InvalidBlock("wrong number of color integers"));
        }
        let plane2_len = if mode.is_dual_plane() { mode.grid_size() } else { 0 };
        if block.weights.len() != mode.grid_size()
            || block.plane2_weights.len() != plane2_len
            || block.is_dual_plane() != mode.is_dual_plane()
        {
            return Err(CodecError::InvalidBlock("weights do not match the block mode"));
        }

        // weights go in a scratch block first, then get flipped to grow down from bit 127
        let mut weight_bytes = [0u8; BLOCK_BYTES];
        {
            let mut writer = BitWriter::new(&mut weight_bytes);
            if block.is_dual_plane() {
                let interleaved: ArrayVec<u8, MAX_WEIGHTS> = block
                    .weights
                    .iter()
                    .zip(&block.plane2_weights)
                    .flat_map(|(&a, &b)| [a, b])
                    .collect();
                ise::encode(&mut writer, mode.weight_quant(), &interleaved);
            } else {
                ise::encode(&mut writer, mode.weight_quant(), &block.weights);
            }
        }
        let mut bytes = reverse_bits(&weight_bytes);

        let extra = extra_format_bits(partitions, mixed);
        let mut below_weights = 128 - mode.weight_bits();
        {
            let bits = bytes.view_bits_mut::<Lsb0>();
            bits[0..11].store_le(mode.raw());
            bits[11..13].store_le((partitions - 1) as u8);

            if partitions == 1 {
                bits[13..17].store_le(formats[0] as u8);
            } else {
                bits[13..23].store_le(block.partition_index);
                if extra == 0 {
                    bits[23..29].store_le((formats[0] as u8) << 2);
                } else {
                    let base = base_class(formats);
                    let mut selector = (base + 1) as u32;
                    for (i, format) in formats.iter().enumerate() {
                        selector |= ((format.class() - base) as u32) << (2 + i);
                        selector |= (*format as u32 & 3) << (2 + partitions + 2 * i);
                    }
                    bits[23..29].store_le(selector & 0x3F);
                    bits[below_weights - extra..below_weights].store_le(selector >> 6);
                    below_weights -= extra;
                }
            }

            if let Some(component) = block.plane2_component {
                bits[below_weights - 2..below_weights].store_le(component & 3);
                below_weights -= 2;
            }
        }

        let mut writer = BitWriter::window(&mut bytes, color_start(partitions), below_weights);
        ise::encode(&mut writer, block.color_quant, &block.colors);

        Ok(PhysicalBlock(bytes))
    }

    /// Unpack into a symbolic block. Anything a decoder must reject becomes
    /// [`SymbolicBlock::Error`].
    pub fn decode(&self, descriptor: &BlockSizeDescriptor) -> SymbolicBlock {
        let bits = self.0.view_bits::<Lsb0>();
        let raw: u16 = bits[0..11].load_le();

        let mode = match BlockMode::decode(raw) {
            BlockModeKind::Reserved => return SymbolicBlock::Error,
            BlockModeKind::VoidExtent { hdr } => return self.decode_constant(hdr),
            BlockModeKind::Normal(mode) => mode,
        };
        if descriptor.mode(raw).is_none() {
            return SymbolicBlock::Error;
        }

        let partitions = bits[11..13].load_le::<usize>() + 1;
        if mode.is_dual_plane() && partitions == MAX_PARTITIONS {
            return SymbolicBlock::Error;
        }

        let mut below_weights = 128 - mode.weight_bits();
        let mut formats: ArrayVec<EndpointFormat, MAX_PARTITIONS> = ArrayVec::new();
        let mut partition_index = 0u16;
        let mut mixed_selector = false;
        if partitions == 1 {
            formats.push(EndpointFormat::from_bits(bits[13..17].load_le()));
        } else {
            partition_index = bits[13..23].load_le();
            let low: u32 = bits[23..29].load_le();
            if low & 3 == 0 {
                let format = EndpointFormat::from_bits(low >> 2);
                formats.extend(std::iter::repeat(format).take(partitions));
            } else {
                mixed_selector = true;
                let extra = extra_format_bits(partitions, true);
                let high: u32 = bits[below_weights - extra..below_weights].load_le();
                below_weights -= extra;
                let selector = low | (high << 6);
                let base = (selector & 3) - 1;
                for i in 0..partitions {
                    let class = base + ((selector >> (2 + i)) & 1);
                    let low_bits = (selector >> (2 + partitions + 2 * i)) & 3;
                    formats.push(EndpointFormat::from_bits((class << 2) | low_bits));
                }
            }
        }

        let ints: usize = formats.iter().map(|f| f.int_count()).sum();
        if ints > MAX_COLOR_INTS {
            return SymbolicBlock::Error;
        }

        let plane2_component = if mode.is_dual_plane() {
            below_weights -= 2;
            Some(bits[below_weights..below_weights + 2].load_le::<u8>())
        } else {
            None
        };

        let start = color_start(partitions);
        let Some(color_quant) = below_weights
            .checked_sub(start)
            .and_then(|available| color_quant_for(ints, available))
            .filter(|&q| q >= QuantLevel::MIN_COLOR)
        else {
            return SymbolicBlock::Error;
        };

        let mut colors: ArrayVec<u8, MAX_COLOR_INTS> = ArrayVec::new();
        colors.extend(std::iter::repeat(0).take(ints));
        let mut reader = BitReader::window(&self.0, start, below_weights);
        ise::decode(&mut reader, color_quant, &mut colors);

        let reversed = reverse_bits(&self.0);
        let mut stored: ArrayVec<u8, MAX_WEIGHTS> = ArrayVec::new();
        stored.extend(std::iter::repeat(0).take(mode.weight_count()));
        let mut reader = BitReader::window(&reversed, 0, mode.weight_bits());
        ise::decode(&mut reader, mode.weight_quant(), &mut stored);

        let (weights, plane2_weights) = if mode.is_dual_plane() {
            (
                stored.iter().step_by(2).copied().collect(),
                stored.iter().skip(1).step_by(2).copied().collect(),
            )
        } else {
            (stored, ArrayVec::new())
        };

        SymbolicBlock::Normal(NormalBlock {
            block_mode: mode,
            partition_index,
            formats,
            color_quant,
            colors,
            weights,
            plane2_weights,
            plane2_component,
            mixed_selector,
        })
    }

    fn decode_constant(&self, hdr: bool) -> SymbolicBlock {
        let bits = self.0.view_bits::<Lsb0>();
        // both bits above the mode field are reserved and must be set
        if !bits[10] || !bits[11] {
            return SymbolicBlock::Error;
        }

        let mut extent = [0u16; 4];
        for (dst, src) in extent.iter_mut().zip(bits[12..64].chunks(13).unpack_le::<u16>()) {
            *dst = src;
        }
        let no_extent = extent.iter().all(|&c| c == NO_EXTENT);
        if !no_extent && (extent[0] >= extent[1] || extent[2] >= extent[3]) {
            return SymbolicBlock::Error;
        }

        let mut color = [0u16; 4];
        for (dst, src) in color.iter_mut().zip(bits[64..128].chunks(16).unpack_le::<u16>()) {
            *dst = src;
        }

        SymbolicBlock::ConstantColor(ConstantColor { hdr, color })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::astc::Footprint;

    fn first_mode(descriptor: &BlockSizeDescriptor, dual: bool, quant: QuantLevel) -> BlockMode {
        descriptor
            .modes()
            .iter()
            .map(|e| e.mode)
            .find(|m| m.is_dual_plane() == dual && m.weight_quant() == quant && m.grid_size() >= 4)
            .expect("mode exists")
    }

    fn normal_block(
        descriptor: &BlockSizeDescriptor,
        formats: &[EndpointFormat],
        dual: bool,
        partition_index: u16,
    ) -> NormalBlock {
        let mode = first_mode(descriptor, dual, QuantLevel::Quant4);
        let mixed_selector = needs_mixed_selector(formats);
        let color_quant = selector_color_quant(&mode, formats, mixed_selector).expect("colors fit");
        let ints: usize = formats.iter().map(|f| f.int_count()).sum();
        let max = color_quant.values() as usize;
        NormalBlock {
            block_mode: mode,
            partition_index,
            formats: formats.iter().copied().collect(),
            color_quant,
            colors: (0..ints).map(|i| ((i * 7 + 3) % max) as u8).collect(),
            weights: (0..mode.grid_size()).map(|i| (i % 4) as u8).collect(),
            plane2_weights: if dual {
                (0..mode.grid_size()).map(|i| (3 - i % 4) as u8).collect()
            } else {
                ArrayVec::new()
            },
            plane2_component: dual.then_some(2),
            mixed_selector,
        }
    }

    /// Small deterministic generator so tests do not depend on a random crate
    fn random_blocks(seed: u32, count: usize) -> impl Iterator<Item = PhysicalBlock> {
        let mut state = seed;
        (0..count).map(move |_| {
            let mut bytes = [0u8; BLOCK_BYTES];
            for chunk in bytes.chunks_mut(4) {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                chunk.copy_from_slice(&state.to_le_bytes());
            }
            PhysicalBlock::new(bytes)
        })
    }

    #[rstest]
    #[case(&[EndpointFormat::Rgba], false)]
    #[case(&[EndpointFormat::Rgb], true)]
    #[case(&[EndpointFormat::Luminance, EndpointFormat::Luminance], false)]
    #[case(&[EndpointFormat::Rgb, EndpointFormat::RgbScale, EndpointFormat::Rgb], false)]
    #[case(&[EndpointFormat::LuminanceAlpha, EndpointFormat::Luminance], true)]
    #[case(&[EndpointFormat::Rgba, EndpointFormat::RgbaDelta], false)]
    #[case(
        &[EndpointFormat::Luminance, EndpointFormat::LuminanceAlpha, EndpointFormat::Luminance, EndpointFormat::Luminance],
        false
    )]
    fn normal_blocks_survive_packing(#[case] formats: &[EndpointFormat], #[case] dual: bool) -> anyhow::Result<()> {
        let descriptor = BlockSizeDescriptor::new(Footprint::ASTC_8X8);
        let seed = if formats.len() > 1 { 321 } else { 0 };
        let block = normal_block(&descriptor, formats, dual, seed);
        let symbolic = SymbolicBlock::Normal(block);
        let physical = PhysicalBlock::encode(&symbolic)?;
        assert_eq!(physical.decode(&descriptor), symbolic);
        Ok(())
    }

    #[test]
    fn mixed_selector_with_equal_formats_survives_packing() -> anyhow::Result<()> {
        let descriptor = BlockSizeDescriptor::new(Footprint::ASTC_8X8);
        let formats = [EndpointFormat::Rgb, EndpointFormat::Rgb];
        let uniform = normal_block(&descriptor, &formats, false, 77);

        let mode = uniform.block_mode;
        // the extra selector bits come out of the color budget
        let color_quant = selector_color_quant(&mode, &formats, true).expect("colors fit");
        assert!(color_quant <= uniform.color_quant);
        let max = color_quant.values() as usize;
        let mixed = NormalBlock {
            color_quant,
            colors: uniform.colors.iter().map(|&c| (c as usize % max) as u8).collect(),
            mixed_selector: true,
            ..uniform.clone()
        };

        for block in [uniform, mixed] {
            let symbolic = SymbolicBlock::Normal(block);
            let physical = PhysicalBlock::encode(&symbolic)?;
            assert_eq!(physical.decode(&descriptor), symbolic);
        }
        Ok(())
    }

    #[test]
    fn refuses_inconsistent_blocks() {
        let descriptor = BlockSizeDescriptor::new(Footprint::ASTC_8X8);
        let block = normal_block(&descriptor, &[EndpointFormat::Rgb, EndpointFormat::Rgb], false, 5);

        // differing formats need the mixed selector
        let mut wrong_selector = block.clone();
        wrong_selector.formats[1] = EndpointFormat::RgbScale;
        assert!(matches!(
            PhysicalBlock::encode(&SymbolicBlock::Normal(wrong_selector)),
            Err(CodecError::InvalidBlock(_))
        ));

        // the mixed selector spans two neighbouring classes at most
        let mut wide_classes = block.clone();
        wide_classes.formats[1] = EndpointFormat::Luminance;
        wide_classes.mixed_selector = true;
        assert!(PhysicalBlock::encode(&SymbolicBlock::Normal(wide_classes)).is_err());

        let mut short = block;
        short.colors.pop();
        assert!(PhysicalBlock::encode(&SymbolicBlock::Normal(short)).is_err());
    }

    #[rstest]
    fn decoded_blocks_pack_back_unchanged(
        #[values(
            Footprint::ASTC_4X4,
            Footprint::ASTC_5X4,
            Footprint::ASTC_5X5,
            Footprint::ASTC_6X5,
            Footprint::ASTC_6X6,
            Footprint::ASTC_8X5,
            Footprint::ASTC_8X6,
            Footprint::ASTC_8X8,
            Footprint::ASTC_10X5,
            Footprint::ASTC_10X6,
            Footprint::ASTC_10X8,
            Footprint::ASTC_10X10,
            Footprint::ASTC_12X10,
            Footprint::ASTC_12X12
        )]
        footprint: Footprint,
    ) -> anyhow::Result<()> {
        let descriptor = BlockSizeDescriptor::new(footprint);
        let mut normal = 0;
        for physical in random_blocks(footprint.texel_count() as u32, 4000) {
            let symbolic = physical.decode(&descriptor);
            if let SymbolicBlock::Normal(_) = symbolic {
                normal += 1;
                let packed = PhysicalBlock::encode(&symbolic)?;
                assert_eq!(packed.decode(&descriptor), symbolic, "{physical:?}");
            }
        }
        assert!(normal > 0);
        Ok(())
    }

    #[test]
    fn constant_blocks_survive_packing() -> anyhow::Result<()> {
        let descriptor = BlockSizeDescriptor::new(Footprint::ASTC_4X4);
        let symbolic = SymbolicBlock::ConstantColor(ConstantColor::from_ldr([255, 0, 128, 7]));
        let physical = PhysicalBlock::encode(&symbolic)?;
        assert_eq!(physical.bytes()[0], 0xFC);
        assert_eq!(physical.decode(&descriptor), symbolic);
        Ok(())
    }

    #[test]
    fn rejects_malformed_blocks() -> anyhow::Result<()> {
        let descriptor = BlockSizeDescriptor::new(Footprint::ASTC_4X4);
        assert!(PhysicalBlock::default().decode(&descriptor).is_error());

        // void extent with a reserved bit cleared
        let constant = SymbolicBlock::ConstantColor(ConstantColor::from_ldr([1; 4]));
        let mut bytes = *PhysicalBlock::encode(&constant)?.bytes();
        bytes[1] &= !0x08;
        assert!(PhysicalBlock::new(bytes).decode(&descriptor).is_error());

        // void extent whose extent is inverted
        let mut bytes = *PhysicalBlock::encode(&constant)?.bytes();
        bytes[1] &= 0x0F;
        bytes[2] = 0;
        bytes[3] = 0;
        assert!(PhysicalBlock::new(bytes).decode(&descriptor).is_error());
        Ok(())
    }

    #[test]
    fn error_block_packs_to_reserved_mode() -> anyhow::Result<()> {
        let descriptor = BlockSizeDescriptor::new(Footprint::ASTC_6X6);
        let physical = PhysicalBlock::encode(&SymbolicBlock::Error)?;
        assert_eq!(physical.decode(&descriptor), SymbolicBlock::Error);
        Ok(())
    }
}
