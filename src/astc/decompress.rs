// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reconstruct texels from a symbolic block.

use arrayvec::ArrayVec;
use half::f16;

use crate::astc::block_size::BlockSizeDescriptor;
use crate::astc::endpoints::{self, UnpackedEndpoints};
use crate::astc::physical::PhysicalBlock;
use crate::astc::quant::{unquantize_color, unquantize_weight};
use crate::astc::symbolic::{ConstantColor, NormalBlock, SymbolicBlock};
use crate::astc::{DecodeMode, MAX_PARTITIONS, MAX_TEXELS};
use crate::color::Color;

/// What a decoder shows for a block it must reject
pub const ERROR_COLOR: Color = [128, 128, 128, 255];

/// Texels of one decoded block in row-major order
pub type DecodedBlock = ArrayVec<Color, MAX_TEXELS>;

fn error_block(texel_count: usize) -> DecodedBlock {
    std::iter::repeat(ERROR_COLOR).take(texel_count).collect()
}

/// Convert a 16 bit logarithmic HDR value to an FP16 bit pattern
pub fn lns_to_sf16(lns: u16) -> u16 {
    let mantissa = (lns & 0x7FF) as u32;
    let exponent = (lns >> 11) as u32;
    let mt = if mantissa < 512 {
        3 * mantissa
    } else if mantissa < 1536 {
        4 * mantissa - 512
    } else {
        5 * mantissa - 2048
    };
    // largest finite half, never infinity
    ((exponent << 10) | (mt >> 3)).min(0x7BFF) as u16
}

fn f16_to_unorm8(bits: u16) -> u8 {
    let value = f16::from_bits(bits).to_f32();
    if value.is_nan() {
        return 0;
    }
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Expand an 8 bit endpoint channel to the 16 bit interpolation domain
fn expand_ldr(value: i32, mode: DecodeMode) -> i32 {
    match mode {
        DecodeMode::LdrSrgb => (value << 8) | 0x80,
        DecodeMode::Ldr | DecodeMode::Hdr => value * 257,
    }
}

fn interpolate(e0: i32, e1: i32, weight: i32) -> i32 {
    (e0 * (64 - weight) + e1 * weight + 32) >> 6
}

/// One channel of one texel
pub(crate) fn decode_channel(endpoints: &UnpackedEndpoints, channel: usize, weight: i32, mode: DecodeMode) -> u8 {
    let hdr = if channel == 3 {
        endpoints.alpha_hdr
    } else {
        endpoints.rgb_hdr
    };
    let (e0, e1) = (endpoints.e0[channel], endpoints.e1[channel]);

    if hdr {
        let lns = interpolate(e0, e1, weight).clamp(0, 0xFFFF) as u16;
        f16_to_unorm8(lns_to_sf16(lns))
    } else {
        let value = interpolate(expand_ldr(e0, mode), expand_ldr(e1, mode), weight);
        (value >> 8).clamp(0, 255) as u8
    }
}

fn decode_constant(constant: &ConstantColor, texel_count: usize, mode: DecodeMode) -> DecodedBlock {
    let color: Color = match (constant.hdr, mode) {
        (true, DecodeMode::Hdr) => constant.color.map(f16_to_unorm8),
        (true, _) => return error_block(texel_count),
        (false, _) => constant.color.map(|c| (c >> 8) as u8),
    };
    std::iter::repeat(color).take(texel_count).collect()
}

fn decode_normal(block: &NormalBlock, descriptor: &BlockSizeDescriptor, mode: DecodeMode) -> DecodedBlock {
    let texel_count = descriptor.footprint().texel_count();
    let Some(entry) = descriptor.mode(block.block_mode.raw()) else {
        return error_block(texel_count);
    };

    let mut partitions: ArrayVec<UnpackedEndpoints, MAX_PARTITIONS> = ArrayVec::new();
    for (p, &format) in block.formats.iter().enumerate() {
        let ints: ArrayVec<i32, 8> = block
            .partition_colors(p)
            .iter()
            .map(|&symbol| unquantize_color(block.color_quant, symbol) as i32)
            .collect();
        let unpacked = endpoints::unpack(format, &ints);
        if unpacked.is_hdr() && mode != DecodeMode::Hdr {
            return error_block(texel_count);
        }
        partitions.push(unpacked);
    }

    let weight_quant = block.block_mode.weight_quant();
    let table = &descriptor.decimation(entry.decimation).table;
    let infill = |symbols: &[u8]| {
        let grid: ArrayVec<u8, MAX_TEXELS> = symbols
            .iter()
            .map(|&s| unquantize_weight(weight_quant, s))
            .collect();
        table.infill(&grid)
    };
    let plane1 = infill(&block.weights);
    let plane2 = block.plane2_component.map(|_| infill(&block.plane2_weights));

    let partitioning = descriptor
        .partitions()
        .get(block.partition_count(), block.partition_index);

    (0..texel_count)
        .map(|t| {
            let endpoints = &partitions[partitioning.partition_of(t)];
            let mut color = [0u8; 4];
            for (c, out) in color.iter_mut().enumerate() {
                let weight = match (&plane2, block.plane2_component) {
                    (Some(plane2), Some(component)) if component as usize == c => plane2[t],
                    _ => plane1[t],
                };
                *out = decode_channel(endpoints, c, weight as i32, mode);
            }
            color
        })
        .collect()
}

/// Texels of a symbolic block. Rejected blocks come back filled with [`ERROR_COLOR`].
pub fn decode_symbolic(block: &SymbolicBlock, descriptor: &BlockSizeDescriptor, mode: DecodeMode) -> DecodedBlock {
    let texel_count = descriptor.footprint().texel_count();
    match block {
        SymbolicBlock::Error => error_block(texel_count),
        SymbolicBlock::ConstantColor(constant) => decode_constant(constant, texel_count, mode),
        SymbolicBlock::Normal(normal) => decode_normal(normal, descriptor, mode),
    }
}

/// Texels of a physical block
pub fn decode_block(block: &PhysicalBlock, descriptor: &BlockSizeDescriptor, mode: DecodeMode) -> DecodedBlock {
    decode_symbolic(&block.decode(descriptor), descriptor, mode)
}
