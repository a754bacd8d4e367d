// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use anyhow::Result;
use rstest::rstest;

use quickastc::astc::decompress::{decode_symbolic, ERROR_COLOR};
use quickastc::astc::physical::PhysicalBlock;
use quickastc::astc::BLOCK_BYTES;
use quickastc::dimensions::{Dimensioned, Dimensions};
use quickastc::*;

/// Deterministic pseudo random bytes
fn noise(seed: u32, count: usize) -> Vec<u8> {
    let mut state = seed;
    (0..count)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 24) as u8
        })
        .collect()
}

/// A smooth image with some noise and a hard edge, so every block has something to fit
fn test_image(dimensions: Dimensions) -> Result<TextureBuffer> {
    let grain = noise(3, dimensions.texel_count());
    let mut data = Vec::with_capacity(dimensions.texel_count() * 4);
    for y in 0..dimensions.height() {
        for x in 0..dimensions.width() {
            let g = grain[(y * dimensions.width() + x) as usize] / 16;
            let edge = if x + y > dimensions.width() { 90 } else { 0 };
            data.extend([(x * 6) as u8 + g, (y * 5) as u8 + edge, 40 + g, 255 - edge]);
        }
    }
    Ok(TextureBuffer::new(BufferFormat::Rgba8, dimensions, data)?)
}

fn squared_error(a: &TextureBuffer, b: &TextureBuffer) -> f64 {
    a.data()
        .iter()
        .zip(b.data())
        .map(|(&x, &y)| (x as f64 - y as f64).powi(2))
        .sum()
}

#[test]
fn solid_quadrants_become_constant_blocks() -> Result<()> {
    let colors = [[255, 0, 0, 255], [0, 255, 0, 255], [0, 0, 255, 255], [0, 0, 0, 0]];
    let dimensions = Dimensions::new(32, 32);
    let mut texture = TextureBuffer::allocate(BufferFormat::Rgba8, dimensions);
    for y in 0..32 {
        for x in 0..32 {
            texture.set_texel(x, y, colors[(y / 16 * 2 + x / 16) as usize]);
        }
    }

    let context = Context::new(EncoderConfig::new(Footprint::ASTC_4X4));
    let compressed = context.compress(&texture)?;
    for row in 0..8 {
        for col in 0..8 {
            let block = PhysicalBlock::new(compressed.compressed_block(col, row));
            assert!(block.decode(context.descriptor()).is_constant(), "block ({col}, {row})");
        }
    }

    let decompressed = context.decompress(&compressed, BufferFormat::Rgba8)?;
    for (quadrant, color) in colors.iter().enumerate() {
        let (x, y) = (8 + 16 * (quadrant as u32 % 2), 8 + 16 * (quadrant as u32 / 2));
        assert_eq!(&decompressed.texel(x, y), color);
    }
    assert_eq!(decompressed.data(), texture.data());
    Ok(())
}

#[test]
fn gray_images_stay_gray() -> Result<()> {
    let dimensions = Dimensions::new(8, 8);
    let texture = TextureBuffer::new(BufferFormat::Rgba8, dimensions, [128u8, 128, 128, 255].repeat(64))?;
    let compressed = compress(&texture, EncoderConfig::new(Footprint::ASTC_8X8))?;
    assert_eq!(compressed.data().len(), BLOCK_BYTES);

    let decompressed = decompress(&compressed, BufferFormat::Rgba8, DecodeMode::Ldr)?;
    for (&got, &want) in decompressed.data().iter().zip(texture.data()) {
        assert!((got as i32 - want as i32).abs() <= 2);
    }
    Ok(())
}

#[test]
fn malformed_blocks_do_not_spread() -> Result<()> {
    let dimensions = Dimensions::new(12, 4);
    let context = Context::new(EncoderConfig::new(Footprint::ASTC_4X4));
    let compressed = context.compress(&test_image(dimensions)?)?;
    let clean = context.decompress(&compressed, BufferFormat::Rgba8)?;

    // block mode zero is reserved
    let mut data = compressed.data().to_vec();
    data[BLOCK_BYTES..2 * BLOCK_BYTES].fill(0);
    let damaged = TextureBuffer::new(compressed.format(), dimensions, data)?;
    let decoded = context.decompress(&damaged, BufferFormat::Rgba8)?;

    for y in 0..4 {
        for x in 0..12 {
            if (4..8).contains(&x) {
                assert_eq!(decoded.texel(x, y), ERROR_COLOR);
            } else {
                assert_eq!(decoded.texel(x, y), clean.texel(x, y));
            }
        }
    }
    Ok(())
}

#[test]
fn random_blocks_decode_without_panicking() {
    let context = Context::new(EncoderConfig::new(Footprint::ASTC_6X6));
    let bytes = noise(11, 4000 * BLOCK_BYTES);
    for chunk in bytes.chunks_exact(BLOCK_BYTES) {
        let mut raw = [0u8; BLOCK_BYTES];
        raw.copy_from_slice(chunk);
        let symbolic = PhysicalBlock::new(raw).decode(context.descriptor());
        assert!(symbolic.partition_count() <= 4);
        assert!(symbolic.block_mode() >= -2 && symbolic.block_mode() < 2048);
        for mode in [DecodeMode::Ldr, DecodeMode::LdrSrgb, DecodeMode::Hdr] {
            assert_eq!(decode_symbolic(&symbolic, context.descriptor(), mode).len(), 36);
        }
    }
}

#[test]
fn thread_count_does_not_change_output() -> Result<()> {
    let texture = test_image(Dimensions::new(37, 29))?;
    let config = EncoderConfig::new(Footprint::ASTC_5X4).with_quality(0.3);
    let single = compress(&texture, config.with_threads(1))?;
    let many = compress(&texture, config.with_threads(7))?;
    assert_eq!(single.data(), many.data());
    Ok(())
}

#[test]
fn quality_never_increases_error() -> Result<()> {
    let texture = test_image(Dimensions::new(16, 16))?;
    let mut previous = f64::INFINITY;
    for quality in [0.0, 0.25, 0.6, 1.0] {
        let config = EncoderConfig::new(Footprint::ASTC_4X4).with_quality(quality);
        let compressed = compress(&texture, config)?;
        let decoded = decompress(&compressed, BufferFormat::Rgba8, DecodeMode::Ldr)?;
        let error = squared_error(&decoded, &texture);
        assert!(error <= previous, "quality {quality}: {error} > {previous}");
        previous = error;
    }
    Ok(())
}

#[rstest]
fn output_size_matches_block_grid(
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
    #[values((1, 1), (13, 7))] size: (u32, u32),
) -> Result<()> {
    let dimensions = Dimensions::new(size.0, size.1);
    let texture = test_image(dimensions)?;
    let compressed = compress(&texture, EncoderConfig::new(footprint).with_quality(0.0))?;

    let columns = (size.0 + footprint.width() - 1) / footprint.width();
    let rows = (size.1 + footprint.height() - 1) / footprint.height();
    assert_eq!(compressed.data().len(), (columns * rows) as usize * BLOCK_BYTES);
    assert_eq!(compressed.dimensions(), dimensions);

    let decoded = decompress(&compressed, BufferFormat::Rgb8, DecodeMode::LdrSrgb)?;
    assert_eq!(decoded.data().len(), dimensions.texel_count() * 3);
    Ok(())
}

#[test]
fn compressed_files_round_trip() -> Result<()> {
    let dimensions = Dimensions::new(20, 12);
    let compressed = compress(&test_image(dimensions)?, EncoderConfig::new(Footprint::ASTC_6X6))?;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("image.astc");
    AstcHeader::write_texture(&mut std::fs::File::create(&path)?, &compressed)?;
    let read = AstcHeader::read_texture(&mut std::fs::File::open(&path)?)?;

    assert_eq!(read.format(), compressed.format());
    assert_eq!(read.data(), compressed.data());
    Ok(())
}

#[test]
fn wrong_buffer_kinds_are_rejected() -> Result<()> {
    let dimensions = Dimensions::new(8, 8);
    let compressed = TextureBuffer::allocate(BufferFormat::Astc(Footprint::ASTC_4X4), dimensions);
    let raw = TextureBuffer::allocate(BufferFormat::Bgra8, dimensions);

    assert!(matches!(
        compress(&compressed, EncoderConfig::default()),
        Err(CodecError::UnsupportedInputBuffer(_))
    ));
    assert!(matches!(
        decompress(&raw, BufferFormat::Rgba8, DecodeMode::Ldr),
        Err(CodecError::UnsupportedInputBuffer(BufferFormat::Bgra8))
    ));
    assert!(matches!(
        decompress(&compressed, BufferFormat::Astc(Footprint::ASTC_4X4), DecodeMode::Ldr),
        Err(CodecError::UnsupportedOutputBuffer(_))
    ));

    let context = Context::new(EncoderConfig::new(Footprint::ASTC_6X6));
    assert!(matches!(
        context.decompress(&compressed, BufferFormat::Rgba8),
        Err(CodecError::UnsupportedInputBuffer(_))
    ));
    Ok(())
}
