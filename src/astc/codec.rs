// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Whole-image compression and decompression.
//!
//! A [`Context`] holds the read-only tables for one footprint. Compression splits the block
//! grid into one contiguous run of blocks per worker, and each worker writes its own run of
//! the output, so output block `i` is always the encoding of input block `i`.

use log::{debug, trace};
use rayon::prelude::*;

use crate::astc::block_size::BlockSizeDescriptor;
use crate::astc::decompress::decode_symbolic;
use crate::astc::encode::{compress_block, EncodeScratch};
use crate::astc::imageblock::ImageBlock;
use crate::astc::physical::PhysicalBlock;
use crate::astc::quant::QuantTables;
use crate::astc::{DecodeMode, EncoderConfig, Footprint, Heuristics, BLOCK_BYTES};
use crate::dimensions::Dimensioned;
use crate::error::{CodecError, CodecResult};
use crate::texture::{BufferFormat, TextureBuffer};
use crate::util::div_ceil;

/// Everything the block codec needs for one configuration, built once and shared by
/// reference between workers
#[derive(Debug)]
pub struct Context {
    config: EncoderConfig,
    heuristics: Heuristics,
    descriptor: BlockSizeDescriptor,
    tables: QuantTables,
}

impl Context {
    pub fn new(config: EncoderConfig) -> Self {
        Self {
            heuristics: config.heuristics(),
            descriptor: BlockSizeDescriptor::new(config.footprint),
            tables: QuantTables::new(),
            config,
        }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn heuristics(&self) -> &Heuristics {
        &self.heuristics
    }

    pub fn footprint(&self) -> Footprint {
        self.config.footprint
    }

    pub fn descriptor(&self) -> &BlockSizeDescriptor {
        &self.descriptor
    }

    pub fn tables(&self) -> &QuantTables {
        &self.tables
    }

    /// Compress an uncompressed texture into a tightly packed ASTC texture
    pub fn compress<B: AsRef<[u8]> + Sync>(&self, texture: &TextureBuffer<B>) -> CodecResult<TextureBuffer> {
        if let BufferFormat::Astc(_) = texture.format() {
            return Err(CodecError::UnsupportedInputBuffer(texture.format()));
        }

        let footprint = self.footprint();
        let dimensions = texture.dimensions();
        let grid = dimensions.block_grid(footprint);
        let total = grid.texel_count();
        let threads = self.config.effective_threads();

        debug!(
            "Compressing {dimensions} image with {footprint} blocks: {total} blocks on {threads} threads, quality {}",
            self.config.quality
        );

        let mut output = TextureBuffer::allocate(BufferFormat::Astc(footprint), dimensions);
        if total == 0 {
            return Ok(output);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| CodecError::Internal(format!("could not start worker threads: {e}")))?;

        let chunk_blocks = div_ceil(total, threads);
        let columns = grid.width() as usize;
        pool.install(|| {
            output
                .data_mut()
                .par_chunks_mut(chunk_blocks * BLOCK_BYTES)
                .enumerate()
                .try_for_each(|(chunk, bytes)| -> CodecResult {
                    let mut scratch = EncodeScratch::default();
                    for (offset, out) in bytes.chunks_exact_mut(BLOCK_BYTES).enumerate() {
                        let index = chunk * chunk_blocks + offset;
                        let x = (index % columns) as u32 * footprint.width();
                        let y = (index / columns) as u32 * footprint.height();

                        let block = ImageBlock::load(texture, footprint, x, y);
                        let encoded = compress_block(self, &block, &mut scratch);
                        out.copy_from_slice(PhysicalBlock::encode(&encoded.symbolic)?.bytes());
                    }
                    Ok(())
                })
        })?;

        Ok(output)
    }

    /// Decompress an ASTC texture of this context's footprint into `format`
    pub fn decompress<B: AsRef<[u8]>>(&self, texture: &TextureBuffer<B>, format: BufferFormat) -> CodecResult<TextureBuffer> {
        match texture.format() {
            BufferFormat::Astc(footprint) if footprint == self.footprint() => {}
            other => return Err(CodecError::UnsupportedInputBuffer(other)),
        }
        if let BufferFormat::Astc(_) = format {
            return Err(CodecError::UnsupportedOutputBuffer(format));
        }

        let footprint = self.footprint();
        let dimensions = texture.dimensions();
        let grid = dimensions.block_grid(footprint);
        let mode = self.config.decode_mode;
        debug!(
            "Decompressing {dimensions} image with {footprint} blocks: {} blocks in {mode} mode",
            grid.texel_count()
        );

        let mut output = TextureBuffer::allocate(format, dimensions);
        for row in 0..grid.height() {
            for col in 0..grid.width() {
                let symbolic = PhysicalBlock::new(texture.compressed_block(col, row)).decode(&self.descriptor);
                if symbolic.is_error() {
                    trace!("Block ({col}, {row}) is not a valid encoding");
                }
                let texels = decode_symbolic(&symbolic, &self.descriptor, mode);
                output.write_block(
                    col * footprint.width(),
                    row * footprint.height(),
                    footprint.width(),
                    footprint.height(),
                    &texels,
                );
            }
        }
        Ok(output)
    }
}

/// Compress `texture` with a one-off [`Context`]
pub fn compress<B: AsRef<[u8]> + Sync>(texture: &TextureBuffer<B>, config: EncoderConfig) -> CodecResult<TextureBuffer> {
    Context::new(config).compress(texture)
}

/// Decompress an ASTC `texture` into `format` using `mode`
pub fn decompress<B: AsRef<[u8]>>(
    texture: &TextureBuffer<B>,
    format: BufferFormat,
    mode: DecodeMode,
) -> CodecResult<TextureBuffer> {
    let footprint = match texture.format() {
        BufferFormat::Astc(footprint) => footprint,
        other => return Err(CodecError::UnsupportedInputBuffer(other)),
    };
    Context::new(EncoderConfig::new(footprint).with_decode_mode(mode)).decompress(texture, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimensions::Dimensions;

    fn gradient(dimensions: Dimensions) -> anyhow::Result<TextureBuffer> {
        let data: Vec<u8> = (0..dimensions.height())
            .flat_map(|_| (0..dimensions.width()).flat_map(|x| [(x * 9) as u8, (200 - x * 9) as u8, (x * 4) as u8, 255]))
            .collect();
        Ok(TextureBuffer::new(BufferFormat::Rgba8, dimensions, data)?)
    }

    #[test]
    fn rejects_compressed_input() -> anyhow::Result<()> {
        let dimensions = Dimensions::new(4, 4);
        let texture = TextureBuffer::allocate(BufferFormat::Astc(Footprint::ASTC_4X4), dimensions);
        let result = compress(&texture, EncoderConfig::new(Footprint::ASTC_4X4));
        assert!(matches!(result, Err(CodecError::UnsupportedInputBuffer(_))));
        Ok(())
    }

    #[test]
    fn rejects_compressed_output() -> anyhow::Result<()> {
        let texture = TextureBuffer::allocate(BufferFormat::Astc(Footprint::ASTC_4X4), Dimensions::new(4, 4));
        let result = decompress(&texture, BufferFormat::Astc(Footprint::ASTC_4X4), DecodeMode::Ldr);
        assert!(matches!(result, Err(CodecError::UnsupportedOutputBuffer(_))));

        let raw = TextureBuffer::allocate(BufferFormat::Rgba8, Dimensions::new(4, 4));
        let result = decompress(&raw, BufferFormat::Rgba8, DecodeMode::Ldr);
        assert!(matches!(result, Err(CodecError::UnsupportedInputBuffer(BufferFormat::Rgba8))));
        Ok(())
    }

    #[test]
    fn partial_edge_blocks_are_written_clipped() -> anyhow::Result<()> {
        let dimensions = Dimensions::new(13, 7);
        let texture = gradient(dimensions)?;
        let config = EncoderConfig::new(Footprint::ASTC_6X6).with_quality(0.2).with_threads(2);
        let context = Context::new(config);

        let compressed = context.compress(&texture)?;
        assert_eq!(compressed.data().len(), 3 * 2 * BLOCK_BYTES);

        let decompressed = context.decompress(&compressed, BufferFormat::Rgb8)?;
        assert_eq!(decompressed.data().len(), 13 * 7 * 3);
        for (got, want) in decompressed.data().chunks(3).zip(texture.data().chunks(4)) {
            for c in 0..3 {
                assert!((got[c] as i32 - want[c] as i32).abs() <= 8, "{got:?} vs {want:?}");
            }
        }
        Ok(())
    }

    #[test]
    fn empty_images_compress_to_nothing() -> anyhow::Result<()> {
        let texture = TextureBuffer::new(BufferFormat::Rgba8, Dimensions::new(0, 0), Vec::new())?;
        let compressed = compress(&texture, EncoderConfig::new(Footprint::ASTC_4X4))?;
        assert!(compressed.data().is_empty());
        Ok(())
    }
}
