// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fmt::{Display, Formatter};

use crate::astc::{Footprint, BLOCK_BYTES};
use crate::color::Color;
use crate::dimensions::{Dimensioned, Dimensions};
use crate::error::{CodecError, CodecResult};

/// Layout of the bytes held by a [`TextureBuffer`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BufferFormat {
    Rgba8,
    Bgra8,
    Rgb8,
    Astc(Footprint),
}

impl BufferFormat {
    /// Bytes per texel for uncompressed formats
    pub fn texel_size(self) -> Option<usize> {
        match self {
            BufferFormat::Rgba8 | BufferFormat::Bgra8 => Some(4),
            BufferFormat::Rgb8 => Some(3),
            BufferFormat::Astc(_) => None,
        }
    }

    /// Bytes in one row of texels, or one row of blocks for compressed formats
    pub fn min_pitch(self, dimensions: Dimensions) -> usize {
        match self {
            BufferFormat::Astc(footprint) => {
                dimensions.block_grid(footprint).width() as usize * BLOCK_BYTES
            }
            _ => dimensions.width() as usize * self.texel_size().unwrap_or(4),
        }
    }

    /// Number of rows stored, counting block rows for compressed formats
    pub fn rows(self, dimensions: Dimensions) -> usize {
        match self {
            BufferFormat::Astc(footprint) => dimensions.block_grid(footprint).height() as usize,
            _ => dimensions.height() as usize,
        }
    }
}

impl Display for BufferFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferFormat::Rgba8 => write!(f, "RGBA8888"),
            BufferFormat::Bgra8 => write!(f, "BGRA8888"),
            BufferFormat::Rgb8 => write!(f, "RGB888"),
            BufferFormat::Astc(footprint) => write!(f, "ASTC {footprint}"),
        }
    }
}

/// A flat image buffer with explicit pitch. The codec reads and writes through it but
/// never owns the caller's memory: `B` may be a borrowed slice or an owned `Vec`.
#[derive(Clone, Debug)]
pub struct TextureBuffer<B = Vec<u8>> {
    format: BufferFormat,
    dimensions: Dimensions,
    pitch: usize,
    data: B,
}

impl<B: AsRef<[u8]>> TextureBuffer<B> {
    /// Wrap `data` with the tightest pitch for `format`
    pub fn new(format: BufferFormat, dimensions: Dimensions, data: B) -> CodecResult<Self> {
        let pitch = format.min_pitch(dimensions);
        Self::with_pitch(format, dimensions, pitch, data)
    }

    pub fn with_pitch(
        format: BufferFormat,
        dimensions: Dimensions,
        pitch: usize,
        data: B,
    ) -> CodecResult<Self> {
        let min_pitch = format.min_pitch(dimensions);
        if pitch < min_pitch {
            return Err(CodecError::BufferSize {
                expected: min_pitch,
                actual: pitch,
            });
        }

        let rows = format.rows(dimensions);
        let expected = match rows {
            0 => 0,
            rows => pitch * (rows - 1) + min_pitch,
        };
        let actual = data.as_ref().len();
        if actual < expected {
            return Err(CodecError::BufferSize { expected, actual });
        }

        Ok(Self {
            format,
            dimensions,
            pitch,
            data,
        })
    }

    pub fn format(&self) -> BufferFormat {
        self.format
    }

    pub fn pitch(&self) -> usize {
        self.pitch
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// Bytes covered by the image contents
    pub fn data_size(&self) -> usize {
        match self.format.rows(self.dimensions) {
            0 => 0,
            rows => self.pitch * (rows - 1) + self.format.min_pitch(self.dimensions),
        }
    }

    /// Fetch one RGBA texel. Coordinates outside the image are clamped to the nearest edge.
    pub fn texel(&self, x: u32, y: u32) -> Color {
        let x = x.min(self.dimensions.width.saturating_sub(1)) as usize;
        let y = y.min(self.dimensions.height.saturating_sub(1)) as usize;
        let data = self.data.as_ref();
        match self.format {
            BufferFormat::Rgba8 => {
                let offset = y * self.pitch + x * 4;
                [data[offset], data[offset + 1], data[offset + 2], data[offset + 3]]
            }
            BufferFormat::Bgra8 => {
                let offset = y * self.pitch + x * 4;
                [data[offset + 2], data[offset + 1], data[offset], data[offset + 3]]
            }
            BufferFormat::Rgb8 => {
                let offset = y * self.pitch + x * 3;
                [data[offset], data[offset + 1], data[offset + 2], u8::MAX]
            }
            BufferFormat::Astc(_) => [0; 4],
        }
    }

    /// Read a `width` by `height` rectangle of texels starting at (`x`, `y`) into `out` in
    /// row-major order, replicating edge texels for the parts outside the image
    pub fn read_block(&self, x: u32, y: u32, width: u32, height: u32, out: &mut [Color]) {
        for row in 0..height {
            for col in 0..width {
                out[(row * width + col) as usize] = self.texel(x + col, y + row);
            }
        }
    }

    /// The 16 bytes of the compressed block at block column `col` and block row `row`
    pub fn compressed_block(&self, col: u32, row: u32) -> [u8; BLOCK_BYTES] {
        let offset = row as usize * self.pitch + col as usize * BLOCK_BYTES;
        let mut block = [0u8; BLOCK_BYTES];
        block.copy_from_slice(&self.data.as_ref()[offset..offset + BLOCK_BYTES]);
        block
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> TextureBuffer<B> {
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    /// Store one RGBA texel. Coordinates outside the image are ignored.
    pub fn set_texel(&mut self, x: u32, y: u32, color: Color) {
        if !self.dimensions.contains(x, y) {
            return;
        }
        let (x, y) = (x as usize, y as usize);
        let pitch = self.pitch;
        let data = self.data.as_mut();
        match self.format {
            BufferFormat::Rgba8 => {
                let offset = y * pitch + x * 4;
                data[offset..offset + 4].copy_from_slice(&color);
            }
            BufferFormat::Bgra8 => {
                let offset = y * pitch + x * 4;
                data[offset..offset + 4].copy_from_slice(&[color[2], color[1], color[0], color[3]]);
            }
            BufferFormat::Rgb8 => {
                let offset = y * pitch + x * 3;
                data[offset..offset + 3].copy_from_slice(&color[..3]);
            }
            BufferFormat::Astc(_) => {}
        }
    }

    /// Write a rectangle of texels, clipping whatever falls outside the image
    pub fn write_block(&mut self, x: u32, y: u32, width: u32, height: u32, texels: &[Color]) {
        for row in 0..height {
            for col in 0..width {
                self.set_texel(x + col, y + row, texels[(row * width + col) as usize]);
            }
        }
    }
}

impl TextureBuffer<Vec<u8>> {
    /// Allocate a zeroed buffer with the tightest pitch for `format`
    pub fn allocate(format: BufferFormat, dimensions: Dimensions) -> Self {
        let pitch = format.min_pitch(dimensions);
        let size = pitch * format.rows(dimensions);
        Self {
            format,
            dimensions,
            pitch,
            data: vec![0u8; size],
        }
    }
}

impl<B> Dimensioned for TextureBuffer<B> {
    fn dimensions(&self) -> Dimensions {
        self.dimensions
    }
}
