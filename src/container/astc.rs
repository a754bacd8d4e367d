// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The `.astc` file format: a 16 byte header followed by the block data.

use binrw::binrw;

use crate::astc::Footprint;
use crate::container::ContainerHeader;
use crate::dimensions::{Dimensioned, Dimensions};
use crate::error::{CodecError, CodecResult};
use crate::texture::{BufferFormat, TextureBuffer};

const MAX_SIZE: u32 = (1 << 24) - 1;

fn u24_from_bytes(bytes: [u8; 3]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0])
}

fn u24_to_bytes(value: &u32) -> [u8; 3] {
    let [a, b, c, _] = value.to_le_bytes();
    [a, b, c]
}

#[binrw]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[brw(little, magic = 0x5CA1AB13u32)]
#[br(assert(block_z == 1 && size_z == 1, "3D textures are not supported"))]
pub struct AstcHeader {
    pub block_x: u8,
    pub block_y: u8,
    pub block_z: u8,
    #[br(map = u24_from_bytes)]
    #[bw(map = u24_to_bytes)]
    pub size_x: u32,
    #[br(map = u24_from_bytes)]
    #[bw(map = u24_to_bytes)]
    pub size_y: u32,
    #[br(map = u24_from_bytes)]
    #[bw(map = u24_to_bytes)]
    pub size_z: u32,
}

impl AstcHeader {
    pub fn footprint(&self) -> CodecResult<Footprint> {
        Footprint::new(self.block_x as u32, self.block_y as u32)
    }
}

impl ContainerHeader for AstcHeader {
    fn from_texture<B: AsRef<[u8]>>(texture: &TextureBuffer<B>) -> CodecResult<Self> {
        let footprint = match texture.format() {
            BufferFormat::Astc(footprint) => footprint,
            other => return Err(CodecError::UnsupportedInputBuffer(other)),
        };
        let dimensions = texture.dimensions();
        if dimensions.width() > MAX_SIZE || dimensions.height() > MAX_SIZE {
            return Err(CodecError::Internal(format!(
                "{dimensions} is too large for an .astc file"
            )));
        }

        Ok(Self {
            block_x: footprint.width() as u8,
            block_y: footprint.height() as u8,
            block_z: 1,
            size_x: dimensions.width(),
            size_y: dimensions.height(),
            size_z: 1,
        })
    }

    fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.size_x, self.size_y)
    }

    fn format(&self) -> CodecResult<BufferFormat> {
        Ok(BufferFormat::Astc(self.footprint()?))
    }
}
