// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fmt::Debug;
use std::io::{Read, Seek, Write};

use binrw::{BinRead, BinReaderExt, BinWrite, BinWriterExt};

use crate::dimensions::{Dimensioned, Dimensions};
use crate::error::CodecResult;
use crate::texture::{BufferFormat, TextureBuffer};

pub mod astc;

pub use astc::AstcHeader;

/// A header for a texture container. Contains the dimensions and format of a texture,
/// but not the texture data itself.
pub trait ContainerHeader: Sized + Clone + Debug + BinRead + BinWrite
where
    for<'a> <Self as BinRead>::Args<'a>: Default,
    for<'a> <Self as BinWrite>::Args<'a>: Default,
{
    /// Read a texture in this container type using the provided reader. The header object is not exposed
    fn read_texture<R: Read + Seek>(reader: &mut R) -> CodecResult<TextureBuffer> {
        let header: Self = reader.read_le()?;
        header.read_payload(reader)
    }

    /// Write a texture in this container type using the provided writer.
    /// The header object is not exposed
    fn write_texture<W, B>(writer: &mut W, texture: &TextureBuffer<B>) -> CodecResult
    where
        W: Write + Seek,
        B: AsRef<[u8]>,
    {
        let header = Self::from_texture(texture)?;
        writer.write_le(&header)?;

        let format = texture.format();
        let row_bytes = format.min_pitch(texture.dimensions());
        if row_bytes == 0 {
            return Ok(());
        }
        for row in texture.data().chunks(texture.pitch()).take(format.rows(texture.dimensions())) {
            writer.write_all(&row[..row_bytes])?;
        }
        Ok(())
    }

    /// Read the texture data following this header
    fn read_payload<R: Read + Seek>(&self, reader: &mut R) -> CodecResult<TextureBuffer> {
        let format = self.format()?;
        let mut texture = TextureBuffer::allocate(format, self.dimensions());
        reader.read_exact(texture.data_mut())?;
        Ok(texture)
    }

    /// Create a new header describing `texture`
    fn from_texture<B: AsRef<[u8]>>(texture: &TextureBuffer<B>) -> CodecResult<Self>;

    /// Get the dimensions indicated by this container header
    fn dimensions(&self) -> Dimensions;

    /// Get the format of the data following this header
    fn format(&self) -> CodecResult<BufferFormat>;
}
