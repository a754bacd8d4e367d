// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::texture::BufferFormat;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Unsupported type of input buffer: {0}")]
    UnsupportedInputBuffer(BufferFormat),

    #[error("Unsupported type of output buffer: {0}")]
    UnsupportedOutputBuffer(BufferFormat),

    #[error("Invalid ASTC block footprint {width}x{height}")]
    InvalidFootprint { width: u32, height: u32 },

    #[error("Buffer holds {actual} bytes but {expected} are required")]
    BufferSize { expected: usize, actual: usize },

    #[error("Error in file header: {0}")]
    Header(#[from] binrw::Error),

    #[error("IO error in file contents: {0}")]
    IO(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Block cannot be packed: {0}")]
    InvalidBlock(&'static str),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type CodecResult<T = ()> = Result<T, CodecError>;
