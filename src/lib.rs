// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

pub mod astc;
pub mod color;
pub mod container;
pub mod dimensions;
pub mod error;
pub mod pack;
pub mod texture;
mod util;

pub use astc::codec::{compress, decompress, Context};
pub use astc::{DecodeMode, EncoderConfig, Footprint};
pub use container::{AstcHeader, ContainerHeader};
pub use error::{CodecError, CodecResult};
pub use texture::{BufferFormat, TextureBuffer};
