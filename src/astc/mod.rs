// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! ASTC block compression.
//!
//! The pieces fit together as follows: a [`codec::Context`] owns the geometry tables for one
//! footprint ([`block_size::BlockSizeDescriptor`]) and the quantization tables
//! ([`quant::QuantTables`]). The encoder search in [`encode`] produces a
//! [`symbolic::SymbolicBlock`] per block, which [`physical`] packs into the 16 byte wire format.
//! Decoding runs the last two steps backwards through [`decompress`].

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::error::{CodecError, CodecResult};

pub mod block_size;
pub mod codec;
pub mod decimation;
pub mod decompress;
pub mod encode;
pub mod endpoints;
pub mod imageblock;
pub mod ise;
pub mod partition;
pub mod physical;
pub mod quant;
pub mod symbolic;

/// Size of one compressed block in bytes
pub const BLOCK_BYTES: usize = 16;
/// Most texels in a 2D footprint (12x12)
pub const MAX_TEXELS: usize = 144;
/// Most weights a block can carry, counting both planes
pub const MAX_WEIGHTS: usize = 64;
pub const MAX_PARTITIONS: usize = 4;
/// Partition seeds per partition count
pub const PARTITION_SEEDS: usize = 1024;
/// Hard cap on encoder worker threads
pub const MAX_THREADS: usize = 128;

/// One of the 14 block sizes ASTC defines for 2D textures
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Footprint {
    width: u8,
    height: u8,
}

impl Footprint {
    pub const ASTC_4X4: Footprint = Footprint::of(4, 4);
    pub const ASTC_5X4: Footprint = Footprint::of(5, 4);
    pub const ASTC_5X5: Footprint = Footprint::of(5, 5);
    pub const ASTC_6X5: Footprint = Footprint::of(6, 5);
    pub const ASTC_6X6: Footprint = Footprint::of(6, 6);
    pub const ASTC_8X5: Footprint = Footprint::of(8, 5);
    pub const ASTC_8X6: Footprint = Footprint::of(8, 6);
    pub const ASTC_10X5: Footprint = Footprint::of(10, 5);
    pub const ASTC_10X6: Footprint = Footprint::of(10, 6);
    pub const ASTC_8X8: Footprint = Footprint::of(8, 8);
    pub const ASTC_10X8: Footprint = Footprint::of(10, 8);
    pub const ASTC_10X10: Footprint = Footprint::of(10, 10);
    pub const ASTC_12X10: Footprint = Footprint::of(12, 10);
    pub const ASTC_12X12: Footprint = Footprint::of(12, 12);

    pub const ALL: [Footprint; 14] = [
        Self::ASTC_4X4,
        Self::ASTC_5X4,
        Self::ASTC_5X5,
        Self::ASTC_6X5,
        Self::ASTC_6X6,
        Self::ASTC_8X5,
        Self::ASTC_8X6,
        Self::ASTC_10X5,
        Self::ASTC_10X6,
        Self::ASTC_8X8,
        Self::ASTC_10X8,
        Self::ASTC_10X10,
        Self::ASTC_12X10,
        Self::ASTC_12X12,
    ];

    const fn of(width: u8, height: u8) -> Self {
        Footprint { width, height }
    }

    /// Look up a footprint by size, rejecting anything ASTC does not define
    pub fn new(width: u32, height: u32) -> CodecResult<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.width as u32 == width && f.height as u32 == height)
            .ok_or(CodecError::InvalidFootprint { width, height })
    }

    pub fn width(self) -> u32 {
        self.width as u32
    }

    pub fn height(self) -> u32 {
        self.height as u32
    }

    pub fn texel_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Small blocks double their texel coordinates when selecting partitions
    pub fn is_small(self) -> bool {
        self.texel_count() < 31
    }
}

impl Display for Footprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Footprint {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CodecError::InvalidFootprint {
            width: 0,
            height: 0,
        };
        let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let width = w.parse::<u32>().map_err(|_| invalid())?;
        let height = h.parse::<u32>().map_err(|_| invalid())?;
        Footprint::new(width, height)
    }
}

/// How endpoint colors are expanded to 16 bits before interpolation
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::VariantArray,
)]
pub enum DecodeMode {
    #[strum(serialize = "srgb")]
    LdrSrgb,
    #[default]
    #[strum(serialize = "ldr")]
    Ldr,
    #[strum(serialize = "hdr")]
    Hdr,
}

/// User facing encoder settings
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EncoderConfig {
    pub footprint: Footprint,
    /// 0 is fastest, 1 searches the most candidates
    pub quality: f32,
    pub decode_mode: DecodeMode,
    /// Requested worker count; clamped to the hardware and [`MAX_THREADS`]
    pub threads: usize,
    /// Relative importance of the R, G, B and A channels in the error metric
    pub channel_weights: [f32; 4],
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            footprint: Footprint::ASTC_4X4,
            quality: 0.5,
            decode_mode: DecodeMode::Ldr,
            threads: std::thread::available_parallelism().map_or(1, |n| n.get()),
            channel_weights: [1.0; 4],
        }
    }
}

impl EncoderConfig {
    pub fn new(footprint: Footprint) -> Self {
        Self {
            footprint,
            ..Default::default()
        }
    }

    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = if quality.is_nan() { 0.0 } else { quality.clamp(0.0, 1.0) };
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn with_decode_mode(mut self, decode_mode: DecodeMode) -> Self {
        self.decode_mode = decode_mode;
        self
    }

    pub fn with_channel_weights(mut self, channel_weights: [f32; 4]) -> Self {
        self.channel_weights = channel_weights.map(|w| w.max(0.0));
        self
    }

    /// Threads actually used: the request, bounded by the hardware and [`MAX_THREADS`]
    pub fn effective_threads(&self) -> usize {
        let hardware = std::thread::available_parallelism().map_or(1, |n| n.get());
        self.threads.min(hardware).min(MAX_THREADS).max(1)
    }

    pub fn heuristics(&self) -> Heuristics {
        Heuristics::from_quality(self.quality)
    }
}

/// Search limits derived from the quality setting.
///
/// Every limit grows (or stays put) as quality rises, so a higher quality always searches a
/// superset of the candidates a lower quality searches.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Heuristics {
    /// Partitionings evaluated per partition count, best ranked first
    pub partition_search_limit: usize,
    /// Block modes with a preference percentile above this are skipped
    pub block_mode_cutoff: f32,
    /// Weight quantize / endpoint refit rounds per candidate
    pub max_refinement_iters: usize,
    /// Best estimated block modes evaluated per partitioning
    pub candidate_modes: usize,
    pub max_partitions: usize,
    /// A channel is tried on its own weight plane when its correlation with the others
    /// falls below this
    pub dual_plane_correlation_cutoff: f32,
    /// A further partition count is searched only while the line fit of its best ranked
    /// partitioning stays under the best error found times this
    pub partition_error_margin: f32,
}

impl Heuristics {
    pub fn from_quality(quality: f32) -> Self {
        let q = if quality.is_nan() { 0.0 } else { quality.clamp(0.0, 1.0) };
        Self {
            partition_search_limit: 1 + (31.0 * q * q).round() as usize,
            block_mode_cutoff: 0.5 + 0.5 * q,
            max_refinement_iters: 1 + (3.0 * q).round() as usize,
            candidate_modes: 2 + (2.0 * q).round() as usize,
            max_partitions: match q {
                q if q < 0.1 => 2,
                q if q < 0.3 => 3,
                _ => 4,
            },
            dual_plane_correlation_cutoff: 0.5 + 0.49 * q,
            partition_error_margin: 1.0 + 4.0 * q,
        }
    }
}
