// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Choosing endpoint formats and color integers for fitted endpoints.
//!
//! Every option is scored by the exact error the decoder will produce, so the choice between
//! a cheap format at fine quantization and a rich format at coarse quantization is settled by
//! measurement rather than estimate.

use std::collections::HashMap;

use arrayvec::ArrayVec;

use crate::astc::block_size::BlockMode;
use crate::astc::decompress::decode_channel;
use crate::astc::encode::ideal::EndpointPair;
use crate::astc::endpoints::{self, UnpackedEndpoints, ENCODABLE_FORMATS};
use crate::astc::imageblock::{ErrorWeightBlock, ImageBlock};
use crate::astc::partition::PartitionInfo;
use crate::astc::physical::color_quant_for_block;
use crate::astc::quant::{QuantLevel, QuantTables};
use crate::astc::symbolic::{EndpointFormat, MAX_COLOR_INTS};
use crate::astc::{DecodeMode, MAX_PARTITIONS};

/// Texel weights (0..=64) of both planes and the channel on plane 2
#[derive(Copy, Clone, Debug)]
pub struct TexelWeights<'a> {
    pub plane1: &'a [u8],
    pub plane2: Option<(usize, &'a [u8])>,
}

impl TexelWeights<'_> {
    pub fn for_channel(&self, texel: usize, channel: usize) -> u8 {
        match self.plane2 {
            Some((component, plane2)) if component == channel => plane2[texel],
            _ => self.plane1[texel],
        }
    }
}

/// Exact weighted error of one channel of one texel decoded with `weight`
pub fn channel_error(
    block: &ImageBlock,
    weights: &ErrorWeightBlock,
    texel: usize,
    channel: usize,
    endpoints: &UnpackedEndpoints,
    weight: u8,
    mode: DecodeMode,
) -> f64 {
    let decoded = decode_channel(endpoints, channel, weight as i32, mode) as f64;
    let d = decoded - block.texel(texel)[channel] as f64;
    weights.weight(texel)[channel] as f64 * d * d
}

/// Best encoding found for one partition at one format and color level
#[derive(Clone, Debug)]
struct PartitionChoice {
    symbols: ArrayVec<u8, 8>,
    endpoints: UnpackedEndpoints,
    error: f64,
}

/// Formats, color integers and the decoded endpoints they produce, with their exact error
#[derive(Clone, Debug)]
pub struct FormatChoice {
    pub formats: ArrayVec<EndpointFormat, MAX_PARTITIONS>,
    pub color_quant: QuantLevel,
    pub colors: ArrayVec<u8, MAX_COLOR_INTS>,
    pub endpoints: ArrayVec<UnpackedEndpoints, MAX_PARTITIONS>,
    pub error: f64,
}

fn keep_better(best: &mut Option<FormatChoice>, candidate: Option<FormatChoice>) {
    if let Some(candidate) = candidate {
        if best.as_ref().map_or(true, |b| candidate.error < b.error) {
            *best = Some(candidate);
        }
    }
}

/// Partition results of one [`FormatSearch::select`] call, kept between blocks so its storage
/// is reused
#[derive(Clone, Debug, Default)]
pub struct FormatMemo(HashMap<(QuantLevel, usize, EndpointFormat), Option<PartitionChoice>>);

/// Searches format assignments
pub struct FormatSearch<'a> {
    pub tables: &'a QuantTables,
    pub block: &'a ImageBlock,
    pub weights: &'a ErrorWeightBlock,
    pub partitioning: &'a PartitionInfo,
    pub decode_mode: DecodeMode,
    memo: &'a mut FormatMemo,
}

impl<'a> FormatSearch<'a> {
    pub fn new(
        tables: &'a QuantTables,
        block: &'a ImageBlock,
        weights: &'a ErrorWeightBlock,
        partitioning: &'a PartitionInfo,
        decode_mode: DecodeMode,
        memo: &'a mut FormatMemo,
    ) -> Self {
        Self {
            tables,
            block,
            weights,
            partitioning,
            decode_mode,
            memo,
        }
    }

    /// Error of every texel of `partition` decoded from `endpoints`
    fn partition_error(&self, partition: usize, endpoints: &UnpackedEndpoints, texel_weights: &TexelWeights) -> f64 {
        self.partitioning
            .texels(partition)
            .iter()
            .map(|&t| {
                let t = t as usize;
                (0..4)
                    .map(|c| {
                        let w = texel_weights.for_channel(t, c);
                        channel_error(self.block, self.weights, t, c, endpoints, w, self.decode_mode)
                    })
                    .sum::<f64>()
            })
            .sum()
    }

    fn choose(
        &mut self,
        level: QuantLevel,
        partition: usize,
        format: EndpointFormat,
        pair: EndpointPair,
        texel_weights: &TexelWeights,
    ) -> Option<PartitionChoice> {
        if let Some(known) = self.memo.0.get(&(level, partition, format)) {
            return known.clone();
        }

        let table = self.tables.color(level);
        let best = endpoints::pack(format, pair.0, pair.1, table)
            .into_iter()
            .map(|symbols| {
                let values: ArrayVec<i32, 8> = symbols.iter().map(|&s| table.unquantize(s) as i32).collect();
                let unpacked = endpoints::unpack(format, &values);
                let error = self.partition_error(partition, &unpacked, texel_weights);
                PartitionChoice {
                    symbols,
                    endpoints: unpacked,
                    error,
                }
            })
            .filter(|choice| !choice.endpoints.is_hdr())
            .reduce(|best, next| if next.error < best.error { next } else { best });

        self.memo.0.insert((level, partition, format), best.clone());
        best
    }

    /// Assemble a block's formats when every partition can be served at `level`
    fn assemble(
        &mut self,
        level: QuantLevel,
        formats: &[EndpointFormat],
        pairs: &[EndpointPair],
        texel_weights: &TexelWeights,
    ) -> Option<FormatChoice> {
        let mut choice = FormatChoice {
            formats: formats.iter().copied().collect(),
            color_quant: level,
            colors: ArrayVec::new(),
            endpoints: ArrayVec::new(),
            error: 0.0,
        };
        for (p, &format) in formats.iter().enumerate() {
            let partition = self.choose(level, p, format, pairs[p], texel_weights)?;
            choice.colors.extend(partition.symbols);
            choice.endpoints.push(partition.endpoints);
            choice.error += partition.error;
        }
        Some(choice)
    }

    /// The lowest error assignment of formats to partitions that fits beside `mode`'s weights
    pub fn select(&mut self, mode: &BlockMode, pairs: &[EndpointPair], texel_weights: &TexelWeights) -> Option<FormatChoice> {
        self.memo.0.clear();
        let count = self.partitioning.partition_count();
        let mut best: Option<FormatChoice> = None;

        // one format code for the whole block
        for format in ENCODABLE_FORMATS {
            let formats: ArrayVec<EndpointFormat, MAX_PARTITIONS> = (0..count).map(|_| format).collect();
            if let Some(level) = color_quant_for_block(mode, &formats) {
                keep_better(&mut best, self.assemble(level, &formats, pairs, texel_weights));
            }
        }

        if count == 1 {
            return best;
        }

        // mixed formats: each partition takes the base class or the one above it
        let mut seen: ArrayVec<ArrayVec<usize, MAX_PARTITIONS>, 48> = ArrayVec::new();
        for base in 0..=2 {
            for mask in 0..(1usize << count) {
                let classes: ArrayVec<usize, MAX_PARTITIONS> =
                    (0..count).map(|p| base + ((mask >> p) & 1)).collect();
                if seen.contains(&classes) {
                    continue;
                }
                seen.push(classes.clone());

                // stand-in formats that share the classes but not one format code
                let stand_in: ArrayVec<EndpointFormat, MAX_PARTITIONS> = classes
                    .iter()
                    .enumerate()
                    .map(|(p, &class)| EndpointFormat::from_bits((class << 2) as u32 | (p > 0) as u32))
                    .collect();
                let Some(level) = color_quant_for_block(mode, &stand_in) else {
                    continue;
                };

                let mut formats: ArrayVec<EndpointFormat, MAX_PARTITIONS> = ArrayVec::new();
                for (p, &class) in classes.iter().enumerate() {
                    let pick = ENCODABLE_FORMATS
                        .into_iter()
                        .filter(|f| f.class() == class)
                        .filter_map(|f| self.choose(level, p, f, pairs[p], texel_weights).map(|c| (f, c.error)))
                        .reduce(|best, next| if next.1 < best.1 { next } else { best });
                    match pick {
                        Some((format, _)) => formats.push(format),
                        None => break,
                    }
                }
                // a uniform pick is covered, at a finer level, by the loop above
                if formats.len() < count || formats.iter().all(|&f| f == formats[0]) {
                    continue;
                }
                keep_better(&mut best, self.assemble(level, &formats, pairs, texel_weights));
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astc::block_size::{BlockModeKind, BlockSizeDescriptor};
    use crate::astc::partition::{sample_texels, PartitionTable};
    use crate::astc::Footprint;
    use crate::color::{Color, ColorImpl};

    fn normal_mode(raw: u16) -> anyhow::Result<BlockMode> {
        match BlockMode::decode(raw) {
            BlockModeKind::Normal(mode) => Ok(mode),
            other => anyhow::bail!("{other:?} is not a normal mode"),
        }
    }

    #[test]
    fn gray_blocks_pick_luminance() -> anyhow::Result<()> {
        let colors: Vec<Color> = (0..16).map(|i| [i * 16, i * 16, i * 16, 255]).collect();
        let block = ImageBlock::new(Footprint::ASTC_4X4, &colors, |_| true);
        let weights = ErrorWeightBlock::new(&block, [1.0; 4]);
        let single = PartitionInfo::single(Footprint::ASTC_4X4, &sample_texels(16));
        let tables = QuantTables::new();
        let plane: Vec<u8> = (0..16).map(|i| i * 4 + i / 4).collect();

        let mut memo = FormatMemo::default();
        let mut search = FormatSearch::new(&tables, &block, &weights, &single, DecodeMode::Ldr, &mut memo);
        let pair = (colors[0].to_float(), colors[15].to_float());
        let mode = normal_mode(0b000_0100_0010)?;
        let choice = search
            .select(&mode, &[pair], &TexelWeights { plane1: &plane, plane2: None })
            .ok_or_else(|| anyhow::anyhow!("no format fits"))?;
        assert_eq!(choice.formats.as_slice(), &[EndpointFormat::Luminance]);
        assert_eq!(Some(choice.color_quant), color_quant_for_block(&mode, &choice.formats));
        assert_eq!(choice.colors.len(), 2);
        Ok(())
    }

    #[test]
    fn partitions_may_mix_formats() -> anyhow::Result<()> {
        let footprint = Footprint::ASTC_6X6;
        let table = PartitionTable::new(footprint);
        let info = table.get(2, table.encodable(2)[0]);
        // partition 0 is gray, partition 1 is translucent color
        let colors: Vec<Color> = (0..36)
            .map(|t| match info.partition_of(t) {
                0 => [90, 90, 90, 255],
                _ => [200, 30, 60, 40],
            })
            .collect();
        let block = ImageBlock::new(footprint, &colors, |_| true);
        let weights = ErrorWeightBlock::new(&block, [1.0; 4]);
        let tables = QuantTables::new();
        let plane = [0u8; 36];

        let mut memo = FormatMemo::default();
        let mut search = FormatSearch::new(&tables, &block, &weights, info, DecodeMode::Ldr, &mut memo);
        let pairs = [
            (colors_of(&colors, info, 0), colors_of(&colors, info, 0)),
            (colors_of(&colors, info, 1), colors_of(&colors, info, 1)),
        ];
        // the cheapest weight grid leaves the most room for colors
        let descriptor = BlockSizeDescriptor::new(footprint);
        let mode = descriptor
            .modes()
            .iter()
            .map(|entry| entry.mode)
            .filter(|mode| !mode.is_dual_plane())
            .min_by_key(|mode| (mode.weight_bits(), mode.raw()))
            .ok_or_else(|| anyhow::anyhow!("no block modes"))?;
        let choice = search
            .select(&mode, &pairs, &TexelWeights { plane1: &plane, plane2: None })
            .ok_or_else(|| anyhow::anyhow!("no format fits"))?;
        assert_eq!(choice.formats.len(), 2);
        assert!(choice.formats[1].class() >= 3 || choice.formats[1] == EndpointFormat::RgbScaleAlpha);
        assert_eq!(Some(choice.color_quant), color_quant_for_block(&mode, &choice.formats));
        assert!(choice.error < 100.0, "error {}", choice.error);
        Ok(())
    }

    fn colors_of(colors: &[Color], info: &PartitionInfo, partition: usize) -> crate::color::ColorF {
        colors[info.texels(partition)[0] as usize].to_float()
    }
}
