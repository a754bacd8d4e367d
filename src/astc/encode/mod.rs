// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The per block encoder search.
//!
//! For each partition count the search ranks partitionings, fits ideal endpoint lines for
//! the best few (with and without a second weight plane), estimates which block modes suit
//! that fit, and fully encodes the most promising ones. Every full encoding is scored by the
//! exact error of its decoded texels, and the lowest error wins.

use arrayvec::ArrayVec;
use log::trace;

use crate::astc::block_size::BlockMode;
use crate::astc::codec::Context;
use crate::astc::imageblock::{ErrorWeightBlock, ImageBlock};
use crate::astc::partition::PartitionInfo;
use crate::astc::physical::color_quant_for_block;
use crate::astc::symbolic::{ConstantColor, EndpointFormat, NormalBlock, SymbolicBlock};
use crate::astc::MAX_PARTITIONS;
use crate::color::{ColorF, ColorFImpl, ColorImpl};

use self::color_format::{channel_error, FormatChoice, FormatMemo, FormatSearch, TexelWeights};
use self::ideal::IdealFit;

pub mod color_format;
pub mod ideal;
pub mod partitions;
pub mod weights;

/// Line fit error below which more partitions are not worth searching
const PERFECT_FIT: f32 = 1e-3;
/// Mode percentile limits; each one within the quality's cutoff contributes its best modes
const PERCENTILE_TIERS: [f32; 3] = [0.5, 0.75, 1.0];
/// Refinement stops once a round improves the error by less than this fraction
const REFINE_EPSILON: f64 = 1e-3;
/// Most partitionings searched per partition count at any quality
const MAX_SEARCHED_PARTITIONINGS: usize = 32;

/// The chosen encoding of one block and its weighted squared error
#[derive(Clone, Debug)]
pub struct EncodedBlock {
    pub symbolic: SymbolicBlock,
    pub error: f64,
}

/// Buffers reused from block to block by one worker
#[derive(Clone, Debug, Default)]
pub struct EncodeScratch {
    ranked: Vec<(u32, u16)>,
    estimates: Vec<(f32, usize)>,
    grid_errors: Vec<Option<f32>>,
    candidates: Vec<usize>,
    formats: FormatMemo,
    /// Highest partition count searched for the last block
    partition_count: usize,
}

/// Exact error of decoding every texel as `color`
fn constant_error(block: &ImageBlock, error_weights: &ErrorWeightBlock, color: ColorF) -> f64 {
    (0..block.texel_count())
        .map(|t| {
            let texel = block.texel(t);
            let w = error_weights.weight(t);
            (0..4)
                .map(|c| {
                    let d = (color[c] - texel[c]) as f64;
                    w[c] as f64 * d * d
                })
                .sum::<f64>()
        })
        .sum()
}

/// The block that is always available: every texel at the average color
fn average_color_block(block: &ImageBlock, error_weights: &ErrorWeightBlock) -> EncodedBlock {
    let color = block.average().to_color();
    let decoded = color.to_float();
    EncodedBlock {
        symbolic: SymbolicBlock::ConstantColor(ConstantColor::from_ldr(color)),
        error: constant_error(block, error_weights, decoded),
    }
}

/// The uniform format most blocks like this one end up using
fn likely_format(block: &ImageBlock) -> EndpointFormat {
    match (block.is_grayscale(), block.is_opaque()) {
        (true, true) => EndpointFormat::Luminance,
        (true, false) => EndpointFormat::LuminanceAlpha,
        (false, true) => EndpointFormat::Rgb,
        (false, false) => EndpointFormat::Rgba,
    }
}

/// Estimate every block mode against `fit` and return the indices worth a full encoding
fn candidate_modes(
    context: &Context,
    block: &ImageBlock,
    error_weights: &ErrorWeightBlock,
    fit: &IdealFit,
    count: usize,
    scratch: &mut EncodeScratch,
) {
    let descriptor = context.descriptor();
    let heuristics = context.heuristics();
    let dual = fit.plane2_component.is_some();

    let cheapest: ArrayVec<EndpointFormat, MAX_PARTITIONS> =
        (0..count).map(|_| EndpointFormat::Luminance).collect();
    let likely: ArrayVec<EndpointFormat, MAX_PARTITIONS> =
        (0..count).map(|_| likely_format(block)).collect();
    let sensitivity: f32 = fit.sensitivity.iter().chain(&fit.plane2_sensitivity).sum();
    let importance: f32 = (0..block.texel_count()).map(|t| error_weights.texel_weight(t)).sum();

    scratch.grid_errors.clear();
    scratch.grid_errors.resize(descriptor.decimations().len(), None);
    scratch.estimates.clear();

    for (index, entry) in descriptor.modes().iter().enumerate() {
        let mode = &entry.mode;
        if mode.is_dual_plane() != dual || color_quant_for_block(mode, &cheapest).is_none() {
            continue;
        }

        let grid_error = *scratch.grid_errors[entry.decimation].get_or_insert_with(|| {
            let table = &descriptor.decimation(entry.decimation).table;
            let plane1 = weights::decimate(table, &fit.weights, &fit.sensitivity);
            let mut error = weights::decimation_error(table, &plane1, &fit.weights, &fit.sensitivity);
            if dual {
                let plane2 = weights::decimate(table, &fit.plane2_weights, &fit.plane2_sensitivity);
                error += weights::decimation_error(table, &plane2, &fit.plane2_weights, &fit.plane2_sensitivity);
            }
            error
        });

        let color_step = match color_quant_for_block(mode, &likely) {
            Some(level) => 255.0 / (level.values() - 1) as f32,
            // the block would have to drop channels
            None => 255.0,
        };
        let estimate = grid_error
            + weights::quantization_error(mode.weight_quant()) * sensitivity
            + color_step * color_step / 12.0 * importance;
        scratch.estimates.push((estimate, index));
    }

    scratch
        .estimates
        .sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    scratch.candidates.clear();
    let modes = descriptor.modes();
    for tier in PERCENTILE_TIERS
        .into_iter()
        .filter(|&tier| tier <= heuristics.block_mode_cutoff + 1e-6)
    {
        let best = scratch
            .estimates
            .iter()
            .filter(|&&(_, index)| modes[index].percentile <= tier)
            .take(heuristics.candidate_modes)
            .map(|&(_, index)| index);
        for index in best {
            if !scratch.candidates.contains(&index) {
                scratch.candidates.push(index);
            }
        }
    }
}

fn assemble_block(
    mode: BlockMode,
    partitioning: &PartitionInfo,
    choice: &FormatChoice,
    plane1: &[u8],
    plane2: Option<(usize, &[u8])>,
) -> SymbolicBlock {
    SymbolicBlock::Normal(NormalBlock {
        block_mode: mode,
        partition_index: partitioning.index(),
        formats: choice.formats.clone(),
        color_quant: choice.color_quant,
        colors: choice.colors.clone(),
        weights: plane1.iter().copied().collect(),
        plane2_weights: plane2
            .map(|(_, w)| w.iter().copied().collect())
            .unwrap_or_default(),
        plane2_component: plane2.map(|(c, _)| c as u8),
        mixed_selector: choice.formats.iter().any(|&f| f != choice.formats[0]),
    })
}

/// Fully encode one block mode: quantize the fitted weights onto the mode's grid, then
/// alternate endpoint refits, format selection and weight realignment
fn encode_candidate(
    context: &Context,
    block: &ImageBlock,
    error_weights: &ErrorWeightBlock,
    partitioning: &PartitionInfo,
    fit: &IdealFit,
    mode_index: usize,
    memo: &mut FormatMemo,
) -> Option<EncodedBlock> {
    let descriptor = context.descriptor();
    let entry = &descriptor.modes()[mode_index];
    let mode = entry.mode;
    let table = &descriptor.decimation(entry.decimation).table;
    let quant = context.tables().weight(mode.weight_quant());
    let decode_mode = context.config().decode_mode;
    let plane2 = fit.plane2_component;

    let mut symbols1 = weights::quantize(quant, &weights::decimate(table, &fit.weights, &fit.sensitivity));
    let mut symbols2 = match plane2 {
        Some(_) => weights::quantize(
            quant,
            &weights::decimate(table, &fit.plane2_weights, &fit.plane2_sensitivity),
        ),
        None => ArrayVec::new(),
    };

    let mut search = FormatSearch::new(context.tables(), block, error_weights, partitioning, decode_mode, memo);
    let mut best: Option<EncodedBlock> = None;
    let mut keep = |symbolic: &dyn Fn() -> SymbolicBlock, error: f64| {
        if best.as_ref().map_or(true, |b| error < b.error) {
            best = Some(EncodedBlock {
                symbolic: symbolic(),
                error,
            });
        }
    };

    let mut previous = f64::INFINITY;
    for _ in 0..context.heuristics().max_refinement_iters {
        let texels1 = table.infill(&weights::unquantize(quant, &symbols1));
        let texels2 = plane2.map(|_| table.infill(&weights::unquantize(quant, &symbols2)));
        let texel_weights = TexelWeights {
            plane1: &texels1,
            plane2: plane2.zip(texels2.as_deref()),
        };

        let pairs = ideal::refit_endpoints(block, error_weights, partitioning, &texels1, texel_weights.plane2);
        let Some(choice) = search.select(&mode, &pairs, &texel_weights) else {
            break;
        };
        let mut error = choice.error;
        keep(
            &|| assemble_block(mode, partitioning, &choice, &symbols1, plane2.map(|c| (c, &symbols2[..]))),
            error,
        );

        // with the endpoints fixed, step weights that sit on the wrong side of a level
        let endpoints_of = |t: usize| &choice.endpoints[partitioning.partition_of(t)];
        let mut change = weights::realign(table, quant, &mut symbols1, |t, w| {
            (0..4)
                .filter(|&c| Some(c) != plane2)
                .map(|c| channel_error(block, error_weights, t, c, endpoints_of(t), w, decode_mode))
                .sum()
        });
        if let Some(component) = plane2 {
            change += weights::realign(table, quant, &mut symbols2, |t, w| {
                channel_error(block, error_weights, t, component, endpoints_of(t), w, decode_mode)
            });
        }
        if change < 0.0 {
            error += change;
            keep(
                &|| assemble_block(mode, partitioning, &choice, &symbols1, plane2.map(|c| (c, &symbols2[..]))),
                error,
            );
        }

        if previous - error < REFINE_EPSILON * error.max(1.0) {
            break;
        }
        previous = error;
    }
    best
}

/// Search for the encoding of `block` with the lowest weighted error
pub fn compress_block(context: &Context, block: &ImageBlock, scratch: &mut EncodeScratch) -> EncodedBlock {
    scratch.partition_count = 0;
    if let Some(color) = block.constant_color() {
        return EncodedBlock {
            symbolic: SymbolicBlock::ConstantColor(ConstantColor::from_ldr(color)),
            error: 0.0,
        };
    }

    let descriptor = context.descriptor();
    let heuristics = context.heuristics();
    let error_weights = ErrorWeightBlock::new(block, context.config().channel_weights);
    let correlations = ideal::channel_correlations(block, &error_weights);

    let mut best = average_color_block(block, &error_weights);
    let mut fallback = true;

    for count in 1..=heuristics.max_partitions.min(MAX_PARTITIONS) {
        let mut seeds: ArrayVec<u16, MAX_SEARCHED_PARTITIONINGS> = ArrayVec::new();
        if count == 1 {
            seeds.push(0);
        } else {
            partitions::rank_partitionings(block, &error_weights, descriptor.partitions(), count, &mut scratch.ranked);
            let limit = heuristics.partition_search_limit.min(MAX_SEARCHED_PARTITIONINGS);
            seeds.extend(scratch.ranked.iter().take(limit).map(|&(_, seed)| seed));

            // even an unquantized line per partition cannot get close to what is already found
            let Some(&top) = seeds.first() else {
                break;
            };
            let estimate = ideal::compute_ideal(block, &error_weights, descriptor.partitions().get(count, top), None).error;
            if estimate as f64 > best.error * heuristics.partition_error_margin as f64 {
                trace!("Skipping {count} partitions: line fit {estimate:.1} against best {:.1}", best.error);
                break;
            }
        }
        scratch.partition_count = count;

        let mut leading_error = None;
        for seed in seeds {
            let partitioning = descriptor.partitions().get(count, seed);
            let dual_planes = (0..4)
                .filter(|&c| count < MAX_PARTITIONS && correlations[c] < heuristics.dual_plane_correlation_cutoff)
                .map(Some);

            for plane2 in std::iter::once(None).chain(dual_planes) {
                let fit = ideal::compute_ideal(block, &error_weights, partitioning, plane2);
                if plane2.is_none() && leading_error.is_none() {
                    leading_error = Some(fit.error);
                }

                candidate_modes(context, block, &error_weights, &fit, count, scratch);
                for i in 0..scratch.candidates.len() {
                    let mode_index = scratch.candidates[i];
                    let found =
                        encode_candidate(context, block, &error_weights, partitioning, &fit, mode_index, &mut scratch.formats);
                    if let Some(found) = found.filter(|found| found.error < best.error) {
                        best = found;
                        fallback = false;
                    }
                }
            }
        }

        // the best line of this partition count already fits, more partitions cannot help
        if leading_error.map_or(true, |error| error <= PERFECT_FIT) {
            break;
        }
    }

    if fallback {
        trace!("Block encoded as its average color, error {:.1}", best.error);
    }
    trace!("Searched up to {} partitions, error {:.1}", scratch.partition_count, best.error);
    best
}
