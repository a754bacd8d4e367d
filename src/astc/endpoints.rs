// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Color endpoint formats: turning color integers into endpoint pairs, and back.

use arrayvec::ArrayVec;

use crate::astc::quant::ColorQuantTable;
use crate::astc::symbolic::EndpointFormat;
use crate::color::{ColorF, ColorFImpl};

/// Alpha of HDR formats without an alpha channel: 1.0 in the logarithmic encoding
const HDR_ALPHA_ONE: i32 = 0x7800;

/// One partition's endpoints as the decoder sees them.
///
/// LDR channels hold 8 bit values; HDR channels hold 16 bit logarithmic values.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UnpackedEndpoints {
    pub e0: [i32; 4],
    pub e1: [i32; 4],
    pub rgb_hdr: bool,
    pub alpha_hdr: bool,
}

impl UnpackedEndpoints {
    fn ldr(e0: [i32; 4], e1: [i32; 4]) -> Self {
        Self {
            e0: e0.map(|c| c.clamp(0, 255)),
            e1: e1.map(|c| c.clamp(0, 255)),
            rgb_hdr: false,
            alpha_hdr: false,
        }
    }

    fn hdr(e0: [i32; 4], e1: [i32; 4], alpha_hdr: bool) -> Self {
        Self {
            e0,
            e1,
            rgb_hdr: true,
            alpha_hdr,
        }
    }

    pub fn is_hdr(&self) -> bool {
        self.rgb_hdr || self.alpha_hdr
    }
}

fn bit_transfer_signed(a: i32, b: i32) -> (i32, i32) {
    let b = (b >> 1) | (a & 0x80);
    let mut a = (a >> 1) & 0x3F;
    if a & 0x20 != 0 {
        a -= 0x40;
    }
    (a, b)
}

fn blue_contract(c: [i32; 4]) -> [i32; 4] {
    [(c[0] + c[2]) >> 1, (c[1] + c[2]) >> 1, c[2], c[3]]
}

fn hdr_luminance_large_range(v: &[i32]) -> UnpackedEndpoints {
    let (y0, y1) = if v[1] >= v[0] {
        (v[0] << 4, v[1] << 4)
    } else {
        ((v[1] << 4) + 8, (v[0] << 4) - 8)
    };
    let (y0, y1) = (y0 << 4, y1 << 4);
    UnpackedEndpoints::hdr(
        [y0, y0, y0, HDR_ALPHA_ONE],
        [y1, y1, y1, HDR_ALPHA_ONE],
        true,
    )
}

fn hdr_luminance_small_range(v: &[i32]) -> UnpackedEndpoints {
    let (y0, d) = if v[0] & 0x80 != 0 {
        (((v[1] & 0xE0) << 4) | ((v[0] & 0x7F) << 2), (v[1] & 0x1F) << 2)
    } else {
        (((v[1] & 0xF0) << 4) | ((v[0] & 0x7F) << 1), (v[1] & 0x0F) << 1)
    };
    let y1 = (y0 + d).min(0xFFF);
    let (y0, y1) = (y0 << 4, y1 << 4);
    UnpackedEndpoints::hdr(
        [y0, y0, y0, HDR_ALPHA_ONE],
        [y1, y1, y1, HDR_ALPHA_ONE],
        true,
    )
}

fn hdr_rgb_scale(v: &[i32]) -> UnpackedEndpoints {
    let modeval = ((v[0] & 0xC0) >> 6) | (((v[1] & 0x80) >> 7) << 2) | (((v[2] & 0x80) >> 7) << 3);
    let (majcomp, mode) = if modeval & 0xC != 0xC {
        (modeval >> 2, modeval & 3)
    } else if modeval != 0xF {
        (modeval & 3, 4)
    } else {
        (0, 5)
    };

    let mut red = v[0] & 0x3F;
    let mut green = v[1] & 0x1F;
    let mut blue = v[2] & 0x1F;
    let mut scale = v[3] & 0x1F;

    let bit0 = (v[1] >> 6) & 1;
    let bit1 = (v[1] >> 5) & 1;
    let bit2 = (v[2] >> 6) & 1;
    let bit3 = (v[2] >> 5) & 1;
    let bit4 = (v[3] >> 7) & 1;
    let bit5 = (v[3] >> 6) & 1;
    let bit6 = (v[3] >> 5) & 1;

    let oh = 1 << mode;
    let on = |mask: i32| oh & mask != 0;
    if on(0x30) {
        green |= bit0 << 6;
        blue |= bit2 << 6;
    }
    if on(0x3A) {
        green |= bit1 << 5;
        blue |= bit3 << 5;
    }
    if on(0x3D) {
        scale |= bit6 << 5;
    }
    if on(0x2D) {
        scale |= bit5 << 6;
    }
    if on(0x04) {
        scale |= bit4 << 7;
        red |= bit3 << 6;
    }
    if on(0x3B) {
        red |= bit4 << 6;
    }
    if on(0x10) {
        red |= bit5 << 7;
    }
    if on(0x0F) {
        red |= bit2 << 7;
    }
    if on(0x05) {
        red |= bit1 << 8;
        red |= bit0 << 9;
    }
    if on(0x0A) {
        red |= bit0 << 8;
    }
    if on(0x02) {
        red |= bit6 << 9;
        red |= bit5 << 10;
    }
    if on(0x01) {
        red |= bit3 << 10;
    }

    let shift = [1, 1, 2, 3, 4, 5][mode as usize];
    red <<= shift;
    green <<= shift;
    blue <<= shift;
    scale <<= shift;

    if mode != 5 {
        green = red - green;
        blue = red - blue;
    }

    match majcomp {
        1 => std::mem::swap(&mut red, &mut green),
        2 => std::mem::swap(&mut red, &mut blue),
        _ => {}
    }

    let e1 = [red, green, blue].map(|c| c.clamp(0, 0xFFF) << 4);
    let e0 = [red - scale, green - scale, blue - scale].map(|c| c.clamp(0, 0xFFF) << 4);
    UnpackedEndpoints::hdr(
        [e0[0], e0[1], e0[2], HDR_ALPHA_ONE],
        [e1[0], e1[1], e1[2], HDR_ALPHA_ONE],
        true,
    )
}

/// HDR RGB endpoints, without alpha
fn hdr_rgb(v: &[i32]) -> ([i32; 3], [i32; 3]) {
    let modeval = ((v[1] & 0x80) >> 7) | (((v[2] & 0x80) >> 7) << 1) | (((v[3] & 0x80) >> 7) << 2);
    let majcomp = ((v[4] & 0x80) >> 7) | (((v[5] & 0x80) >> 7) << 1);

    if majcomp == 3 {
        return (
            [v[0] << 8, v[2] << 8, (v[4] & 0x7F) << 9],
            [v[1] << 8, v[3] << 8, (v[5] & 0x7F) << 9],
        );
    }

    let mut a = v[0] | ((v[1] & 0x40) << 2);
    let mut b0 = v[2] & 0x3F;
    let mut b1 = v[3] & 0x3F;
    let mut c = v[1] & 0x3F;
    let mut d0 = v[4] & 0x7F;
    let mut d1 = v[5] & 0x7F;

    let dbits = [7, 6, 7, 6, 5, 6, 5, 6][modeval as usize];

    let bit0 = (v[2] >> 6) & 1;
    let bit1 = (v[3] >> 6) & 1;
    let bit2 = (v[4] >> 6) & 1;
    let bit3 = (v[5] >> 6) & 1;
    let bit4 = (v[4] >> 5) & 1;
    let bit5 = (v[5] >> 5) & 1;

    let oh = 1 << modeval;
    let on = |mask: i32| oh & mask != 0;
    if on(0xA4) {
        a |= bit0 << 9;
    }
    if on(0x8) {
        a |= bit2 << 9;
    }
    if on(0x50) {
        a |= bit4 << 9;
        a |= bit5 << 10;
    }
    if on(0xA0) {
        a |= bit1 << 10;
    }
    if on(0xC0) {
        a |= bit2 << 11;
    }
    if on(0x4) {
        c |= bit1 << 6;
    }
    if on(0xE8) {
        c |= bit3 << 6;
    }
    if on(0x20) {
        c |= bit2 << 7;
    }
    if on(0x5B) {
        b0 |= bit0 << 6;
        b1 |= bit1 << 6;
    }
    if on(0x12) {
        b0 |= bit2 << 7;
        b1 |= bit3 << 7;
    }
    if on(0xAF) {
        d0 |= bit4 << 5;
        d1 |= bit5 << 5;
    }
    if on(0x5) {
        d0 |= bit2 << 6;
        d1 |= bit3 << 6;
    }

    let extend = 32 - dbits;
    d0 = (d0 << extend) >> extend;
    d1 = (d1 << extend) >> extend;

    let shift = (modeval >> 1) ^ 3;
    a <<= shift;
    b0 <<= shift;
    b1 <<= shift;
    c <<= shift;
    d0 <<= shift;
    d1 <<= shift;

    let mut e1 = [a, a - b0, a - b1].map(|x| x.clamp(0, 4095));
    let mut e0 = [a - c, a - b0 - c - d0, a - b1 - c - d1].map(|x| x.clamp(0, 4095));
    match majcomp {
        1 => {
            e0.swap(0, 1);
            e1.swap(0, 1);
        }
        2 => {
            e0.swap(0, 2);
            e1.swap(0, 2);
        }
        _ => {}
    }

    (e0.map(|x| x << 4), e1.map(|x| x << 4))
}

fn hdr_alpha(v6: i32, v7: i32) -> (i32, i32) {
    let selector = ((v6 >> 7) & 1) | ((v7 >> 6) & 2);
    let mut v6 = v6 & 0x7F;
    let mut v7 = v7 & 0x7F;

    let (a0, a1) = if selector == 3 {
        (v6 << 5, v7 << 5)
    } else {
        v6 |= (v7 << (selector + 1)) & 0x780;
        v7 &= 0x3F >> selector;
        v7 ^= 32 >> selector;
        v7 -= 32 >> selector;
        v6 <<= 4 - selector;
        v7 <<= 4 - selector;
        v7 += v6;
        (v6, v7.clamp(0, 0xFFF))
    };
    (a0 << 4, a1 << 4)
}

/// Turn a partition's unquantized color integers (0..=255) into its endpoint pair
pub fn unpack(format: EndpointFormat, v: &[i32]) -> UnpackedEndpoints {
    use EndpointFormat::*;

    match format {
        Luminance => UnpackedEndpoints::ldr([v[0], v[0], v[0], 255], [v[1], v[1], v[1], 255]),
        LuminanceDelta => {
            let l0 = (v[0] >> 2) | (v[1] & 0xC0);
            let l1 = (l0 + (v[1] & 0x3F)).min(255);
            UnpackedEndpoints::ldr([l0, l0, l0, 255], [l1, l1, l1, 255])
        }
        LuminanceAlpha => UnpackedEndpoints::ldr([v[0], v[0], v[0], v[2]], [v[1], v[1], v[1], v[3]]),
        LuminanceAlphaDelta => {
            let (d0, l0) = bit_transfer_signed(v[1], v[0]);
            let (d1, a0) = bit_transfer_signed(v[3], v[2]);
            let l1 = l0 + d0;
            UnpackedEndpoints::ldr([l0, l0, l0, a0], [l1, l1, l1, a0 + d1])
        }
        RgbScale => UnpackedEndpoints::ldr(
            [
                (v[0] * v[3]) >> 8,
                (v[1] * v[3]) >> 8,
                (v[2] * v[3]) >> 8,
                255,
            ],
            [v[0], v[1], v[2], 255],
        ),
        RgbScaleAlpha => UnpackedEndpoints::ldr(
            [
                (v[0] * v[3]) >> 8,
                (v[1] * v[3]) >> 8,
                (v[2] * v[3]) >> 8,
                v[4],
            ],
            [v[0], v[1], v[2], v[5]],
        ),
        Rgb | Rgba => {
            let (a0, a1) = if format == Rgba { (v[6], v[7]) } else { (255, 255) };
            let c0 = [v[0], v[2], v[4], a0];
            let c1 = [v[1], v[3], v[5], a1];
            if v[1] + v[3] + v[5] >= v[0] + v[2] + v[4] {
                UnpackedEndpoints::ldr(c0, c1)
            } else {
                UnpackedEndpoints::ldr(blue_contract(c1), blue_contract(c0))
            }
        }
        RgbDelta | RgbaDelta => {
            let (dr, r) = bit_transfer_signed(v[1], v[0]);
            let (dg, g) = bit_transfer_signed(v[3], v[2]);
            let (db, b) = bit_transfer_signed(v[5], v[4]);
            let (da, a) = if format == RgbaDelta {
                bit_transfer_signed(v[7], v[6])
            } else {
                (0, 255)
            };
            let base = [r, g, b, a];
            let moved = [r + dr, g + dg, b + db, a + da];
            if dr + dg + db >= 0 {
                UnpackedEndpoints::ldr(base, moved)
            } else {
                UnpackedEndpoints::ldr(blue_contract(moved), blue_contract(base))
            }
        }
        HdrLuminanceLargeRange => hdr_luminance_large_range(v),
        HdrLuminanceSmallRange => hdr_luminance_small_range(v),
        HdrRgbScale => hdr_rgb_scale(v),
        HdrRgb => {
            let (e0, e1) = hdr_rgb(v);
            UnpackedEndpoints::hdr(
                [e0[0], e0[1], e0[2], HDR_ALPHA_ONE],
                [e1[0], e1[1], e1[2], HDR_ALPHA_ONE],
                true,
            )
        }
        HdrRgbLdrAlpha => {
            let (e0, e1) = hdr_rgb(v);
            UnpackedEndpoints::hdr(
                [e0[0], e0[1], e0[2], v[6]],
                [e1[0], e1[1], e1[2], v[7]],
                false,
            )
        }
        HdrRgba => {
            let (e0, e1) = hdr_rgb(v);
            let (a0, a1) = hdr_alpha(v[6], v[7]);
            UnpackedEndpoints::hdr([e0[0], e0[1], e0[2], a0], [e1[0], e1[1], e1[2], a1], true)
        }
    }
}

/// Formats the encoder can produce, all LDR
pub const ENCODABLE_FORMATS: [EndpointFormat; 8] = [
    EndpointFormat::Luminance,
    EndpointFormat::LuminanceAlpha,
    EndpointFormat::RgbScale,
    EndpointFormat::Rgb,
    EndpointFormat::RgbDelta,
    EndpointFormat::RgbScaleAlpha,
    EndpointFormat::Rgba,
    EndpointFormat::RgbaDelta,
];

/// Alternative symbol sets for one endpoint pair in one format
pub type PackedCandidates = ArrayVec<ArrayVec<u8, 8>, 2>;

fn luminance(c: ColorF) -> f32 {
    c.rgb_sum() / 3.0
}

/// Nearest symbols for a list of target values
fn quantize_all(table: &ColorQuantTable, values: &[f32]) -> ArrayVec<u8, 8> {
    values.iter().map(|&v| table.quantize(v)).collect()
}

/// Symbols whose unquantized values form the delta encoding of `base` to `target`, if the
/// difference fits the 6 bit signed range
fn delta_pair(table: &ColorQuantTable, base: f32, target: f32) -> Option<(u8, u8)> {
    let base = base.round().clamp(0.0, 255.0) as i32;
    let delta = target.round() as i32 - base;
    if !(-32..=31).contains(&delta) {
        return None;
    }
    let v0 = (base & 0x7F) << 1;
    let v1 = ((delta & 0x3F) << 1) | (base & 0x80);
    Some((table.quantize(v0 as f32), table.quantize(v1 as f32)))
}

/// Unquantized integer for a symbol, as the decoder will see it
fn unq(table: &ColorQuantTable, symbol: u8) -> i32 {
    table.unquantize(symbol) as i32
}

/// Quantize the two RGB endpoints for the direct (non blue-contracted) encoding of formats 8
/// and 12, rounding apart if the nearest symbols would flip the endpoint order
fn direct_rgb(table: &ColorQuantTable, e0: ColorF, e1: ColorF) -> Option<[u8; 6]> {
    let interleave = |lo: [u8; 3], hi: [u8; 3]| [lo[0], hi[0], lo[1], hi[1], lo[2], hi[2]];
    let near = |c: ColorF| [0, 1, 2].map(|i| table.quantize(c[i]));
    let (lo, hi) = (near(e0), near(e1));
    let sum = |s: [u8; 3]| s.iter().map(|&x| unq(table, x)).sum::<i32>();
    if sum(hi) >= sum(lo) {
        return Some(interleave(lo, hi));
    }
    if e1.rgb_sum() < e0.rgb_sum() {
        return None;
    }
    let down = |c: ColorF| {
        [0, 1, 2].map(|i| {
            let v = c[i].floor() as i32;
            table.quantize_where(v, |u| (u as i32) <= v).unwrap_or(0)
        })
    };
    let up = |c: ColorF| {
        [0, 1, 2].map(|i| {
            let v = c[i].ceil() as i32;
            table.quantize_where(v, |u| (u as i32) >= v).unwrap_or(0)
        })
    };
    let (lo, hi) = (down(e0), up(e1));
    (sum(hi) >= sum(lo)).then(|| interleave(lo, hi))
}

/// Quantize the endpoints for the blue-contracted encoding of formats 8 and 12
fn contracted_rgb(table: &ColorQuantTable, e0: ColorF, e1: ColorF) -> Option<[u8; 6]> {
    let expand = |c: ColorF| [2.0 * c[0] - c[2], 2.0 * c[1] - c[2], c[2]];
    let (x0, x1) = (expand(e0), expand(e1));
    if x0.iter().chain(&x1).any(|&v| !(-0.5..=255.5).contains(&v)) {
        return None;
    }
    // e0 is carried by the odd integers, e1 by the even ones
    let odd = x0.map(|v| table.quantize(v));
    let even = x1.map(|v| table.quantize(v));
    let sum = |s: [u8; 3]| s.iter().map(|&x| unq(table, x)).sum::<i32>();
    (sum(odd) < sum(even)).then(|| [even[0], odd[0], even[1], odd[1], even[2], odd[2]])
}

/// Candidate color integers (as symbols of `table`) for endpoints `e0`, `e1` in `format`.
///
/// Endpoints are in 0..=255. Returns nothing when the format cannot express the pair, and
/// two candidates where there are two encodings worth comparing.
pub fn pack(format: EndpointFormat, e0: ColorF, e1: ColorF, table: &ColorQuantTable) -> PackedCandidates {
    use EndpointFormat::*;

    let mut candidates = PackedCandidates::new();
    match format {
        Luminance => {
            candidates.push(quantize_all(table, &[luminance(e0), luminance(e1)]));
        }
        LuminanceAlpha => {
            candidates.push(quantize_all(table, &[luminance(e0), luminance(e1), e0[3], e1[3]]));
        }
        RgbScale | RgbScaleAlpha => {
            // e0 becomes e1 scaled down along its own direction
            let rgb = ColorF::vec([1.0, 1.0, 1.0, 0.0]);
            let length_sq = (e1 * rgb).sqrmag();
            let projected = (e0 * e1).rgb_sum();
            let scale = if length_sq > 0.0 {
                (256.0 * projected / length_sq).clamp(0.0, 255.0)
            } else {
                255.0
            };
            let mut values = ArrayVec::<f32, 6>::from_iter([e1[0], e1[1], e1[2], scale]);
            if format == RgbScaleAlpha {
                values.extend([e0[3], e1[3]]);
            }
            candidates.push(quantize_all(table, &values));
        }
        Rgb | Rgba => {
            for rgb in [direct_rgb(table, e0, e1), contracted_rgb(table, e0, e1)]
                .into_iter()
                .flatten()
            {
                let mut symbols: ArrayVec<u8, 8> = rgb.into_iter().collect();
                if format == Rgba {
                    symbols.extend([table.quantize(e0[3]), table.quantize(e1[3])]);
                }
                candidates.push(symbols);
            }
        }
        RgbDelta | RgbaDelta => {
            let channels = if format == RgbaDelta { 4 } else { 3 };
            let pairs: Option<ArrayVec<(u8, u8), 4>> =
                (0..channels).map(|c| delta_pair(table, e0[c], e1[c])).collect();
            if let Some(pairs) = pairs {
                let symbols: ArrayVec<u8, 8> = pairs.iter().flat_map(|&(a, b)| [a, b]).collect();
                candidates.push(symbols);
            }
        }
        _ => {}
    }
    candidates
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::astc::quant::QuantLevel;

    fn decode(format: EndpointFormat, table: &ColorQuantTable, symbols: &[u8]) -> UnpackedEndpoints {
        let values: Vec<i32> = symbols.iter().map(|&s| unq(table, s)).collect();
        unpack(format, &values)
    }

    #[test]
    fn ldr_formats_decode_like_the_reference() {
        use EndpointFormat::*;
        let l = unpack(Luminance, &[10, 200]);
        assert_eq!(l.e0, [10, 10, 10, 255]);
        assert_eq!(l.e1, [200, 200, 200, 255]);

        let scale = unpack(RgbScale, &[200, 100, 50, 128]);
        assert_eq!(scale.e0, [100, 50, 25, 255]);

        // the odd sum is smaller: blue contraction with swapped endpoints
        let contracted = unpack(Rgb, &[100, 10, 100, 10, 50, 20]);
        assert_eq!(contracted.e0, [15, 15, 20, 255]);
        assert_eq!(contracted.e1, [75, 75, 50, 255]);

        let delta = unpack(LuminanceDelta, &[0xFF, 0xFF]);
        assert_eq!(delta.e0, [0xFF, 0xFF, 0xFF, 255]);
        assert!(!delta.is_hdr());
    }

    #[test]
    fn bit_transfer_moves_the_sign() {
        // delta of -1 on a base of 128
        let (delta, base) = bit_transfer_signed(0xFE, 0x00);
        assert_eq!(delta, -1);
        assert_eq!(base, 0x80);
    }

    #[test]
    fn hdr_formats_are_flagged() {
        let v = [40, 200, 30, 90, 12, 140, 250, 3];
        for format in [
            EndpointFormat::HdrLuminanceLargeRange,
            EndpointFormat::HdrLuminanceSmallRange,
            EndpointFormat::HdrRgbScale,
            EndpointFormat::HdrRgb,
            EndpointFormat::HdrRgbLdrAlpha,
            EndpointFormat::HdrRgba,
        ] {
            let unpacked = unpack(format, &v);
            assert!(unpacked.rgb_hdr, "{format:?}");
            assert!(unpacked.e0.iter().chain(&unpacked.e1).all(|c| (0..=0xFFFF).contains(c)));
        }
        let large = unpack(EndpointFormat::HdrLuminanceLargeRange, &[1, 2]);
        assert_eq!(large.e0[0], 1 << 8);
        assert_eq!(large.e1[0], 2 << 8);
        assert_eq!(large.e0[3], HDR_ALPHA_ONE);
    }

    const ONE: i32 = HDR_ALPHA_ONE;

    #[rstest]
    #[case::large_range_swapped(EndpointFormat::HdrLuminanceLargeRange, &[200, 100], [25728, 25728, 25728, ONE], [51072, 51072, 51072, ONE])]
    #[case::small_range_wide_delta(EndpointFormat::HdrLuminanceSmallRange, &[0x85, 0x2A], [0x2140, 0x2140, 0x2140, ONE], [0x23C0, 0x23C0, 0x23C0, ONE])]
    #[case::small_range_narrow_delta(EndpointFormat::HdrLuminanceSmallRange, &[0x10, 0xFF], [0xF200, 0xF200, 0xF200, ONE], [0xF3E0, 0xF3E0, 0xF3E0, ONE])]
    #[case::small_range_saturates(EndpointFormat::HdrLuminanceSmallRange, &[0xFF, 0xFF], [0xFFC0, 0xFFC0, 0xFFC0, ONE], [0xFFF0, 0xFFF0, 0xFFF0, ONE])]
    #[case::rgb_scale_mode5(EndpointFormat::HdrRgbScale, &[0xD0, 0xC5, 0xA3, 0x44], [0, 512, 0, ONE], [8192, 35328, 17920, ONE])]
    #[case::rgb_scale_mode0_blue_major(EndpointFormat::HdrRgbScale, &[0x25, 0x63, 0xC1, 0xA2], [30784, 30720, 30816, ONE], [31872, 31808, 31904, ONE])]
    #[case::rgb_mode0(EndpointFormat::HdrRgb, &[100, 0x45, 0x23, 0x11, 0x03, 0x02], [44928, 40064, 42496, ONE], [45568, 41088, 43392, ONE])]
    #[case::rgb_negative_delta_green_major(EndpointFormat::HdrRgb, &[100, 0x45, 0x23, 0x11, 0xFF, 0x02], [40576, 44928, 42496, ONE], [41088, 45568, 43392, ONE])]
    #[case::rgb_direct(EndpointFormat::HdrRgb, &[0x12, 0x34, 0x56, 0x78, 0x85, 0x8A], [0x1200, 0x5600, 0x0A00, ONE], [0x3400, 0x7800, 0x1400, ONE])]
    #[case::ldr_alpha(EndpointFormat::HdrRgbLdrAlpha, &[100, 0x45, 0x23, 0x11, 0x03, 0x02, 10, 250], [44928, 40064, 42496, 10], [45568, 41088, 43392, 250])]
    #[case::alpha_direct(EndpointFormat::HdrRgba, &[100, 0x45, 0x23, 0x11, 0x03, 0x02, 0x85, 0x8A], [44928, 40064, 42496, 2560], [45568, 41088, 43392, 5120])]
    #[case::alpha_negative_delta(EndpointFormat::HdrRgba, &[100, 0x45, 0x23, 0x11, 0x03, 0x02, 0x05, 0x3F], [44928, 40064, 42496, 1280], [45568, 41088, 43392, 1024])]
    #[case::alpha_high_bits(EndpointFormat::HdrRgba, &[100, 0x45, 0x23, 0x11, 0x03, 0x02, 0x92, 0x25], [44928, 40064, 42496, 18688], [45568, 41088, 43392, 19328])]
    fn hdr_endpoints_unpack_to_known_values(
        #[case] format: EndpointFormat,
        #[case] v: &[i32],
        #[case] e0: [i32; 4],
        #[case] e1: [i32; 4],
    ) {
        let unpacked = unpack(format, v);
        assert_eq!(unpacked.e0, e0, "{format:?}");
        assert_eq!(unpacked.e1, e1, "{format:?}");
        assert!(unpacked.rgb_hdr);
        assert_eq!(unpacked.alpha_hdr, format != EndpointFormat::HdrRgbLdrAlpha);
    }

    #[test]
    fn packing_reproduces_endpoints_at_full_precision() {
        let table = ColorQuantTable::new(QuantLevel::Quant256);
        let e0 = ColorF::vec([20.0, 40.0, 60.0, 255.0]);
        let e1 = ColorF::vec([200.0, 180.0, 160.0, 100.0]);

        for format in [EndpointFormat::Rgb, EndpointFormat::Rgba] {
            let candidates = pack(format, e0, e1, &table);
            assert!(!candidates.is_empty());
            let decoded = decode(format, &table, &candidates[0]);
            assert_eq!(&decoded.e0[..3], &[20, 40, 60]);
            assert_eq!(&decoded.e1[..3], &[200, 180, 160]);
        }

        let rgba = pack(EndpointFormat::Rgba, e0, e1, &table);
        assert_eq!(decode(EndpointFormat::Rgba, &table, &rgba[0]).e1[3], 100);

        let near0 = ColorF::vec([100.0, 100.0, 100.0, 255.0]);
        let near1 = ColorF::vec([110.0, 95.0, 120.0, 255.0]);
        let delta = pack(EndpointFormat::RgbDelta, near0, near1, &table);
        let decoded = decode(EndpointFormat::RgbDelta, &table, &delta[0]);
        assert_eq!(decoded.e0, [100, 100, 100, 255]);
        assert_eq!(decoded.e1, [110, 95, 120, 255]);

        let far = pack(EndpointFormat::RgbDelta, e0, e1, &table);
        assert!(far.is_empty());
    }

    #[test]
    fn packing_keeps_direct_order_when_quantized() {
        let table = ColorQuantTable::new(QuantLevel::Quant6);
        // nearly equal sums that round the wrong way
        let e0 = ColorF::vec([120.0, 30.0, 30.0, 255.0]);
        let e1 = ColorF::vec([30.0, 125.0, 30.0, 255.0]);
        for symbols in pack(EndpointFormat::Rgb, e0, e1, &table) {
            let decoded = decode(EndpointFormat::Rgb, &table, &symbols);
            assert!(decoded.e0.iter().chain(&decoded.e1).all(|c| (0..=255).contains(c)));
        }
    }
}
