// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integer sequence encoding.
//!
//! Values of a trit level are packed five at a time: the low bits of each value are
//! interleaved with the 8 bits that encode the five trits together. Quint levels pack three
//! values with 7 bits. A partial final group stops right after the bits of its last value,
//! so sequences take exactly [`QuantLevel::bitcount`] bits.

use crate::astc::quant::{IseKind, QuantLevel};
use crate::pack::{BitReader, BitWriter};

/// Bit widths of the packed trit block interleaved after each value
const TRIT_SPLITS: [usize; 5] = [2, 2, 1, 2, 1];
/// Bit widths of the packed quint block interleaved after each value
const QUINT_SPLITS: [usize; 3] = [3, 2, 2];

/// Packed trit block for every combination of 5 trits, indexed by `t0 + 3 t1 + 9 t2 + ...`
static TRIT_ENCODE_LUT: [u8; 243] = [
    0x00, 0x01, 0x02, 0x04, 0x05, 0x06, 0x08, 0x09, 0x0A, 0x10, 0x11, 0x12, 0x14, 0x15, 0x16, 0x18,
    0x19, 0x1A, 0x03, 0x07, 0x0B, 0x13, 0x17, 0x1B, 0x0C, 0x0D, 0x0E, 0x20, 0x21, 0x22, 0x24, 0x25,
    0x26, 0x28, 0x29, 0x2A, 0x30, 0x31, 0x32, 0x34, 0x35, 0x36, 0x38, 0x39, 0x3A, 0x23, 0x27, 0x2B,
    0x33, 0x37, 0x3B, 0x2C, 0x2D, 0x2E, 0x40, 0x41, 0x42, 0x44, 0x45, 0x46, 0x48, 0x49, 0x4A, 0x50,
    0x51, 0x52, 0x54, 0x55, 0x56, 0x58, 0x59, 0x5A, 0x43, 0x47, 0x4B, 0x53, 0x57, 0x5B, 0x4C, 0x4D,
    0x4E, 0x80, 0x81, 0x82, 0x84, 0x85, 0x86, 0x88, 0x89, 0x8A, 0x90, 0x91, 0x92, 0x94, 0x95, 0x96,
    0x98, 0x99, 0x9A, 0x83, 0x87, 0x8B, 0x93, 0x97, 0x9B, 0x8C, 0x8D, 0x8E, 0xA0, 0xA1, 0xA2, 0xA4,
    0xA5, 0xA6, 0xA8, 0xA9, 0xAA, 0xB0, 0xB1, 0xB2, 0xB4, 0xB5, 0xB6, 0xB8, 0xB9, 0xBA, 0xA3, 0xA7,
    0xAB, 0xB3, 0xB7, 0xBB, 0xAC, 0xAD, 0xAE, 0xC0, 0xC1, 0xC2, 0xC4, 0xC5, 0xC6, 0xC8, 0xC9, 0xCA,
    0xD0, 0xD1, 0xD2, 0xD4, 0xD5, 0xD6, 0xD8, 0xD9, 0xDA, 0xC3, 0xC7, 0xCB, 0xD3, 0xD7, 0xDB, 0xCC,
    0xCD, 0xCE, 0x60, 0x61, 0x62, 0x64, 0x65, 0x66, 0x68, 0x69, 0x6A, 0x70, 0x71, 0x72, 0x74, 0x75,
    0x76, 0x78, 0x79, 0x7A, 0x63, 0x67, 0x6B, 0x73, 0x77, 0x7B, 0x6C, 0x6D, 0x6E, 0xE0, 0xE1, 0xE2,
    0xE4, 0xE5, 0xE6, 0xE8, 0xE9, 0xEA, 0xF0, 0xF1, 0xF2, 0xF4, 0xF5, 0xF6, 0xF8, 0xF9, 0xFA, 0xE3,
    0xE7, 0xEB, 0xF3, 0xF7, 0xFB, 0xEC, 0xED, 0xEE, 0x1C, 0x1D, 0x1E, 0x3C, 0x3D, 0x3E, 0x5C, 0x5D,
    0x5E, 0x9C, 0x9D, 0x9E, 0xBC, 0xBD, 0xBE, 0xDC, 0xDD, 0xDE, 0x1F, 0x3F, 0x5F, 0x9F, 0xBF, 0xDF,
    0x7C, 0x7D, 0x7E,
];

/// Packed quint block for every combination of 3 quints, indexed by `q0 + 5 q1 + 25 q2`
static QUINT_ENCODE_LUT: [u8; 125] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x10, 0x11, 0x12, 0x13, 0x14, 0x18,
    0x19, 0x1A, 0x1B, 0x1C, 0x05, 0x0D, 0x15, 0x1D, 0x06, 0x20, 0x21, 0x22, 0x23, 0x24, 0x28, 0x29,
    0x2A, 0x2B, 0x2C, 0x30, 0x31, 0x32, 0x33, 0x34, 0x38, 0x39, 0x3A, 0x3B, 0x3C, 0x25, 0x2D, 0x35,
    0x3D, 0x0E, 0x40, 0x41, 0x42, 0x43, 0x44, 0x48, 0x49, 0x4A, 0x4B, 0x4C, 0x50, 0x51, 0x52, 0x53,
    0x54, 0x58, 0x59, 0x5A, 0x5B, 0x5C, 0x45, 0x4D, 0x55, 0x5D, 0x16, 0x60, 0x61, 0x62, 0x63, 0x64,
    0x68, 0x69, 0x6A, 0x6B, 0x6C, 0x70, 0x71, 0x72, 0x73, 0x74, 0x78, 0x79, 0x7A, 0x7B, 0x7C, 0x65,
    0x6D, 0x75, 0x7D, 0x1E, 0x66, 0x67, 0x46, 0x47, 0x26, 0x6E, 0x6F, 0x4E, 0x4F, 0x2E, 0x76, 0x77,
    0x56, 0x57, 0x36, 0x7E, 0x7F, 0x5E, 0x5F, 0x3E, 0x27, 0x2F, 0x37, 0x3F, 0x1F,
];

#[inline]
fn bit(value: u32, index: u32) -> u32 {
    (value >> index) & 1
}

#[inline]
fn bits(value: u32, low: u32, high: u32) -> u32 {
    (value >> low) & ((1 << (high - low + 1)) - 1)
}

/// Split a packed trit block into its five trits
pub fn unpack_trits(packed: u8) -> [u8; 5] {
    let t = packed as u32;
    let mut trits = [0u32; 5];

    let c = if bits(t, 2, 4) == 7 {
        trits[3] = 2;
        trits[4] = 2;
        (bits(t, 5, 7) << 2) | bits(t, 0, 1)
    } else {
        if bits(t, 5, 6) == 3 {
            trits[4] = 2;
            trits[3] = bit(t, 7);
        } else {
            trits[4] = bit(t, 7);
            trits[3] = bits(t, 5, 6);
        }
        bits(t, 0, 4)
    };

    if bits(c, 0, 1) == 3 {
        trits[2] = 2;
        trits[1] = bit(c, 4);
        trits[0] = (bit(c, 3) << 1) | (bit(c, 2) & !bit(c, 3) & 1);
    } else if bits(c, 2, 3) == 3 {
        trits[2] = 2;
        trits[1] = 2;
        trits[0] = bits(c, 0, 1);
    } else {
        trits[2] = bit(c, 4);
        trits[1] = bits(c, 2, 3);
        trits[0] = (bit(c, 1) << 1) | (bit(c, 0) & !bit(c, 1) & 1);
    }

    trits.map(|t| t as u8)
}

/// Split a packed quint block into its three quints
pub fn unpack_quints(packed: u8) -> [u8; 3] {
    let q = packed as u32;
    let mut quints = [0u32; 3];

    if bits(q, 1, 2) == 3 && bits(q, 5, 6) == 0 {
        quints[0] = 4;
        quints[1] = 4;
        quints[2] = (bit(q, 0) << 2)
            | ((bit(q, 4) & !bit(q, 0) & 1) << 1)
            | (bit(q, 3) & !bit(q, 0) & 1);
    } else {
        let c = if bits(q, 1, 2) == 3 {
            quints[2] = 4;
            (bits(q, 3, 4) << 3) | ((!bits(q, 5, 6) & 3) << 1) | bit(q, 0)
        } else {
            quints[2] = bits(q, 5, 6);
            bits(q, 0, 4)
        };

        if bits(c, 0, 2) == 5 {
            quints[1] = 4;
            quints[0] = bits(c, 3, 4);
        } else {
            quints[1] = bits(c, 3, 4);
            quints[0] = bits(c, 0, 2);
        }
    }

    quints.map(|q| q as u8)
}

/// Write `values` (ISE symbols of `level`) to `writer`
pub fn encode(writer: &mut BitWriter, level: QuantLevel, values: &[u8]) {
    let encoding = level.encoding();
    let nbits = encoding.bits as usize;
    let mask = ((1u32 << encoding.bits) - 1) as u8;

    match encoding.kind {
        IseKind::Bits => {
            for &value in values {
                writer.write(value, nbits);
            }
        }
        IseKind::Trits => {
            for chunk in values.chunks(5) {
                let index = chunk
                    .iter()
                    .rev()
                    .fold(0usize, |acc, &v| acc * 3 + (v >> nbits) as usize);
                let packed = TRIT_ENCODE_LUT[index] as u32;
                let mut shift = 0;
                for (&value, split) in chunk.iter().zip(TRIT_SPLITS) {
                    writer.write(value & mask, nbits);
                    writer.write((packed >> shift) & ((1 << split) - 1), split);
                    shift += split;
                }
            }
        }
        IseKind::Quints => {
            for chunk in values.chunks(3) {
                let index = chunk
                    .iter()
                    .rev()
                    .fold(0usize, |acc, &v| acc * 5 + (v >> nbits) as usize);
                let packed = QUINT_ENCODE_LUT[index] as u32;
                let mut shift = 0;
                for (&value, split) in chunk.iter().zip(QUINT_SPLITS) {
                    writer.write(value & mask, nbits);
                    writer.write((packed >> shift) & ((1 << split) - 1), split);
                    shift += split;
                }
            }
        }
    }
}

/// Read `out.len()` ISE symbols of `level` from `reader`.
///
/// Packed trit or quint bits belonging to values past the end of the sequence are taken as
/// zero, matching what [`encode`] leaves out.
pub fn decode(reader: &mut BitReader, level: QuantLevel, out: &mut [u8]) {
    let encoding = level.encoding();
    let nbits = encoding.bits as usize;

    match encoding.kind {
        IseKind::Bits => {
            for value in out.iter_mut() {
                *value = reader.read(nbits);
            }
        }
        IseKind::Trits => {
            for chunk in out.chunks_mut(5) {
                let mut low = [0u8; 5];
                let mut packed = 0u32;
                let mut shift = 0;
                for (m, split) in low.iter_mut().zip(TRIT_SPLITS).take(chunk.len()) {
                    *m = reader.read(nbits);
                    packed |= reader.read::<u32>(split) << shift;
                    shift += split;
                }
                let trits = unpack_trits(packed as u8);
                for ((value, m), t) in chunk.iter_mut().zip(low).zip(trits) {
                    *value = (t << nbits) | m;
                }
            }
        }
        IseKind::Quints => {
            for chunk in out.chunks_mut(3) {
                let mut low = [0u8; 3];
                let mut packed = 0u32;
                let mut shift = 0;
                for (m, split) in low.iter_mut().zip(QUINT_SPLITS).take(chunk.len()) {
                    *m = reader.read(nbits);
                    packed |= reader.read::<u32>(split) << shift;
                    shift += split;
                }
                let quints = unpack_quints(packed as u8);
                for ((value, m), q) in chunk.iter_mut().zip(low).zip(quints) {
                    *value = (q << nbits) | m;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn every_trit_combination_unpacks() {
        for index in 0..243usize {
            let expected: [u8; 5] = std::array::from_fn(|i| ((index / 3usize.pow(i as u32)) % 3) as u8);
            assert_eq!(unpack_trits(TRIT_ENCODE_LUT[index]), expected, "index {index}");
        }
    }

    #[test]
    fn every_quint_combination_unpacks() {
        for index in 0..125usize {
            let expected: [u8; 3] = std::array::from_fn(|i| ((index / 5usize.pow(i as u32)) % 5) as u8);
            assert_eq!(unpack_quints(QUINT_ENCODE_LUT[index]), expected, "index {index}");
        }
    }

    #[rstest]
    #[case(QuantLevel::Quant3, 1)]
    #[case(QuantLevel::Quant3, 4)]
    #[case(QuantLevel::Quant12, 7)]
    #[case(QuantLevel::Quant5, 2)]
    #[case(QuantLevel::Quant20, 13)]
    #[case(QuantLevel::Quant32, 9)]
    #[case(QuantLevel::Quant192, 8)]
    fn sequences_use_exact_bitcount(#[case] level: QuantLevel, #[case] count: usize) {
        // the largest symbols exercise every packed bit
        let values: Vec<u8> = (0..count)
            .map(|i| ((level.values() as usize - 1 - i % 3) % level.values() as usize) as u8)
            .collect();
        let expected_bits = level.bitcount(count);

        let mut bytes = [0u8; 16];
        let mut writer = BitWriter::new(&mut bytes);
        encode(&mut writer, level, &values);
        assert_eq!(writer.position(), expected_bits);

        // nothing may land past the exact bit count
        let tail = u128::from_le_bytes(bytes) >> expected_bits;
        assert_eq!(tail, 0);

        let mut reader = BitReader::window(&bytes, 0, expected_bits);
        let mut decoded = vec![0u8; count];
        decode(&mut reader, level, &mut decoded);
        assert_eq!(decoded, values);
        assert_eq!(reader.position(), expected_bits);
    }

    #[test]
    fn decoding_stops_at_sequence_end() {
        // garbage right after a partial trit group must not leak into the values
        let mut bytes = [0xFFu8; 16];
        let level = QuantLevel::Quant6;
        let bits = level.bitcount(2);
        {
            let mut writer = BitWriter::window(&mut bytes, 0, bits);
            encode(&mut writer, level, &[0, 5]);
        }
        let mut reader = BitReader::new(&bytes);
        let mut decoded = [0u8; 2];
        decode(&mut reader, level, &mut decoded);
        assert_eq!(decoded, [0, 5]);
    }
}
