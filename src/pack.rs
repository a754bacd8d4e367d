// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::iter::{zip, Map};

use bitvec::field::BitField;
use bitvec::prelude::*;
use funty::Integral;

/// Bit order used by ASTC: bit 0 is the least significant bit of byte 0
pub type BlockBits = BitSlice<u8, Lsb0>;

pub trait Pack: IntoIterator {
    fn pack_le<V: Integral, U: IntoIterator<Item = V>>(self, unpacked: U);
}

impl<'a, T: BitStore, O: BitOrder, I> Pack for I
where
    I: IntoIterator<Item = &'a mut BitSlice<T, O>>,
    BitSlice<T, O>: BitField,
{
    fn pack_le<V: Integral, U: IntoIterator<Item = V>>(self, unpacked: U) {
        for (src, dst) in zip(unpacked, self) {
            debug_assert!(
                (dst.len() as u32) >= V::BITS - src.leading_zeros(),
                "Input value {:X} cannot be packed into {} bits",
                src,
                dst.len()
            );
            dst.store_le(src);
        }
    }
}

pub trait Unpack: IntoIterator + Sized {
    fn unpack_le<V: Integral>(
        self,
    ) -> Map<<Self as IntoIterator>::IntoIter, fn(<Self as IntoIterator>::Item) -> V>;
}

impl<'a, T: BitStore, O: BitOrder, I> Unpack for I
where
    I: IntoIterator<Item = &'a BitSlice<T, O>>,
    BitSlice<T, O>: BitField,
{
    fn unpack_le<V: Integral>(
        self,
    ) -> Map<<Self as IntoIterator>::IntoIter, fn(<Self as IntoIterator>::Item) -> V> {
        self.into_iter().map(|b| b.load_le())
    }
}

/// Sequential writer of little-endian bit fields into a block.
///
/// Writes past the end of the window are truncated, which is how integer sequences
/// with a partial final group are cut to their exact bit count.
pub struct BitWriter<'a> {
    bits: &'a mut BlockBits,
    pos: usize,
}

impl<'a> BitWriter<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self {
            bits: bytes.view_bits_mut::<Lsb0>(),
            pos: 0,
        }
    }

    /// A writer over the bit range `start..end` of `bytes`
    pub fn window(bytes: &'a mut [u8], start: usize, end: usize) -> Self {
        Self {
            bits: &mut bytes.view_bits_mut::<Lsb0>()[start..end],
            pos: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn write<V: Integral>(&mut self, value: V, count: usize) {
        let end = usize::min(self.pos + count, self.bits.len());
        if end > self.pos {
            let width = end - self.pos;
            // only the low `width` bits of the value survive truncation
            let mask = if width >= V::BITS as usize {
                !V::ZERO
            } else {
                (V::ONE << width as u32) - V::ONE
            };
            self.bits[self.pos..end].store_le(value & mask);
        }
        self.pos += count;
    }
}

/// Sequential reader of little-endian bit fields from a block.
/// Reads past the end of the window yield zeroes.
pub struct BitReader<'a> {
    bits: &'a BlockBits,
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bits: bytes.view_bits::<Lsb0>(),
            pos: 0,
        }
    }

    /// A reader over the bit range `start..end` of `bytes`
    pub fn window(bytes: &'a [u8], start: usize, end: usize) -> Self {
        Self {
            bits: &bytes.view_bits::<Lsb0>()[start..end],
            pos: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn read<V: Integral>(&mut self, count: usize) -> V {
        let start = usize::min(self.pos, self.bits.len());
        let end = usize::min(self.pos + count, self.bits.len());
        self.pos += count;
        if end > start {
            self.bits[start..end].load_le()
        } else {
            V::ZERO
        }
    }
}

/// Reverse the bit order of a whole block, as used by the weight data which grows
/// downward from bit 127
pub fn reverse_bits(bytes: &[u8; 16]) -> [u8; 16] {
    u128::from_le_bytes(*bytes).reverse_bits().to_le_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_and_reads_unaligned_fields() {
        let mut bytes = [0u8; 16];
        let mut writer = BitWriter::new(&mut bytes);
        writer.write(0x5u8, 3);
        writer.write(0x1FCu16, 11);
        writer.write(0xABCDu16, 16);
        assert_eq!(writer.position(), 30);

        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read::<u8>(3), 0x5);
        assert_eq!(reader.read::<u16>(11), 0x1FC);
        assert_eq!(reader.read::<u16>(16), 0xABCD);
        assert_eq!(reader.read::<u8>(0), 0);
    }

    #[test]
    fn window_truncates_and_zero_fills() {
        let mut bytes = [0u8; 16];
        let mut writer = BitWriter::window(&mut bytes, 4, 8);
        writer.write(0xFFu8, 8);
        assert_eq!(bytes[0], 0xF0);

        let mut reader = BitReader::window(&bytes, 4, 8);
        assert_eq!(reader.read::<u8>(6), 0x0F);
        assert_eq!(reader.read::<u8>(4), 0);
    }

    #[test]
    fn packs_fixed_width_fields() {
        let mut bytes = [0u8; 8];
        bytes
            .view_bits_mut::<Lsb0>()
            .chunks_mut(16)
            .pack_le([0x1234u16, 0xFFFF, 0, 0x8000]);
        let unpacked: Vec<u16> = bytes.view_bits::<Lsb0>().chunks(16).unpack_le().collect();
        assert_eq!(unpacked, [0x1234, 0xFFFF, 0, 0x8000]);
    }

    #[test]
    fn reverses_whole_block() {
        let mut bytes = [0u8; 16];
        bytes[0] = 0b0000_0001;
        let reversed = reverse_bits(&bytes);
        assert_eq!(reversed[15], 0b1000_0000);
        assert_eq!(reverse_bits(&reversed), bytes);
    }
}
