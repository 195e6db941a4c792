//! Packed bit vectors.
use crate::utils::{rand_bitvec, BitVecExt};
use bitvec::order::Lsb0;
use bitvec::slice::BitSlice;
use bitvec::vec::BitVec;
use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use thiserror::Error;

/// A sequence of `len` bits stored in `ceil(len / 8)` bytes.
///
/// Bit `i` is bit `i % 8` (least significant first) of byte `i / 8`. The padding bits of
/// the last byte are always zero. Binary operations require operands of equal length and
/// panic otherwise.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitVector {
    bits: BitVec<u8, Lsb0>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidLengthError {
    #[error("{bit_num} bits need {expected} bytes, got {actual}")]
    ByteLength {
        bit_num: usize,
        expected: usize,
        actual: usize,
    },
    #[error("padding bits after bit {bit_num} are not zero")]
    NonZeroPadding { bit_num: usize },
}

impl BitVector {
    pub fn zeros(bit_num: usize) -> Self {
        Self {
            bits: BitVec::repeat(false, bit_num),
        }
        .normalized()
    }

    pub fn ones(bit_num: usize) -> Self {
        Self {
            bits: BitVec::repeat(true, bit_num),
        }
        .normalized()
    }

    pub fn random<R: CryptoRng + Rng>(bit_num: usize, rng: &mut R) -> Self {
        Self::from_bitvec(rand_bitvec(bit_num, rng))
    }

    /// Create a bit vector from its packed representation.
    pub fn from_bytes(bit_num: usize, bytes: &[u8]) -> Result<Self, InvalidLengthError> {
        let expected = bit_num.div_ceil(8);
        if bytes.len() != expected {
            return Err(InvalidLengthError::ByteLength {
                bit_num,
                expected,
                actual: bytes.len(),
            });
        }
        let padding = bit_num % 8;
        if padding != 0 && bytes[expected - 1] >> padding != 0 {
            return Err(InvalidLengthError::NonZeroPadding { bit_num });
        }
        let mut bits = BitVec::from_vec(bytes.to_vec());
        bits.truncate(bit_num);
        Ok(Self { bits })
    }

    pub fn from_bitvec(bits: BitVec<u8, Lsb0>) -> Self {
        Self { bits }.normalized()
    }

    pub fn from_bits(bits: &BitSlice<u8, Lsb0>) -> Self {
        let mut owned = BitVec::with_capacity(bits.len());
        owned.extend_from_bitslice(bits);
        Self::from_bitvec(owned)
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn get(&self, idx: usize) -> bool {
        self.bits[idx]
    }

    pub fn set(&mut self, idx: usize, value: bool) {
        self.bits.set(idx, value);
    }

    pub fn as_bits(&self) -> &BitSlice<u8, Lsb0> {
        &self.bits
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.bits.as_raw_slice()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    pub fn into_bitvec(self) -> BitVec<u8, Lsb0> {
        self.bits
    }

    pub fn xor(&self, other: &Self) -> Self {
        let mut res = self.clone();
        res.xor_assign(other);
        res
    }

    pub fn and(&self, other: &Self) -> Self {
        let mut res = self.clone();
        res.and_assign(other);
        res
    }

    pub fn not(&self) -> Self {
        self.xor(&Self::ones(self.len()))
    }

    pub fn xor_assign(&mut self, other: &Self) {
        self.assert_same_len(other);
        self.bits.fast_bit_xor_mut(&other.bits);
    }

    pub fn and_assign(&mut self, other: &Self) {
        self.assert_same_len(other);
        self.bits.fast_bit_and_mut(&other.bits);
    }

    /// Split off the bits at `at..` into a new vector. `self` keeps the first `at` bits.
    ///
    /// # Panics
    /// If `at > self.len()`.
    pub fn split_off(&mut self, at: usize) -> Self {
        assert!(at <= self.len(), "split index {at} exceeds length {}", self.len());
        let tail = self.bits.split_off(at);
        self.bits.set_uninitialized(false);
        Self::from_bitvec(tail)
    }

    /// Split into consecutive vectors of the given lengths.
    ///
    /// # Panics
    /// If the lengths don't sum up to `self.len()`.
    pub fn split(self, lengths: &[usize]) -> Vec<Self> {
        assert_eq!(
            self.len(),
            lengths.iter().sum::<usize>(),
            "split lengths must sum up to the vector length"
        );
        let mut offset = 0;
        lengths
            .iter()
            .map(|&len| {
                let part = Self::from_bits(&self.bits[offset..offset + len]);
                offset += len;
                part
            })
            .collect()
    }

    /// Append the bits of `other`.
    pub fn merge(&mut self, other: &Self) {
        self.bits.extend_from_bitslice(&other.bits);
        self.bits.set_uninitialized(false);
    }

    /// Concatenate `vectors` in order.
    pub fn merge_all<'a>(vectors: impl IntoIterator<Item = &'a BitVector>) -> Self {
        let mut merged = BitVec::new();
        for vector in vectors {
            merged.extend_from_bitslice(&vector.bits);
        }
        Self::from_bitvec(merged)
    }

    /// Shrink to the first `bit_num` bits.
    ///
    /// # Panics
    /// If `bit_num > self.len()`.
    pub fn reduce(&mut self, bit_num: usize) {
        assert!(
            bit_num <= self.len(),
            "can't reduce vector of length {} to {bit_num}",
            self.len()
        );
        self.bits.truncate(bit_num);
        self.bits.set_uninitialized(false);
    }

    pub fn count_ones(&self) -> usize {
        self.bits.count_ones()
    }

    fn normalized(mut self) -> Self {
        self.bits.force_align();
        self.bits.set_uninitialized(false);
        self
    }

    fn assert_same_len(&self, other: &Self) {
        assert_eq!(
            self.len(),
            other.len(),
            "bit vectors must have equal length"
        );
    }
}

impl Debug for BitVector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "BitVector[")?;
        for bit in self.bits.iter().by_vals() {
            write!(f, "{}", bit as u8)?;
        }
        write!(f, "]")
    }
}

impl From<BitVec<u8, Lsb0>> for BitVector {
    fn from(bits: BitVec<u8, Lsb0>) -> Self {
        Self::from_bitvec(bits)
    }
}

impl FromIterator<bool> for BitVector {
    fn from_iter<T: IntoIterator<Item = bool>>(iter: T) -> Self {
        Self::from_bitvec(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{BitVector, InvalidLengthError};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn from_bytes_validates() {
        assert!(BitVector::from_bytes(12, &[0xff, 0x0f]).is_ok());
        assert_eq!(
            Err(InvalidLengthError::ByteLength {
                bit_num: 12,
                expected: 2,
                actual: 3
            }),
            BitVector::from_bytes(12, &[0, 0, 0])
        );
        assert_eq!(
            Err(InvalidLengthError::NonZeroPadding { bit_num: 12 }),
            BitVector::from_bytes(12, &[0, 0x10])
        );
        assert_eq!(0, BitVector::from_bytes(0, &[]).unwrap().len());
    }

    #[test]
    fn padding_stays_zero() {
        let ones = BitVector::ones(11);
        assert_eq!(&[0xff, 0x07], ones.as_bytes());
        assert_eq!(&[0, 0], BitVector::zeros(11).not().not().as_bytes());
        let mut rand = BitVector::random(13, &mut StdRng::seed_from_u64(3));
        assert_eq!(0, rand.as_bytes()[1] >> 5);
        rand.reduce(9);
        assert_eq!(2, rand.as_bytes().len());
        assert_eq!(0, rand.as_bytes()[1] >> 1);
    }

    #[test]
    fn xor_and_not() {
        let x = BitVector::from_bytes(4, &[0b1011]).unwrap();
        let y = BitVector::from_bytes(4, &[0b0110]).unwrap();
        assert_eq!(&[0b1101], x.xor(&y).as_bytes());
        assert_eq!(&[0b0010], x.and(&y).as_bytes());
        assert_eq!(&[0b0100], x.not().as_bytes());
    }

    #[test]
    #[should_panic(expected = "equal length")]
    fn length_mismatch_panics() {
        BitVector::zeros(3).xor(&BitVector::zeros(4));
    }

    #[test]
    fn split_and_merge() {
        let mut rng = StdRng::seed_from_u64(42);
        let parts: Vec<_> = [3, 0, 17, 8]
            .into_iter()
            .map(|len| BitVector::random(len, &mut rng))
            .collect();
        let merged = BitVector::merge_all(&parts);
        assert_eq!(28, merged.len());
        assert_eq!(parts, merged.clone().split(&[3, 0, 17, 8]));

        let mut head = merged.clone();
        let tail = head.split_off(5);
        assert_eq!(5, head.len());
        assert_eq!(23, tail.len());
        head.merge(&tail);
        assert_eq!(merged, head);
    }
}
