//! Shares of bit vectors.
use crate::bit_vector::BitVector;

/// One party's share of a bit vector.
///
/// A `Plain` share holds a public value which is identical on both parties. A `Secret`
/// share holds this party's XOR share, the shared value is the XOR of both parties'
/// shares.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShareVector {
    Plain(BitVector),
    Secret(BitVector),
}

impl ShareVector {
    pub fn plain(bits: BitVector) -> Self {
        Self::Plain(bits)
    }

    pub fn secret(bits: BitVector) -> Self {
        Self::Secret(bits)
    }

    pub fn plain_zeros(bit_num: usize) -> Self {
        Self::Plain(BitVector::zeros(bit_num))
    }

    pub fn plain_ones(bit_num: usize) -> Self {
        Self::Plain(BitVector::ones(bit_num))
    }

    pub fn len(&self) -> usize {
        self.bits().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits().is_empty()
    }

    pub fn is_plain(&self) -> bool {
        matches!(self, Self::Plain(_))
    }

    pub fn is_secret(&self) -> bool {
        matches!(self, Self::Secret(_))
    }

    /// The plain value or this party's share.
    pub fn bits(&self) -> &BitVector {
        match self {
            Self::Plain(bits) | Self::Secret(bits) => bits,
        }
    }

    pub fn into_bits(self) -> BitVector {
        match self {
            Self::Plain(bits) | Self::Secret(bits) => bits,
        }
    }
}
