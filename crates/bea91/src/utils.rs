use bitvec::order::Lsb0;
use bitvec::vec::BitVec;
use rand::{CryptoRng, Rng};
use std::array;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Helper method to quickly create an array of random BitVecs.
pub(crate) fn rand_bitvecs<R: CryptoRng + Rng, const N: usize>(
    size: usize,
    rng: &mut R,
) -> [BitVec<u8, Lsb0>; N] {
    array::from_fn(|_| rand_bitvec(size, rng))
}

pub(crate) fn rand_bitvec<R: CryptoRng + Rng>(size: usize, rng: &mut R) -> BitVec<u8, Lsb0> {
    let mut buf = vec![0_u8; size.div_ceil(8)];
    rng.fill(&mut buf[..]);
    let mut bv = BitVec::from_vec(buf);
    bv.truncate(size);
    bv.set_uninitialized(false);
    bv
}

/// Element wise operations on the underlying storage. Only correct for vectors of equal
/// length which start at the beginning of their storage.
pub(crate) trait BitVecExt: Sized {
    fn fast_bit_xor_mut(&mut self, other: &Self) -> &mut Self;
    fn fast_bit_and_mut(&mut self, other: &Self) -> &mut Self;
}

impl BitVecExt for BitVec<u8, Lsb0> {
    fn fast_bit_xor_mut(&mut self, other: &Self) -> &mut Self {
        self.as_raw_mut_slice()
            .iter_mut()
            .zip(other.as_raw_slice())
            .for_each(|(a, b)| {
                *a ^= *b;
            });
        self
    }

    fn fast_bit_and_mut(&mut self, other: &Self) -> &mut Self {
        self.as_raw_mut_slice()
            .iter_mut()
            .zip(other.as_raw_slice())
            .for_each(|(a, b)| {
                *a &= *b;
            });
        self
    }
}

/// Wraps an [`MtProvider`](crate::mul_triple::MtProvider) and erases its error type.
pub struct ErasedError<I>(pub I);

#[derive(Debug)]
pub struct BoxError(pub Box<dyn Error + Send + Sync>);

impl BoxError {
    pub fn from_err<E: Error + Send + Sync + 'static>(err: E) -> Self {
        Self(Box::new(err))
    }
}

impl Display for BoxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl Error for BoxError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.0.source()
    }
}

impl From<Box<dyn Error + Send + Sync>> for BoxError {
    fn from(value: Box<dyn Error + Send + Sync>) -> Self {
        Self(value)
    }
}
