//! Boolean MTs and providers.
use crate::bit_vector::BitVector;
use crate::utils;
use bitvec::order::Lsb0;
use bitvec::vec::BitVec;
use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use std::mem;

pub mod dealer;
pub mod insecure_provider;
pub mod ot_ext;

pub use dealer::{DealerMtProvider, TrustedDealer};
pub use insecure_provider::InsecureMtProvider;
pub use ot_ext::{OtMtProvider, DEFAULT_MAX_BATCH_SIZE};

/// Efficient storage of multiple triples.
///
/// This struct is a container for multiple multiplication triples, where the components
/// are efficiently stored in [`BitVec`]s. A single multiplication triple takes up 3 bits
/// of storage.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct MulTriples {
    a: BitVec<u8, Lsb0>,
    b: BitVec<u8, Lsb0>,
    c: BitVec<u8, Lsb0>,
}

impl MulTriples {
    /// Create `size` multiplication triples where a,b,c are set to zero. Intended for testing
    /// purposes.
    pub fn zeros(size: usize) -> Self {
        let zeros = BitVec::repeat(false, size);
        Self {
            a: zeros.clone(),
            b: zeros.clone(),
            c: zeros,
        }
    }

    /// Create a random pair of multiplication triples `[(a1, b1, c1), (a2, b2, c2)]` where
    /// `c1 ^ c2 = (a1 ^ a2) & (b1 ^ b2)`.
    pub fn random_pair<R: CryptoRng + Rng>(size: usize, rng: &mut R) -> [Self; 2] {
        let [a1, a2, b1, b2, c1] = utils::rand_bitvecs(size, rng);
        let mts1 = Self::from_raw(a1, b1, c1);
        let c2 = compute_c(&mts1, &a2, &b2);
        let mts2 = Self::from_raw(a2, b2, c2);
        [mts1, mts2]
    }

    /// Construct multiplication triples from their components.
    ///
    /// # Panics
    /// Panics if the provided bitvectors don't have an equal length.
    pub fn from_raw(a: BitVec<u8, Lsb0>, b: BitVec<u8, Lsb0>, c: BitVec<u8, Lsb0>) -> Self {
        assert_eq!(a.len(), b.len());
        assert_eq!(b.len(), c.len());
        Self { a, b, c }
    }

    /// Return the amount of multiplication triples.
    pub fn len(&self) -> usize {
        self.a.len()
    }

    /// Returns true if there are no multiplication triples stored.
    pub fn is_empty(&self) -> bool {
        self.a.is_empty()
    }

    /// Provides an iterator over the multiplication triples in the form of [`MulTriple`]s.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = MulTriple> + '_ {
        self.a
            .iter()
            .by_vals()
            .zip(self.b.iter().by_vals())
            .zip(self.c.iter().by_vals())
            .map(|((a, b), c)| MulTriple { a, b, c })
    }

    /// Split off the first `count` triples. `self` keeps the remaining ones.
    ///
    /// # Panics
    /// If `count > self.len()`.
    pub fn split_off_first(&mut self, count: usize) -> Self {
        assert!(count <= self.len(), "not enough triples stored");
        let a = split_off_first(&mut self.a, count);
        let b = split_off_first(&mut self.b, count);
        let c = split_off_first(&mut self.c, count);
        Self { a, b, c }
    }

    pub fn append(&mut self, mut other: Self) {
        self.a.append(&mut other.a);
        self.b.append(&mut other.b);
        self.c.append(&mut other.c);
    }

    pub fn a(&self) -> &BitVec<u8, Lsb0> {
        &self.a
    }

    pub fn b(&self) -> &BitVec<u8, Lsb0> {
        &self.b
    }

    pub fn c(&self) -> &BitVec<u8, Lsb0> {
        &self.c
    }

    /// The components `(a, b, c)` as [`BitVector`]s.
    pub fn into_vectors(self) -> (BitVector, BitVector, BitVector) {
        (
            BitVector::from_bitvec(self.a),
            BitVector::from_bitvec(self.b),
            BitVector::from_bitvec(self.c),
        )
    }
}

fn split_off_first(bits: &mut BitVec<u8, Lsb0>, count: usize) -> BitVec<u8, Lsb0> {
    let rest = bits.split_off(count);
    mem::replace(bits, rest)
}

fn compute_c(
    mts: &MulTriples,
    a: &BitVec<u8, Lsb0>,
    b: &BitVec<u8, Lsb0>,
) -> BitVec<u8, Lsb0> {
    (a.clone() ^ &mts.a) & (b.clone() ^ &mts.b) ^ &mts.c
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
/// A single multiplication triple.
pub struct MulTriple {
    a: bool,
    b: bool,
    c: bool,
}

impl MulTriple {
    pub fn a(&self) -> bool {
        self.a
    }

    pub fn b(&self) -> bool {
        self.b
    }

    pub fn c(&self) -> bool {
        self.c
    }
}

#[cfg(test)]
mod tests {
    use crate::mul_triple::boolean::MulTriples;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn random_triple() {
        let [p1, p2] = MulTriples::random_pair(512, &mut StdRng::seed_from_u64(42));
        let left = p1.c.clone() ^ &p2.c;
        let right = (p1.a.clone() ^ &p2.a) & (p1.b.clone() ^ &p2.b);
        assert_eq!(left, right);
        for (t1, t2) in p1.iter().zip(p2.iter()) {
            assert_eq!(t1.c() ^ t2.c(), (t1.a() ^ t2.a()) & (t1.b() ^ t2.b()));
        }
    }

    #[test]
    fn split_off_first_keeps_order() {
        let [mut mts, _] = MulTriples::random_pair(300, &mut StdRng::seed_from_u64(1));
        let all = mts.clone();
        let first = mts.split_off_first(100);
        assert_eq!(100, first.len());
        assert_eq!(200, mts.len());
        assert_eq!(all.a()[..100], first.a()[..]);
        assert_eq!(all.c()[100..], mts.c()[..]);

        let mut joined = first;
        joined.append(mts);
        assert_eq!(all, joined);
    }
}
