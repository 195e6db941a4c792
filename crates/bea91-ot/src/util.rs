//! Utility types and functions shared by the OT protocols.
use crate::{DefaultRom, Rom128};
use bitvec::order::Lsb0;
use bitvec::view::BitView;
use blake2::digest::Output;
use blake2::Digest;
use rand::distributions::{Distribution, Standard};
use rand::Rng;
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::ops::{BitAnd, BitXor, BitXorAssign};
use tokio::sync::oneshot;

/// A 128 bit value. Bit `i` of the block is bit `i % 8` of byte `i / 8` of its little endian
/// representation.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block(u128);

impl Block {
    pub const BYTES: usize = 16;

    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn all_ones() -> Self {
        Self(u128::MAX)
    }

    pub fn from_le_bytes(bytes: [u8; 16]) -> Self {
        Self(u128::from_le_bytes(bytes))
    }

    pub fn to_le_bytes(self) -> [u8; 16] {
        self.0.to_le_bytes()
    }

    pub fn lsb(self) -> bool {
        self.0 & 1 == 1
    }

    pub fn bit(self, idx: usize) -> bool {
        assert!(idx < 128, "Block index out of bounds");
        (self.0 >> idx) & 1 == 1
    }

    /// Hash the block with the [`DefaultRom`], e.g. to commit to it.
    pub fn rom_hash(&self) -> Output<DefaultRom> {
        DefaultRom::digest(self.to_le_bytes())
    }

    /// Correlation robust hash of the block, tweaked with `tweak`.
    pub fn cr_hash(&self, tweak: u64) -> Block {
        let mut rom = Rom128::new();
        rom.update(tweak.to_le_bytes());
        rom.update(self.to_le_bytes());
        Block::from_le_bytes(rom.finalize().into())
    }
}

impl TryFrom<&[u8]> for Block {
    type Error = std::array::TryFromSliceError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Ok(Self::from_le_bytes(value.try_into()?))
    }
}

impl From<u128> for Block {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl BitXor for Block {
    type Output = Block;

    fn bitxor(self, rhs: Self) -> Self::Output {
        Self(self.0 ^ rhs.0)
    }
}

impl BitXorAssign for Block {
    fn bitxor_assign(&mut self, rhs: Self) {
        self.0 ^= rhs.0;
    }
}

impl BitAnd for Block {
    type Output = Block;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self(self.0 & rhs.0)
    }
}

impl Distribution<Block> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Block {
        Block(rng.gen())
    }
}

impl Debug for Block {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Block({:032x})", self.0)
    }
}

/// Pseudo random generator keyed with `seed`.
pub fn prg_from_block(seed: Block) -> ChaCha20Rng {
    let mut key = [0_u8; 32];
    key[..Block::BYTES].copy_from_slice(&seed.to_le_bytes());
    ChaCha20Rng::from_seed(key)
}

/// Transpose a bit matrix with `rows` rows and `cols` columns stored in row major order.
///
/// # Panics
/// If `rows` or `cols` is not divisible by 8 or `input.len() * 8 != rows * cols`.
pub fn transpose(input: &[u8], rows: usize, cols: usize) -> Vec<u8> {
    assert_eq!(0, rows % 8, "rows must be divisible by 8");
    assert_eq!(0, cols % 8, "cols must be divisible by 8");
    assert_eq!(rows * cols, input.len() * 8, "input has wrong size");
    let in_bits = input.view_bits::<Lsb0>();
    let mut output = vec![0_u8; input.len()];
    if output.is_empty() {
        return output;
    }
    output
        .par_chunks_exact_mut(rows / 8)
        .enumerate()
        .for_each(|(col, out_row)| {
            let out_bits = out_row.view_bits_mut::<Lsb0>();
            for row in 0..rows {
                out_bits.set(row, in_bits[row * cols + col]);
            }
        });
    output
}

/// Run the compute heavy `f` on the rayon thread pool without blocking the tokio runtime.
pub async fn spawn_compute<F, R>(f: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    rayon::spawn(move || {
        // the receiver is only dropped if the awaiting future is dropped
        let _ = tx.send(f());
    });
    rx.await.expect("panic in compute task")
}

#[cfg(test)]
mod tests {
    use super::{transpose, Block};
    use bitvec::order::Lsb0;
    use bitvec::view::BitView;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn transpose_twice_is_identity() {
        let mut rng = StdRng::seed_from_u64(42);
        let (rows, cols) = (128, 64);
        let mut input = vec![0_u8; rows * cols / 8];
        rng.fill(&mut input[..]);
        let transposed = transpose(&input, rows, cols);
        let in_bits = input.view_bits::<Lsb0>();
        let out_bits = transposed.view_bits::<Lsb0>();
        for row in 0..rows {
            for col in 0..cols {
                assert_eq!(in_bits[row * cols + col], out_bits[col * rows + row]);
            }
        }
        assert_eq!(input, transpose(&transposed, cols, rows));
    }

    #[test]
    fn block_bit_order() {
        let mut bytes = [0_u8; 16];
        bytes[1] = 0b100;
        let block = Block::from_le_bytes(bytes);
        assert!(block.bit(10));
        assert_eq!(1, (0..128).filter(|&i| block.bit(i)).count());
    }

    #[test]
    fn cr_hash_depends_on_tweak() {
        let block = Block::from(42);
        assert_ne!(block.cr_hash(0), block.cr_hash(1));
        assert_eq!(block.cr_hash(5), block.cr_hash(5));
    }
}
