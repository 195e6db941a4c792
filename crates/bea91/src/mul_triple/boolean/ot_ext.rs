//! OT based multiplication triple generation.
//!
//! Each party acts as sender and as receiver of random OTs with the other party. For the
//! sent OTs `(m0, m1)` a party sets `b = lsb(m0 ^ m1)` and `v = lsb(m0)`, for the received
//! OTs it chooses random `a` and obtains `u = lsb(m_a)`. With `c = a & b ^ u ^ v`, the
//! shares satisfy `c0 ^ c1 = (a0 ^ a1) & (b0 ^ b1)`.
use crate::mul_triple::boolean::MulTriples;
use crate::mul_triple::{MtProvider, MtProviderError};
use crate::utils::rand_bitvec;
use async_trait::async_trait;
use bea91_channel::{Channel, PartyId, PtoDesc};
use bea91_ot::traits::{RotReceiver, RotSender};
use bea91_ot::{ot_ext, Block, Session};
use bitvec::vec::BitVec;
use rand::{CryptoRng, Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use tracing::{debug, instrument};

/// OT session in which the first party is the sender.
pub const FIRST_SENDS_PTO: PtoDesc = PtoDesc::new(0xB0_0001, "Z2_MTG_OT_FIRST_SENDS");
/// OT session in which the second party is the sender.
pub const SECOND_SENDS_PTO: PtoDesc = PtoDesc::new(0xB0_0002, "Z2_MTG_OT_SECOND_SENDS");

/// Triples are generated in rounds of a multiple of this size.
pub const ROUND_GRANULARITY: usize = 128;
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1 << 16;

pub struct OtMtProvider<RNG = ChaCha20Rng> {
    rng: RNG,
    channel: Channel,
    ot_sender: ot_ext::Sender,
    ot_receiver: ot_ext::Receiver,
    max_batch_size: usize,
    precomputed_mts: MulTriples,
}

impl<RNG: RngCore + CryptoRng + Send> OtMtProvider<RNG> {
    pub fn new(rng: RNG, channel: Channel, task_id: u64) -> Self {
        let pto_of = |sender: PartyId| match sender {
            PartyId::FIRST => FIRST_SENDS_PTO,
            _ => SECOND_SENDS_PTO,
        };
        let sender_session = Session::new(task_id, pto_of(channel.own_party()));
        let receiver_session = Session::new(task_id, pto_of(channel.other_party()));
        Self {
            rng,
            channel,
            ot_sender: ot_ext::Sender::new(sender_session),
            ot_receiver: ot_ext::Receiver::new(receiver_session),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            precomputed_mts: MulTriples::default(),
        }
    }

    /// Number of triples which are generated but not yet requested.
    pub fn mts_available(&self) -> usize {
        self.precomputed_mts.len()
    }

    /// Generate `amount` triples in one round. `amount` must be a multiple of
    /// [`ROUND_GRANULARITY`].
    #[instrument(level = "debug", skip(self))]
    async fn compute_mts(&mut self, amount: usize) -> Result<MulTriples, MtProviderError> {
        debug_assert_eq!(0, amount % ROUND_GRANULARITY);
        let mut sender_rng = ChaCha20Rng::from_seed(self.rng.gen());
        let mut receiver_rng = ChaCha20Rng::from_seed(self.rng.gen());
        let a_i = rand_bitvec(amount, &mut self.rng);

        let send = self
            .ot_sender
            .send_random(amount, &mut sender_rng, &self.channel);
        let receive = self
            .ot_receiver
            .receive_random(&a_i, &mut receiver_rng, &self.channel);
        let (send_ots, recv_ots) = tokio::try_join!(send, receive)?;

        let (b_i, v_i): (Vec<u8>, Vec<u8>) = send_ots
            .par_chunks_exact(8)
            .map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .fold((0, 0), |(b, v), (idx, [m0, m1])| {
                        (
                            b | ((*m0 ^ *m1).lsb() as u8) << idx,
                            v | (m0.lsb() as u8) << idx,
                        )
                    })
            })
            .unzip();
        let u_i: Vec<u8> = recv_ots.par_chunks_exact(8).map(pack_lsbs).collect();
        let c_i: Vec<u8> = a_i
            .as_raw_slice()
            .par_iter()
            .zip(&b_i)
            .zip(&u_i)
            .zip(&v_i)
            .map(|(((a, b), u), v)| a & b ^ u ^ v)
            .collect();
        Ok(MulTriples::from_raw(
            a_i,
            BitVec::from_vec(b_i),
            BitVec::from_vec(c_i),
        ))
    }

    async fn generate_until(&mut self, amount: usize) -> Result<(), MtProviderError> {
        while self.precomputed_mts.len() < amount {
            let missing = amount - self.precomputed_mts.len();
            let round = missing
                .min(self.max_batch_size)
                .next_multiple_of(ROUND_GRANULARITY);
            let mts = self.compute_mts(round).await?;
            self.precomputed_mts.append(mts);
        }
        Ok(())
    }
}

fn pack_lsbs(blocks: &[Block]) -> u8 {
    blocks
        .iter()
        .enumerate()
        .fold(0, |acc, (idx, block)| acc | (block.lsb() as u8) << idx)
}

#[async_trait]
impl<RNG: RngCore + CryptoRng + Send> MtProvider for OtMtProvider<RNG> {
    type Output = MulTriples;
    type Error = MtProviderError;

    #[instrument(level = "debug", skip(self))]
    async fn init(&mut self, max_batch_size: usize) -> Result<(), Self::Error> {
        self.max_batch_size = max_batch_size.max(1);
        let mut sender_rng = ChaCha20Rng::from_seed(self.rng.gen());
        let mut receiver_rng = ChaCha20Rng::from_seed(self.rng.gen());
        let init_sender = self.ot_sender.init(&mut sender_rng, &self.channel);
        let init_receiver = self.ot_receiver.init(&mut receiver_rng, &self.channel);
        tokio::try_join!(init_sender, init_receiver)?;
        debug!("Finished base OTs");
        Ok(())
    }

    async fn precompute_mts(&mut self, amount: usize) -> Result<(), Self::Error> {
        let target = self.precomputed_mts.len() + amount;
        self.generate_until(target).await
    }

    async fn request_mts(&mut self, amount: usize) -> Result<MulTriples, Self::Error> {
        self.generate_until(amount).await?;
        Ok(self.precomputed_mts.split_off_first(amount))
    }
}

#[cfg(test)]
mod tests {
    use crate::mul_triple::boolean::OtMtProvider;
    use crate::mul_triple::MtProvider;
    use bea91_channel::in_memory;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn ot_mts() -> anyhow::Result<()> {
        let (ch1, ch2) = in_memory::new_pair();
        let mut mtp1 = OtMtProvider::new(ChaCha20Rng::seed_from_u64(1), ch1, 0);
        let mut mtp2 = OtMtProvider::new(ChaCha20Rng::seed_from_u64(2), ch2, 0);
        tokio::try_join!(mtp1.init(200), mtp2.init(200))?;

        // 300 > max batch size, generated in multiple rounds
        for amount in [100, 300, 28] {
            let (mts1, mts2) =
                tokio::try_join!(mtp1.request_mts(amount), mtp2.request_mts(amount))?;
            assert_eq!(amount, mts1.len());
            assert_eq!(amount, mts2.len());
            let left = mts1.c().clone() ^ mts2.c();
            let right = (mts1.a().clone() ^ mts2.a()) & (mts1.b().clone() ^ mts2.b());
            assert_eq!(left, right);
        }
        // 128 + 256 + 128 were generated, 428 requested
        assert_eq!(84, mtp1.mts_available());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn remainder_is_carried_forward() -> anyhow::Result<()> {
        let (ch1, ch2) = in_memory::new_pair();
        let mut mtp1 = OtMtProvider::new(ChaCha20Rng::seed_from_u64(3), ch1, 0);
        let mut mtp2 = OtMtProvider::new(ChaCha20Rng::seed_from_u64(4), ch2, 0);
        tokio::try_join!(mtp1.request_mts(10), mtp2.request_mts(10))?;
        assert_eq!(118, mtp1.mts_available());
        assert_eq!(118, mtp2.mts_available());
        let packets = mtp1.channel.stats().packets_sent();
        tokio::try_join!(mtp1.request_mts(100), mtp2.request_mts(100))?;
        // served from the remainder
        assert_eq!(packets, mtp1.channel.stats().packets_sent());
        assert_eq!(18, mtp1.mts_available());
        Ok(())
    }
}
