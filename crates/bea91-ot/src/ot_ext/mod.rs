//! IKNP OT extension protocol.
//!
//! The extension sender acts as receiver of [`BASE_OT_COUNT`] base OTs with a random choice
//! vector `s` and the extension receiver as their sender. The base OT keys seed PRGs which
//! are kept for all following executions, so the base OTs are only performed once per
//! [`Sender`]/[`Receiver`] pair.
//!
//! For `m` OTs, the receiver expands its PRGs into the `128 x m` bit matrices `T` and
//! `T ^ G(k1)` and sends `U = T ^ G(k1) ^ r` to the sender, where `r` are its choices. The
//! sender computes `Q = G(k_s) ^ s * U` which satisfies `q_j = t_j ^ r_j * s` for the
//! columns `q_j` and `t_j`. The outputs are `H(j, q_j)` and `H(j, q_j ^ s)` for the sender
//! and `H(j, t_j)` for the receiver.
use crate::traits::{Error, RotReceiver, RotSender};
use crate::util::{prg_from_block, spawn_compute, transpose, Block};
use crate::{base_ot, OtStep, Session};
use async_trait::async_trait;
use bea91_channel::Channel;
use bitvec::order::Lsb0;
use bitvec::slice::BitSlice;
use bitvec::vec::BitVec;
use rand::{CryptoRng, Rng, RngCore};
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use tracing::{debug, instrument};

pub const BASE_OT_COUNT: usize = 128;

pub struct Sender {
    session: Session,
    state: Option<SenderState>,
    executions: u64,
    ots_done: u64,
}

pub struct Receiver {
    session: Session,
    state: Option<ReceiverState>,
    executions: u64,
    ots_done: u64,
}

struct SenderState {
    delta: Block,
    prgs: Vec<ChaCha20Rng>,
}

struct ReceiverState {
    prgs: Vec<[ChaCha20Rng; 2]>,
}

impl Sender {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            state: None,
            executions: 0,
            ots_done: 0,
        }
    }

    /// Perform the base OTs. Called by the first [`RotSender::send_random`] if not done
    /// explicitly.
    pub async fn init<RNG>(&mut self, rng: &mut RNG, channel: &Channel) -> Result<(), Error>
    where
        RNG: RngCore + CryptoRng + Send,
    {
        let state = self.setup(rng, channel).await?;
        self.state = Some(state);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    async fn setup<RNG>(&self, rng: &mut RNG, channel: &Channel) -> Result<SenderState, Error>
    where
        RNG: RngCore + CryptoRng + Send,
    {
        let delta: Block = rng.gen();
        let choices: BitVec<u8, Lsb0> = BitVec::from_vec(delta.to_le_bytes().to_vec());
        let mut base_ot = base_ot::Receiver::new(self.session);
        let base_ots = base_ot
            .receive_random(&choices, rng, channel)
            .await
            .map_err(|err| Error::BaseOT(Box::new(err)))?;
        debug!("Finished base OTs of extension sender");
        Ok(SenderState {
            delta,
            prgs: base_ots.into_iter().map(prg_from_block).collect(),
        })
    }
}

impl Receiver {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            state: None,
            executions: 0,
            ots_done: 0,
        }
    }

    /// Perform the base OTs. Called by the first [`RotReceiver::receive_random`] if not
    /// done explicitly.
    pub async fn init<RNG>(&mut self, rng: &mut RNG, channel: &Channel) -> Result<(), Error>
    where
        RNG: RngCore + CryptoRng + Send,
    {
        let state = self.setup(rng, channel).await?;
        self.state = Some(state);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    async fn setup<RNG>(&self, rng: &mut RNG, channel: &Channel) -> Result<ReceiverState, Error>
    where
        RNG: RngCore + CryptoRng + Send,
    {
        let mut base_ot = base_ot::Sender::new(self.session);
        let base_ots = base_ot
            .send_random(BASE_OT_COUNT, rng, channel)
            .await
            .map_err(|err| Error::BaseOT(Box::new(err)))?;
        debug!("Finished base OTs of extension receiver");
        Ok(ReceiverState {
            prgs: base_ots
                .into_iter()
                .map(|[k0, k1]| [prg_from_block(k0), prg_from_block(k1)])
                .collect(),
        })
    }
}

#[async_trait]
impl RotSender for Sender {
    /// `count` is internally rounded up to a multiple of 8, the additional OTs are discarded.
    #[instrument(level = "debug", skip_all, fields(count = count))]
    async fn send_random<RNG>(
        &mut self,
        count: usize,
        rng: &mut RNG,
        channel: &Channel,
    ) -> Result<Vec<[Block; 2]>, Error>
    where
        RNG: RngCore + CryptoRng + Send,
    {
        if count == 0 {
            return Ok(vec![]);
        }
        if self.state.is_none() {
            self.state = Some(self.setup(rng, channel).await?);
        }
        let cols = count.next_multiple_of(8);
        let row_bytes = cols / 8;
        let Session { task_id, pto } = self.session;
        let header = channel.incoming(
            task_id,
            &pto,
            OtStep::ExtUMatrix.into(),
            self.executions,
        );
        let u_rows = channel.receive(header).await?;
        if u_rows.len() != BASE_OT_COUNT || u_rows.iter().any(|row| row.len() != row_bytes) {
            return Err(Error::MalformedMessage("U matrix has wrong dimensions"));
        }
        let mut state = self.state.take().expect("state is set up before receiving");

        let offset = self.ots_done;
        let (state, ots) = spawn_compute(move || {
            let delta = state.delta;
            let mut q_mat = vec![0_u8; BASE_OT_COUNT * row_bytes];
            q_mat
                .par_chunks_exact_mut(row_bytes)
                .zip(state.prgs.par_iter_mut())
                .zip(u_rows.par_iter())
                .enumerate()
                .for_each(|(idx, ((q_row, prg), u_row))| {
                    prg.fill_bytes(q_row);
                    if delta.bit(idx) {
                        q_row.iter_mut().zip(u_row).for_each(|(q, u)| *q ^= u);
                    }
                });
            let q_mat = transpose(&q_mat, BASE_OT_COUNT, cols);
            let ots: Vec<_> = q_mat
                .par_chunks_exact(Block::BYTES)
                .take(count)
                .enumerate()
                .map(|(j, q)| {
                    let q = Block::try_from(q).expect("chunk has block size");
                    let tweak = offset + j as u64;
                    [q.cr_hash(tweak), (q ^ delta).cr_hash(tweak)]
                })
                .collect();
            (state, ots)
        })
        .await;
        self.state = Some(state);
        self.executions += 1;
        self.ots_done += cols as u64;
        debug!("Finished OT extension sender");
        Ok(ots)
    }
}

#[async_trait]
impl RotReceiver for Receiver {
    /// The number of OTs is internally rounded up to a multiple of 8, the additional OTs
    /// are discarded.
    #[instrument(level = "debug", skip_all, fields(count = choices.len()))]
    async fn receive_random<RNG>(
        &mut self,
        choices: &BitSlice<u8, Lsb0>,
        rng: &mut RNG,
        channel: &Channel,
    ) -> Result<Vec<Block>, Error>
    where
        RNG: RngCore + CryptoRng + Send,
    {
        let count = choices.len();
        if count == 0 {
            return Ok(vec![]);
        }
        let mut state = match self.state.take() {
            Some(state) => state,
            None => self.setup(rng, channel).await?,
        };
        let cols = count.next_multiple_of(8);
        let row_bytes = cols / 8;
        let mut r = BitVec::<u8, Lsb0>::with_capacity(cols);
        r.extend_from_bitslice(choices);
        r.resize(cols, false);
        let r_bytes = r.into_vec();

        let (state, t_mat, u_rows) = spawn_compute(move || {
            let mut t_mat = vec![0_u8; BASE_OT_COUNT * row_bytes];
            let u_rows: Vec<Vec<u8>> = t_mat
                .par_chunks_exact_mut(row_bytes)
                .zip(state.prgs.par_iter_mut())
                .map(|(t_row, [prg0, prg1])| {
                    prg0.fill_bytes(t_row);
                    let mut u_row = vec![0_u8; row_bytes];
                    prg1.fill_bytes(&mut u_row);
                    u_row
                        .iter_mut()
                        .zip(t_row.iter())
                        .zip(&r_bytes)
                        .for_each(|((u, t), r)| *u ^= t ^ r);
                    u_row
                })
                .collect();
            (state, t_mat, u_rows)
        })
        .await;
        self.state = Some(state);

        let Session { task_id, pto } = self.session;
        let header = channel.outgoing(
            task_id,
            &pto,
            OtStep::ExtUMatrix.into(),
            self.executions,
        );
        self.executions += 1;
        let offset = self.ots_done;
        self.ots_done += cols as u64;
        channel.send(header, u_rows).await?;

        let ots = spawn_compute(move || {
            let t_mat = transpose(&t_mat, BASE_OT_COUNT, cols);
            t_mat
                .par_chunks_exact(Block::BYTES)
                .take(count)
                .enumerate()
                .map(|(j, t)| {
                    let t = Block::try_from(t).expect("chunk has block size");
                    t.cr_hash(offset + j as u64)
                })
                .collect()
        })
        .await;
        debug!("Finished OT extension receiver");
        Ok(ots)
    }
}

#[cfg(test)]
mod tests {
    use crate::ot_ext::{Receiver, Sender};
    use crate::traits::{RotReceiver, RotSender};
    use crate::{Block, Session};
    use bea91_channel::{in_memory, PtoDesc};
    use bitvec::order::Lsb0;
    use bitvec::vec::BitVec;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;
    use std::time::Duration;

    const SESSION: Session = Session {
        task_id: 0,
        pto: PtoDesc::new(2, "OT_EXT_TEST"),
    };

    fn check_ots(send: &[[Block; 2]], recv: &[Block], choices: &BitVec<u8, Lsb0>) {
        assert_eq!(send.len(), recv.len());
        assert_eq!(choices.len(), recv.len());
        for (([m0, m1], r), choice) in send.iter().zip(recv).zip(choices.iter().by_vals()) {
            if choice {
                assert_eq!(m1, r);
                assert_ne!(m0, r);
            } else {
                assert_eq!(m0, r);
                assert_ne!(m1, r);
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn ot_ext() -> anyhow::Result<()> {
        let (ch1, ch2) = in_memory::new_pair();
        let mut sender = Sender::new(SESSION);
        let mut receiver = Receiver::new(SESSION);
        let mut rng_send = StdRng::seed_from_u64(42);
        let mut rng_recv = StdRng::seed_from_u64(42 * 42);

        let mut seen = HashSet::new();
        // the first execution performs the base OTs, the second reuses them
        for num_ots in [1001, 256] {
            let choices: BitVec<u8, Lsb0> = (0..num_ots).map(|_| rng_recv.gen::<bool>()).collect();
            let send = sender.send_random(num_ots, &mut rng_send, &ch1);
            let mut rng = StdRng::seed_from_u64(num_ots as u64);
            let receive = receiver.receive_random(&choices, &mut rng, &ch2);
            let (sent, recv) = tokio::try_join!(send, receive)?;
            check_ots(&sent, &recv, &choices);
            for [m0, m1] in sent {
                assert!(seen.insert(m0));
                assert!(seen.insert(m1));
            }
        }
        assert!(sender.is_initialized());
        assert!(receiver.is_initialized());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cancelled_send_keeps_base_ots() -> anyhow::Result<()> {
        let (ch1, ch2) = in_memory::new_pair();
        let mut sender = Sender::new(SESSION);
        let mut receiver = Receiver::new(SESSION);
        let mut rng_send = StdRng::seed_from_u64(3);
        let mut rng_recv = StdRng::seed_from_u64(4);
        let choices: BitVec<u8, Lsb0> = (0..128).map(|_| rng_recv.gen::<bool>()).collect();
        tokio::try_join!(
            sender.send_random(128, &mut rng_send, &ch1),
            receiver.receive_random(&choices, &mut rng_recv, &ch2)
        )?;

        // the receiver does not take part, so the sender waits until it is cancelled
        let cancelled = tokio::time::timeout(
            Duration::from_millis(20),
            sender.send_random(128, &mut rng_send, &ch1),
        )
        .await;
        assert!(cancelled.is_err());
        assert!(sender.is_initialized());

        let (sent, recv) = tokio::try_join!(
            sender.send_random(128, &mut rng_send, &ch1),
            receiver.receive_random(&choices, &mut rng_recv, &ch2)
        )?;
        check_ots(&sent, &recv, &choices);
        Ok(())
    }

    #[tokio::test]
    async fn zero_ots_need_no_communication() -> anyhow::Result<()> {
        let (ch1, ch2) = in_memory::new_pair();
        let mut sender = Sender::new(SESSION);
        let mut receiver = Receiver::new(SESSION);
        let mut rng = StdRng::seed_from_u64(7);
        let sent = sender.send_random(0, &mut rng, &ch1).await?;
        let recv = receiver
            .receive_random(&BitVec::<u8, Lsb0>::new(), &mut rng, &ch2)
            .await?;
        assert!(sent.is_empty() && recv.is_empty());
        assert_eq!(0, ch1.stats().packets_sent());
        assert_eq!(0, ch2.stats().packets_sent());
        assert!(!sender.is_initialized());
        Ok(())
    }
}
