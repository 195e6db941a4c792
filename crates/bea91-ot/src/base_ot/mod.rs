//! Chou Orlandi base OT protocol.
//!
//! The sender sends a point `A = aG` together with a commitment to a seed, the receiver
//! answers with one point per OT which encodes its choice, and finally the sender opens
//! the seed. The seed is mixed into the key derivation.
use crate::traits::{Error, RotReceiver, RotSender};
use crate::util::Block;
use crate::{OtStep, Rom128, Session};
use async_trait::async_trait;
use bea91_channel::Channel;
use bitvec::order::Lsb0;
use bitvec::slice::BitSlice;
use blake2::Digest;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use rand::{CryptoRng, Rng, RngCore};
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct Sender {
    session: Session,
    executions: u64,
}

#[derive(Debug, Clone)]
pub struct Receiver {
    session: Session,
    executions: u64,
}

impl Sender {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            executions: 0,
        }
    }
}

impl Receiver {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            executions: 0,
        }
    }
}

#[async_trait]
impl RotSender for Sender {
    #[allow(non_snake_case)]
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
        let Session { task_id, pto } = self.session;
        let execution = self.executions;
        self.executions += 1;

        let a = Scalar::random(rng);
        let A = RistrettoPoint::mul_base(&a);
        let seed: Block = rng.gen();
        let seed_comm = seed.rom_hash();
        let header = channel.outgoing(task_id, &pto, OtStep::BaseSenderPoint.into(), execution);
        channel
            .send(
                header,
                vec![A.compress().to_bytes().to_vec(), seed_comm.to_vec()],
            )
            .await?;

        let header = channel.incoming(
            task_id,
            &pto,
            OtStep::BaseReceiverPoints.into(),
            execution,
        );
        let points = channel.receive(header).await?;
        if count != points.len() {
            return Err(Error::MalformedMessage("wrong number of points"));
        }
        let points = points
            .iter()
            .map(|bytes| decode_point(bytes))
            .collect::<Result<Vec<_>, _>>()?;

        let header = channel.outgoing(task_id, &pto, OtStep::BaseSeed.into(), execution);
        channel
            .send(header, vec![seed.to_le_bytes().to_vec()])
            .await?;

        let aA = A * a;
        let ots = points
            .into_iter()
            .enumerate()
            .map(|(i, B)| {
                let aB = B * a;
                let k0 = rom_hash_point(&aB, i, seed);
                let k1 = rom_hash_point(&(aB - aA), i, seed);
                [k0, k1]
            })
            .collect();
        debug!("Finished base OT sender");
        Ok(ots)
    }
}

#[async_trait]
impl RotReceiver for Receiver {
    #[allow(non_snake_case)]
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
        let Session { task_id, pto } = self.session;
        let execution = self.executions;
        self.executions += 1;

        let header = channel.incoming(task_id, &pto, OtStep::BaseSenderPoint.into(), execution);
        let msg = channel.receive(header).await?;
        let [A, comm] = msg.as_slice() else {
            return Err(Error::MalformedMessage("expected point and commitment"));
        };
        let A = decode_point(A)?;
        let comm = comm.clone();

        let (bs, Bs): (Vec<_>, Vec<_>) = choices
            .iter()
            .by_vals()
            .map(|choice| {
                let b = Scalar::random(rng);
                let B_0 = RistrettoPoint::mul_base(&b);
                let B = if choice { A + B_0 } else { B_0 };
                (b, B.compress().to_bytes().to_vec())
            })
            .unzip();
        let header = channel.outgoing(
            task_id,
            &pto,
            OtStep::BaseReceiverPoints.into(),
            execution,
        );
        channel.send(header, Bs).await?;

        let header = channel.incoming(task_id, &pto, OtStep::BaseSeed.into(), execution);
        let msg = channel.receive(header).await?;
        let seed = match msg.as_slice() {
            [seed] => Block::try_from(seed.as_slice())
                .map_err(|_| Error::MalformedMessage("seed has wrong length"))?,
            _ => return Err(Error::MalformedMessage("expected seed")),
        };
        if comm.as_slice() != seed.rom_hash().as_slice() {
            return Err(Error::ProtocolDeviation);
        }
        let ots = bs
            .into_iter()
            .enumerate()
            .map(|(i, b)| {
                let B = A * b;
                rom_hash_point(&B, i, seed)
            })
            .collect();
        debug!("Finished base OT receiver");
        Ok(ots)
    }
}

fn decode_point(bytes: &[u8]) -> Result<RistrettoPoint, Error> {
    CompressedRistretto::from_slice(bytes)
        .map_err(|_| Error::MalformedMessage("point has wrong length"))?
        .decompress()
        .ok_or(Error::ProtocolDeviation)
}

/// Hash a point and counter using the ROM.
fn rom_hash_point(point: &RistrettoPoint, counter: usize, seed: Block) -> Block {
    let mut rom = Rom128::new();
    rom.update(point.compress().as_bytes());
    rom.update((counter as u64).to_le_bytes());
    rom.update(seed.to_le_bytes());
    let out = rom.finalize();
    Block::from_le_bytes(out.into())
}

#[cfg(test)]
mod tests {
    use crate::base_ot::{Receiver, Sender};
    use crate::traits::{Error, RotReceiver, RotSender};
    use crate::Session;
    use bea91_channel::{in_memory, PtoDesc};
    use bitvec::bitvec;
    use bitvec::order::Lsb0;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SESSION: Session = Session {
        task_id: 0,
        pto: PtoDesc::new(1, "BASE_OT_TEST"),
    };

    #[tokio::test]
    async fn base_rot() -> anyhow::Result<()> {
        let (ch1, ch2) = in_memory::new_pair();
        let mut rng_send = StdRng::seed_from_u64(42);
        let mut rng_recv = StdRng::seed_from_u64(42 * 42);
        let mut sender = Sender::new(SESSION);
        let mut receiver = Receiver::new(SESSION);
        let mut choices = bitvec![u8, Lsb0; 0; 128];
        for i in (0..128).step_by(3) {
            choices.set(i, true);
        }
        let send = sender.send_random(128, &mut rng_send, &ch1);
        let receive = receiver.receive_random(&choices, &mut rng_recv, &ch2);

        let (sender_out, receiver_out) = tokio::try_join!(send, receive)?;
        for ((recv, [k0, k1]), choice) in receiver_out.into_iter().zip(sender_out).zip(choices) {
            if choice {
                assert_eq!(recv, k1);
                assert_ne!(recv, k0);
            } else {
                assert_eq!(recv, k0);
                assert_ne!(recv, k1);
            }
        }
        Ok(())
    }

    #[tokio::test]
    async fn wrong_number_of_points_is_malformed() {
        let (ch1, ch2) = in_memory::new_pair();
        let mut rng_send = StdRng::seed_from_u64(1);
        let mut rng_recv = StdRng::seed_from_u64(2);
        let mut sender = Sender::new(SESSION);
        let mut receiver = Receiver::new(SESSION);
        let choices = bitvec![u8, Lsb0; 0; 8];
        // the receiver waits for a seed which never arrives, drop the sender's channel once
        // it errored
        let send = async move {
            let res = sender.send_random(16, &mut rng_send, &ch1).await;
            drop(ch1);
            res
        };
        let receive = receiver.receive_random(&choices, &mut rng_recv, &ch2);
        let (send_res, recv_res) = tokio::join!(send, receive);
        assert!(matches!(send_res, Err(Error::MalformedMessage(_))));
        assert!(recv_res.is_err());
    }
}
