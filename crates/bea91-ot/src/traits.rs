//! Oblivious transfer traits.
use crate::util::Block;
use async_trait::async_trait;
use bea91_channel::{Channel, CommunicationError};
use bitvec::order::Lsb0;
use bitvec::slice::BitSlice;
use rand::{CryptoRng, RngCore};
use std::fmt::Debug;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Error in communication with other party")]
    Communication(#[from] CommunicationError),
    #[error("Received malformed message: {0}")]
    MalformedMessage(&'static str),
    #[error("The other party deviated from the protocol")]
    ProtocolDeviation,
    #[error("Error in base OT execution")]
    BaseOT(#[source] Box<Error>),
}

/// Sender of random OTs.
#[async_trait]
pub trait RotSender {
    /// Send `count` number of random OTs via the provided channel.
    async fn send_random<RNG>(
        &mut self,
        count: usize,
        rng: &mut RNG,
        channel: &Channel,
    ) -> Result<Vec<[Block; 2]>, Error>
    where
        RNG: RngCore + CryptoRng + Send;
}

/// Receiver of random OTs.
#[async_trait]
pub trait RotReceiver {
    /// Receive `choices.len()` number of random OTs via the provided channel.
    async fn receive_random<RNG>(
        &mut self,
        choices: &BitSlice<u8, Lsb0>,
        rng: &mut RNG,
        channel: &Channel,
    ) -> Result<Vec<Block>, Error>
    where
        RNG: RngCore + CryptoRng + Send;
}
