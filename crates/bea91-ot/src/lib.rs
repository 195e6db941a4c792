//! Random oblivious transfer over a [`Channel`](bea91_channel::Channel).
//!
//! [`base_ot`] implements the Chou Orlandi base OT protocol, [`ot_ext`] the IKNP OT
//! extension protocol which stretches 128 base OTs into an arbitrary number of random OTs.
//! Both implement the [`RotSender`](traits::RotSender) and
//! [`RotReceiver`](traits::RotReceiver) traits.
use bea91_channel::PtoDesc;
use blake2::digest::consts::U16;
use blake2::{Blake2b, Blake2b512};

pub mod base_ot;
pub mod ot_ext;
pub mod traits;
pub mod util;

pub use traits::{Error, RotReceiver, RotSender};
pub use util::Block;

/// Random oracle used for commitments.
pub type DefaultRom = Blake2b512;
/// Random oracle with an output of 128 bits.
pub type Rom128 = Blake2b<U16>;

/// Identifies an OT session on a channel. Both parties must use the same session for the
/// two ends of an OT and distinct sessions for OTs which run concurrently.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Session {
    pub task_id: u64,
    pub pto: PtoDesc,
}

/// Protocol steps of the OT protocols, used as `step_id` in packet headers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum OtStep {
    BaseSenderPoint = 0,
    BaseReceiverPoints = 1,
    BaseSeed = 2,
    ExtUMatrix = 3,
}

impl Session {
    pub fn new(task_id: u64, pto: PtoDesc) -> Self {
        Self { task_id, pto }
    }
}

impl From<OtStep> for u32 {
    fn from(step: OtStep) -> Self {
        step as u32
    }
}
