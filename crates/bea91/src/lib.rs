//! # Bea91
//!
//! Secure two-party evaluation of Boolean operations on XOR secret shared bit vectors.
//!
//! Each of the two parties holds one share of every secret value, the value itself is the XOR
//! of both shares. XOR and NOT of shared values are computed locally. AND is computed with
//! Beaver's multiplication triples (Beaver, CRYPTO '91) and needs a single round of
//! communication. The triples are generated ahead of time from random oblivious transfers
//! ([`mul_triple::boolean::OtMtProvider`]). The protocol is secure against semi-honest
//! adversaries.
//!
//! ## Using Bea91
//! Both parties create a [`Bea91Party`] on their end of a [`channel::Channel`], initialize it and
//! then perform the same sequence of operations.
//! ```ignore,rust
//! let channel = bea91::channel::tcp::establish(&tcp_config).await?;
//! let mut party = Bea91Party::from_config(&party_config, channel)?;
//! party.init().await?;
//! let x = party.share_own(&input).await?;
//! let y = party.share_other(input.len()).await?;
//! let z = party.and(&x, &y).await?;
//! let output = party.reveal_all(&z).await?;
//! ```
//! A runnable version of this is located at `crates/bea91/examples/two_party.rs`.
pub use bea91_channel as channel;
pub use bit_vector::BitVector;
pub use party::{Bea91Party, PartyError, Role};
pub use share::ShareVector;

pub mod bit_vector;
pub mod config;
pub mod mul_triple;
pub mod party;
#[cfg(feature = "_integration_tests")]
#[doc(hidden)]
/// Do **not** use items from this module. They are intended for integration tests and must
/// therefore be public.
pub mod private_test_utils;
pub mod share;
pub(crate) mod utils;
