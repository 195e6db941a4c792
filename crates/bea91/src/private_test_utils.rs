//! Private test utilities - Do Not Use!
//!
//! This module is activated by the "_integration_tests" feature and should not be used by
//! downstream code. It can change in any version.
use anyhow::Result;
use bea91_channel::{in_memory, tcp, Channel};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::info;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::bit_vector::BitVector;
use crate::mul_triple::boolean::{InsecureMtProvider, OtMtProvider, TrustedDealer};
use crate::mul_triple::{DynMtProvider, MtProvider};
use crate::party::{Bea91Party, Role};
use crate::share::ShareVector;

pub type TestParty = Bea91Party<DynMtProvider>;

/// Initializes tracing subscriber with EnvFilter for usage in tests. This should be the first call
/// in each test, with the returned value being assigned to a variable to prevent dropping.
/// Output can be configured via RUST_LOG env variable as explained
/// [here](https://docs.rs/tracing-subscriber/latest/tracing_subscriber/struct.EnvFilter.html)
///
/// ```ignore
/// use bea91::private_test_utils::init_tracing;
/// fn some_test() {
///     let _guard = init_tracing();
/// }
/// ```
pub fn init_tracing() -> tracing::dispatcher::DefaultGuard {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .set_default()
}

#[derive(Debug, Copy, Clone)]
pub enum TestChannel {
    InMemory,
    Tcp,
}

#[derive(Debug, Copy, Clone)]
pub enum TestMtProvider {
    Insecure,
    Dealer,
    Ot,
}

pub async fn channel_pair(channel: TestChannel) -> Result<(Channel, Channel)> {
    Ok(match channel {
        TestChannel::InMemory => in_memory::new_pair(),
        TestChannel::Tcp => tcp::new_local_pair(None).await?,
    })
}

/// Create both parties on a fresh channel pair. The parties are not yet initialized.
pub async fn party_pair(
    channel: TestChannel,
    mt_provider: TestMtProvider,
) -> Result<(TestParty, TestParty)> {
    let (ch1, ch2) = channel_pair(channel).await?;
    let (mtp1, mtp2) = match mt_provider {
        TestMtProvider::Insecure => (
            InsecureMtProvider::new(Role::First).into_dyn(),
            InsecureMtProvider::new(Role::Second).into_dyn(),
        ),
        TestMtProvider::Dealer => {
            let (mtp1, mtp2) = TrustedDealer::new_pair(42);
            (mtp1.into_dyn(), mtp2.into_dyn())
        }
        TestMtProvider::Ot => (
            OtMtProvider::new(ChaCha20Rng::seed_from_u64(10), ch1.clone(), 0).into_dyn(),
            OtMtProvider::new(ChaCha20Rng::seed_from_u64(11), ch2.clone(), 0).into_dyn(),
        ),
    };
    let p1 = Bea91Party::new(ch1, mtp1, ChaCha20Rng::seed_from_u64(1))?;
    let p2 = Bea91Party::new(ch2, mtp2, ChaCha20Rng::seed_from_u64(2))?;
    Ok((p1, p2))
}

/// Create and initialize both parties.
pub async fn init_party_pair(
    channel: TestChannel,
    mt_provider: TestMtProvider,
) -> Result<(TestParty, TestParty)> {
    let (mut p1, mut p2) = party_pair(channel, mt_provider).await?;
    tokio::try_join!(p1.init(), p2.init())?;
    info!(?channel, ?mt_provider, "Initialized parties");
    Ok((p1, p2))
}

/// The first party shares `x`, the second party shares `y`. Returns the shares of
/// `(x, y)` of both parties.
pub async fn share_inputs(
    p1: &mut TestParty,
    p2: &mut TestParty,
    x: &BitVector,
    y: &BitVector,
) -> Result<[(ShareVector, ShareVector); 2]> {
    let (x1, x2) = tokio::try_join!(p1.share_own(x), p2.share_other(x.len()))?;
    let (y2, y1) = tokio::try_join!(p2.share_own(y), p1.share_other(y.len()))?;
    Ok([(x1, y1), (x2, y2)])
}

/// Reveal `z` to both parties and check that they agree.
pub async fn reveal(
    p1: &mut TestParty,
    p2: &mut TestParty,
    z1: &ShareVector,
    z2: &ShareVector,
) -> Result<BitVector> {
    let (out1, out2) = tokio::try_join!(p1.reveal_all(z1), p2.reveal_all(z2))?;
    assert_eq!(out1, out2, "parties revealed different outputs");
    Ok(out1)
}

/// Parse a bit string. The first character is bit 0.
pub fn bits(s: &str) -> BitVector {
    s.chars()
        .map(|c| match c {
            '0' => false,
            '1' => true,
            other => panic!("illegal bit {other}"),
        })
        .collect()
}
