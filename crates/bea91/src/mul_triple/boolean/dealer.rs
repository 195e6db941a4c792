//! In-process trusted dealer.
//!
//! A [`TrustedDealer`] samples pairs of correlated triples and hands each party its half.
//! It replaces triple generation when both parties run in the same process, e.g. in
//! benchmarks of the online phase.
use crate::mul_triple::boolean::MulTriples;
use crate::mul_triple::{MtProvider, MtProviderError};
use crate::party::Role;
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

pub struct TrustedDealer {
    rng: ChaCha20Rng,
    /// Batches dealt to one party which the other party has not yet requested.
    pending: [VecDeque<MulTriples>; 2],
}

/// One party's connection to a [`TrustedDealer`].
#[derive(Clone)]
pub struct DealerMtProvider {
    role: Role,
    dealer: Arc<Mutex<TrustedDealer>>,
}

impl TrustedDealer {
    /// Create a dealer seeded with `seed` and return a provider for each role.
    pub fn new_pair(seed: u64) -> (DealerMtProvider, DealerMtProvider) {
        let dealer = Arc::new(Mutex::new(TrustedDealer {
            rng: ChaCha20Rng::seed_from_u64(seed),
            pending: Default::default(),
        }));
        (
            DealerMtProvider {
                role: Role::First,
                dealer: dealer.clone(),
            },
            DealerMtProvider {
                role: Role::Second,
                dealer,
            },
        )
    }

    fn deal(&mut self, role: Role, amount: usize) -> Result<MulTriples, MtProviderError> {
        let own = role.index();
        if let Some(mts) = self.pending[own].pop_front() {
            if mts.len() != amount {
                return Err(MtProviderError::BatchMismatch {
                    requested: amount,
                    dealt: mts.len(),
                });
            }
            trace!(amount, "Handing out dealt triples");
            return Ok(mts);
        }
        trace!(amount, "Dealing new triples");
        let [first, second] = MulTriples::random_pair(amount, &mut self.rng);
        let (own_mts, other_mts) = if role.is_first() {
            (first, second)
        } else {
            (second, first)
        };
        self.pending[role.other().index()].push_back(other_mts);
        Ok(own_mts)
    }
}

#[async_trait]
impl MtProvider for DealerMtProvider {
    type Output = MulTriples;
    type Error = MtProviderError;

    async fn init(&mut self, _max_batch_size: usize) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Dealing is cheap, nothing is precomputed.
    async fn precompute_mts(&mut self, _amount: usize) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn request_mts(&mut self, amount: usize) -> Result<MulTriples, Self::Error> {
        self.dealer.lock().deal(self.role, amount)
    }
}

#[cfg(test)]
mod tests {
    use crate::mul_triple::boolean::TrustedDealer;
    use crate::mul_triple::{MtProvider, MtProviderError};

    #[tokio::test]
    async fn dealt_triples_are_valid() -> anyhow::Result<()> {
        let (mut mtp1, mut mtp2) = TrustedDealer::new_pair(7);
        // requests of the parties may interleave arbitrarily
        let first_a = mtp1.request_mts(64).await?;
        let first_b = mtp1.request_mts(10).await?;
        let second_a = mtp2.request_mts(64).await?;
        let second_b = mtp2.request_mts(10).await?;
        for (mts1, mts2) in [(first_a, second_a), (first_b, second_b)] {
            assert_eq!(mts1.len(), mts2.len());
            for (t1, t2) in mts1.iter().zip(mts2.iter()) {
                assert_eq!(t1.c() ^ t2.c(), (t1.a() ^ t2.a()) & (t1.b() ^ t2.b()));
            }
        }
        Ok(())
    }

    #[tokio::test]
    async fn mismatched_batches_are_detected() {
        let (mut mtp1, mut mtp2) = TrustedDealer::new_pair(7);
        mtp1.request_mts(8).await.unwrap();
        let err = mtp2.request_mts(9).await.unwrap_err();
        assert!(matches!(
            err,
            MtProviderError::BatchMismatch {
                requested: 9,
                dealt: 8
            }
        ));
    }
}
