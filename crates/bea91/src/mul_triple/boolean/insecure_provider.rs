//! Insecure MtProvider, intended for testing.
use crate::mul_triple::boolean::MulTriples;
use crate::mul_triple::MtProvider;
use crate::party::Role;
use async_trait::async_trait;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::convert::Infallible;

/// An insecure [`MtProvider`] which derives the triples of both parties from a fixed seed
/// and returns the share of its role. Both instances must receive the same requests.
/// **Do not use in production!**.
#[derive(Clone)]
pub struct InsecureMtProvider {
    role: Role,
    rng: ChaCha8Rng,
    mts: MulTriples,
}

impl InsecureMtProvider {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            rng: ChaCha8Rng::seed_from_u64(42),
            mts: MulTriples::default(),
        }
    }

    fn gen_mts(&mut self, amount: usize) -> MulTriples {
        let [first, second] = MulTriples::random_pair(amount, &mut self.rng);
        if self.role.is_first() {
            first
        } else {
            second
        }
    }
}

#[async_trait]
impl MtProvider for InsecureMtProvider {
    type Output = MulTriples;
    type Error = Infallible;

    async fn init(&mut self, _max_batch_size: usize) -> Result<(), Infallible> {
        // Nothing to do
        Ok(())
    }

    async fn precompute_mts(&mut self, amount: usize) -> Result<(), Infallible> {
        let mts = self.gen_mts(amount);
        self.mts.append(mts);
        Ok(())
    }

    async fn request_mts(&mut self, amount: usize) -> Result<MulTriples, Self::Error> {
        if self.mts.len() < amount {
            let mts = self.gen_mts(amount - self.mts.len());
            self.mts.append(mts);
        }
        Ok(self.mts.split_off_first(amount))
    }
}

#[cfg(test)]
mod tests {
    use crate::mul_triple::boolean::InsecureMtProvider;
    use crate::mul_triple::MtProvider;
    use crate::party::Role;

    #[tokio::test]
    async fn insecure_triples_are_valid() -> anyhow::Result<()> {
        let mut mtp1 = InsecureMtProvider::new(Role::First);
        let mut mtp2 = InsecureMtProvider::new(Role::Second);
        mtp1.precompute_mts(50).await?;
        mtp2.precompute_mts(50).await?;
        for amount in [30, 70, 0, 5] {
            let mts1 = mtp1.request_mts(amount).await?;
            let mts2 = mtp2.request_mts(amount).await?;
            assert_eq!(amount, mts1.len());
            for (t1, t2) in mts1.iter().zip(mts2.iter()) {
                assert_eq!(t1.c() ^ t2.c(), (t1.a() ^ t2.a()) & (t1.b() ^ t2.b()));
            }
        }
        Ok(())
    }
}
