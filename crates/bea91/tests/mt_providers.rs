use bea91::channel::tcp;
use bea91::mul_triple::boolean::{OtMtProvider, TrustedDealer};
use bea91::mul_triple::{MtProvider, MulTriples};
use bea91::private_test_utils::init_tracing;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

fn assert_valid(mts1: &MulTriples, mts2: &MulTriples) {
    assert_eq!(mts1.len(), mts2.len());
    for (idx, (t1, t2)) in mts1.iter().zip(mts2.iter()).enumerate() {
        assert_eq!(
            t1.c() ^ t2.c(),
            (t1.a() ^ t2.a()) & (t1.b() ^ t2.b()),
            "invalid triple at {idx}"
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ot_mts_over_tcp() -> anyhow::Result<()> {
    let _guard = init_tracing();
    let (ch1, ch2) = tcp::new_local_pair(None).await?;
    let mut mtp1 = OtMtProvider::new(ChaCha20Rng::seed_from_u64(1), ch1.clone(), 3);
    let mut mtp2 = OtMtProvider::new(ChaCha20Rng::seed_from_u64(2), ch2, 3);
    tokio::try_join!(mtp1.init(1000), mtp2.init(1000))?;
    tokio::try_join!(mtp1.precompute_mts(500), mtp2.precompute_mts(500))?;
    let sent = ch1.stats().packets_sent();
    for amount in [500, 1, 2500] {
        let (mts1, mts2) = tokio::try_join!(mtp1.request_mts(amount), mtp2.request_mts(amount))?;
        assert_eq!(amount, mts1.len());
        assert_valid(&mts1, &mts2);
    }
    assert!(ch1.stats().packets_sent() > sent);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ot_mts_of_different_tasks_share_a_channel() -> anyhow::Result<()> {
    let _guard = init_tracing();
    let (ch1, ch2) = tcp::new_local_pair(None).await?;
    let mut task_a = (
        OtMtProvider::new(ChaCha20Rng::seed_from_u64(1), ch1.clone(), 0),
        OtMtProvider::new(ChaCha20Rng::seed_from_u64(2), ch2.clone(), 0),
    );
    let mut task_b = (
        OtMtProvider::new(ChaCha20Rng::seed_from_u64(3), ch1, 1),
        OtMtProvider::new(ChaCha20Rng::seed_from_u64(4), ch2, 1),
    );
    let ((a1, a2), (b1, b2)) = tokio::try_join!(
        async { tokio::try_join!(task_a.0.request_mts(300), task_a.1.request_mts(300)) },
        async { tokio::try_join!(task_b.0.request_mts(200), task_b.1.request_mts(200)) },
    )?;
    assert_valid(&a1, &a2);
    assert_valid(&b1, &b2);
    Ok(())
}

#[tokio::test]
async fn dealer_mts() -> anyhow::Result<()> {
    let (mut mtp1, mut mtp2) = TrustedDealer::new_pair(1);
    let (mts1, mts2) = tokio::try_join!(mtp1.request_mts(1000), mtp2.request_mts(1000))?;
    assert_valid(&mts1, &mts2);
    Ok(())
}
