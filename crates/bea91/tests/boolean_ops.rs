use bea91::private_test_utils::{
    bits, init_party_pair, init_tracing, reveal, share_inputs, TestChannel, TestMtProvider,
};
use bea91::{BitVector, ShareVector};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

async fn and_xor_four_bits(
    channel: TestChannel,
    mt_provider: TestMtProvider,
) -> anyhow::Result<()> {
    let (mut p1, mut p2) = init_party_pair(channel, mt_provider).await?;
    let x = BitVector::from_bytes(4, &[0b1011])?;
    let y = BitVector::from_bytes(4, &[0b0110])?;
    let [(x1, y1), (x2, y2)] = share_inputs(&mut p1, &mut p2, &x, &y).await?;

    let (and1, and2) = tokio::try_join!(p1.and(&x1, &y1), p2.and(&x2, &y2))?;
    let and = reveal(&mut p1, &mut p2, &and1, &and2).await?;
    assert_eq!(BitVector::from_bytes(4, &[0b0010])?, and);

    let xor1 = p1.xor(&x1, &y1)?;
    let xor2 = p2.xor(&x2, &y2)?;
    let xor = reveal(&mut p1, &mut p2, &xor1, &xor2).await?;
    assert_eq!(BitVector::from_bytes(4, &[0b1101])?, xor);
    Ok(())
}

#[tokio::test]
async fn four_bits_in_memory() -> anyhow::Result<()> {
    let _guard = init_tracing();
    and_xor_four_bits(TestChannel::InMemory, TestMtProvider::Insecure).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn four_bits_tcp_ot() -> anyhow::Result<()> {
    let _guard = init_tracing();
    and_xor_four_bits(TestChannel::Tcp, TestMtProvider::Ot).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn random_inputs_match_reference() -> anyhow::Result<()> {
    let _guard = init_tracing();
    let (mut p1, mut p2) = init_party_pair(TestChannel::InMemory, TestMtProvider::Ot).await?;
    let mut rng = ChaCha20Rng::seed_from_u64(1234);
    for _ in 0..100 {
        let x = BitVector::random(128, &mut rng);
        let y = BitVector::random(128, &mut rng);
        let [(x1, y1), (x2, y2)] = share_inputs(&mut p1, &mut p2, &x, &y).await?;

        let (and1, and2) = tokio::try_join!(p1.and(&x1, &y1), p2.and(&x2, &y2))?;
        let (or1, or2) = tokio::try_join!(p1.or(&x1, &y1), p2.or(&x2, &y2))?;
        let xor1 = p1.xor(&x1, &y1)?;
        let xor2 = p2.xor(&x2, &y2)?;
        let not1 = p1.not(&x1)?;
        let not2 = p2.not(&x2)?;

        assert_eq!(x.and(&y), reveal(&mut p1, &mut p2, &and1, &and2).await?);
        assert_eq!(x.xor(&y), reveal(&mut p1, &mut p2, &xor1, &xor2).await?);
        let or = x.xor(&y).xor(&x.and(&y));
        assert_eq!(or, reveal(&mut p1, &mut p2, &or1, &or2).await?);
        assert_eq!(x.not(), reveal(&mut p1, &mut p2, &not1, &not2).await?);
    }
    Ok(())
}

#[tokio::test]
async fn mixed_plain_and_secret() -> anyhow::Result<()> {
    let _guard = init_tracing();
    let (mut p1, mut p2) = init_party_pair(TestChannel::InMemory, TestMtProvider::Dealer).await?;
    let x = bits("110010");
    let plain = ShareVector::plain(bits("011011"));
    let [(x1, _), (x2, _)] = share_inputs(&mut p1, &mut p2, &x, &BitVector::zeros(0)).await?;

    let (and1, and2) = tokio::try_join!(p1.and(&x1, &plain), p2.and(&plain, &x2))?;
    assert!(and1.is_secret());
    assert_eq!(bits("010010"), reveal(&mut p1, &mut p2, &and1, &and2).await?);

    let xor1 = p1.xor(&plain, &x1)?;
    let xor2 = p2.xor(&x2, &plain)?;
    assert_eq!(bits("101001"), reveal(&mut p1, &mut p2, &xor1, &xor2).await?);

    let (or1, or2) = tokio::try_join!(p1.or(&x1, &plain), p2.or(&x2, &plain))?;
    assert_eq!(bits("111011"), reveal(&mut p1, &mut p2, &or1, &or2).await?);
    Ok(())
}

#[tokio::test]
async fn and_batch_matches_single_ands() -> anyhow::Result<()> {
    let _guard = init_tracing();
    let (mut p1, mut p2) = init_party_pair(TestChannel::InMemory, TestMtProvider::Dealer).await?;
    let mut rng = ChaCha20Rng::seed_from_u64(5);
    let inputs: Vec<_> = [3, 17, 64, 1]
        .into_iter()
        .map(|len| {
            (
                BitVector::random(len, &mut rng),
                BitVector::random(len, &mut rng),
            )
        })
        .collect();
    let mut pairs1 = vec![];
    let mut pairs2 = vec![];
    for (x, y) in &inputs {
        let [shares1, shares2] = share_inputs(&mut p1, &mut p2, x, y).await?;
        pairs1.push(shares1);
        pairs2.push(shares2);
    }
    // a plain operand in between
    let plain = bits("1011");
    pairs1.insert(1, (ShareVector::plain(plain.clone()), ShareVector::plain(plain.clone())));
    pairs2.insert(1, (ShareVector::plain(plain.clone()), ShareVector::plain(plain.clone())));

    let sent = p1.channel().stats().packets_sent();
    let (out1, out2) = tokio::try_join!(p1.and_batch(&pairs1), p2.and_batch(&pairs2))?;
    // a single Beaver round for all secret pairs
    assert_eq!(sent + 1, p1.channel().stats().packets_sent());
    assert!(out1[1].is_plain());
    assert_eq!(&plain, out1[1].bits());

    let (revealed, _) = tokio::try_join!(p1.reveal_own_batch(&out1), p2.reveal_other_batch(&out2))?;
    let expected: Vec<_> = inputs.iter().map(|(x, y)| x.and(y)).collect();
    assert_eq!(expected[0], revealed[0]);
    assert_eq!(expected[1..], revealed[2..]);

    let xors1 = p1.xor_batch(&pairs1)?;
    let xors2 = p2.xor_batch(&pairs2)?;
    let (revealed, _) = tokio::try_join!(
        p1.reveal_own_batch(&xors1),
        p2.reveal_other_batch(&xors2)
    )?;
    assert_eq!(BitVector::zeros(4), revealed[1]);
    assert_eq!(inputs[2].0.xor(&inputs[2].1), revealed[3]);
    Ok(())
}
