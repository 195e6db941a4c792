//! In-memory channels for testing.
use crate::{Channel, PartyId};
use futures::channel::mpsc::unbounded;
use futures::StreamExt;
use std::convert::Infallible;

/// Create a connected pair of channels backed by unbounded in-memory queues. The first
/// channel belongs to [`PartyId::FIRST`], the second one to [`PartyId::SECOND`].
///
/// Must be called within a tokio runtime.
pub fn new_pair() -> (Channel, Channel) {
    let (s1, r1) = unbounded();
    let (s2, r2) = unbounded();
    let ch1 = Channel::new(PartyId::FIRST, s1, r2.map(Ok::<_, Infallible>));
    let ch2 = Channel::new(PartyId::SECOND, s2, r1.map(Ok::<_, Infallible>));
    (ch1, ch2)
}

#[cfg(test)]
mod tests {
    use crate::{in_memory, PartyId, PtoDesc};

    #[tokio::test]
    async fn pair_has_distinct_parties() -> anyhow::Result<()> {
        let (ch1, ch2) = in_memory::new_pair();
        assert_eq!(PartyId::FIRST, ch1.own_party());
        assert_eq!(PartyId::SECOND, ch2.own_party());
        assert_eq!(ch1.own_party(), ch2.other_party());

        let pto = PtoDesc::new(1, "PING");
        ch2.send(ch2.outgoing(3, &pto, 0, 0), vec![vec![0xAB; 16], vec![]])
            .await?;
        let payload = ch1.receive(ch1.incoming(3, &pto, 0, 0)).await?;
        assert_eq!(vec![vec![0xAB; 16], vec![]], payload);
        assert_eq!(1, ch2.stats().packets_sent());
        assert_eq!(1, ch1.stats().packets_received());
        assert_eq!(16, ch1.stats().snapshot().payload_bytes_received);
        Ok(())
    }
}
