//! Header addressed message passing between the two parties of a protocol.
//!
//! A [`Channel`] transports [`Payload`]s, i.e. sequences of byte vectors, each tagged with a
//! [`DataPacketHeader`]. The header identifies the task, the protocol, the protocol step,
//! a sequence counter and the sending and receiving party. [`Channel::receive`] returns the
//! payload of the packet whose header is **equal** to the requested one. Packets which
//! arrive before they are requested are buffered by a background task, so that multiple
//! protocols (e.g. the two directions of an oblivious transfer) can share one connection
//! without interfering with each other.
//!
//! Channels are created in pairs via [`in_memory::new_pair`] for tests, or via the
//! functions in [`tcp`] for actual network communication. Creating a channel spawns a tokio
//! task and must therefore happen within a tokio runtime.
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::pin::Pin;
use std::sync::Arc;

use futures::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tracing::{debug, trace, warn};

pub use util::{CommStatistics, Counter};

pub mod in_memory;
pub mod tcp;
pub mod util;

/// The content of a packet.
pub type Payload = Vec<Vec<u8>>;

pub type BoxError = Box<dyn Error + Send + Sync>;

/// Identifies one of the two parties.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartyId(pub u32);

/// Static description of a protocol. The `id` is written into the header of every packet
/// of the protocol and must be unique among the protocols sharing a [`Channel`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PtoDesc {
    pub id: u64,
    pub name: &'static str,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataPacketHeader {
    pub task_id: u64,
    pub pto_id: u64,
    /// Ordinal of the protocol step.
    pub step_id: u32,
    /// Sequence counter which disambiguates repeated executions of the same step.
    pub extra_info: u64,
    pub sender_id: PartyId,
    pub receiver_id: PartyId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataPacket {
    pub header: DataPacketHeader,
    pub payload: Payload,
}

#[derive(Error, Debug)]
pub enum CommunicationError {
    #[error("Error sending value")]
    Send(#[source] BoxError),
    #[error("Error receiving value")]
    Receive(#[source] BoxError),
    #[error("The other party terminated the connection")]
    UnexpectedTermination,
}

type PacketSink = Pin<Box<dyn Sink<DataPacket, Error = CommunicationError> + Send>>;
type PacketStream = Pin<Box<dyn Stream<Item = Result<DataPacket, CommunicationError>> + Send>>;

/// One party's end of a two-party connection.
///
/// `Channel` is a cheap handle, clones refer to the same connection. The connection is
/// closed once every clone is dropped.
#[derive(Clone)]
pub struct Channel {
    own: PartyId,
    sink: Arc<AsyncMutex<PacketSink>>,
    routing: Arc<Mutex<Routing>>,
    stats: CommStatistics,
}

#[derive(Default)]
struct Routing {
    waiting: HashMap<DataPacketHeader, oneshot::Sender<Payload>>,
    arrived: HashMap<DataPacketHeader, VecDeque<Payload>>,
    closed: bool,
}

impl PartyId {
    pub const FIRST: PartyId = PartyId(0);
    pub const SECOND: PartyId = PartyId(1);

    /// Returns the id of the peer.
    ///
    /// # Panics
    /// Panics if `self` is neither 0 nor 1.
    pub fn other(self) -> Self {
        match self.0 {
            0 => Self::SECOND,
            1 => Self::FIRST,
            illegal => panic!("Illegal party id {illegal}. Must be 0 or 1."),
        }
    }
}

impl Display for PartyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}", self.0)
    }
}

impl PtoDesc {
    pub const fn new(id: u64, name: &'static str) -> Self {
        Self { id, name }
    }
}

impl Channel {
    /// Create a new channel from a sink and stream of [`DataPacket`]s.
    ///
    /// Spawns the task which routes incoming packets, therefore this must be called
    /// within a tokio runtime.
    pub fn new<Si, St, SiErr, StErr>(own: PartyId, sink: Si, stream: St) -> Self
    where
        Si: Sink<DataPacket, Error = SiErr> + Send + 'static,
        St: Stream<Item = Result<DataPacket, StErr>> + Send + 'static,
        SiErr: Error + Send + Sync + 'static,
        StErr: Error + Send + Sync + 'static,
    {
        Self::with_statistics(own, sink, stream, CommStatistics::default())
    }

    pub fn with_statistics<Si, St, SiErr, StErr>(
        own: PartyId,
        sink: Si,
        stream: St,
        stats: CommStatistics,
    ) -> Self
    where
        Si: Sink<DataPacket, Error = SiErr> + Send + 'static,
        St: Stream<Item = Result<DataPacket, StErr>> + Send + 'static,
        SiErr: Error + Send + Sync + 'static,
        StErr: Error + Send + Sync + 'static,
    {
        let sink: PacketSink =
            Box::pin(sink.sink_map_err(|err| CommunicationError::Send(Box::new(err))));
        let stream: PacketStream = Box::pin(
            stream.map(|res| res.map_err(|err| CommunicationError::Receive(Box::new(err)))),
        );
        let routing = Arc::new(Mutex::new(Routing::default()));
        tokio::spawn(dispatch(own, stream, routing.clone(), stats.clone()));
        Self {
            own,
            sink: Arc::new(AsyncMutex::new(sink)),
            routing,
            stats,
        }
    }

    pub fn own_party(&self) -> PartyId {
        self.own
    }

    pub fn other_party(&self) -> PartyId {
        self.own.other()
    }

    pub fn stats(&self) -> &CommStatistics {
        &self.stats
    }

    /// Header for a packet sent by this party.
    pub fn outgoing(
        &self,
        task_id: u64,
        pto: &PtoDesc,
        step_id: u32,
        extra_info: u64,
    ) -> DataPacketHeader {
        DataPacketHeader {
            task_id,
            pto_id: pto.id,
            step_id,
            extra_info,
            sender_id: self.own,
            receiver_id: self.other_party(),
        }
    }

    /// Header of a packet sent by the other party.
    pub fn incoming(
        &self,
        task_id: u64,
        pto: &PtoDesc,
        step_id: u32,
        extra_info: u64,
    ) -> DataPacketHeader {
        DataPacketHeader {
            task_id,
            pto_id: pto.id,
            step_id,
            extra_info,
            sender_id: self.other_party(),
            receiver_id: self.own,
        }
    }

    pub async fn send(
        &self,
        header: DataPacketHeader,
        payload: Payload,
    ) -> Result<(), CommunicationError> {
        debug_assert_eq!(header.sender_id, self.own, "Sending packet as other party");
        trace!(?header, "Sending packet");
        self.stats.record_sent(&payload);
        let mut sink = self.sink.lock().await;
        sink.send(DataPacket { header, payload }).await
    }

    /// Receive the payload of the packet with `header`. Waits until the packet arrives.
    ///
    /// # Panics
    /// Panics if another `receive` call for the same header is pending.
    pub async fn receive(&self, header: DataPacketHeader) -> Result<Payload, CommunicationError> {
        debug_assert_eq!(header.receiver_id, self.own, "Receiving packet as other party");
        let waiting = {
            let mut routing = self.routing.lock();
            if let Entry::Occupied(mut queue) = routing.arrived.entry(header) {
                let payload = queue
                    .get_mut()
                    .pop_front()
                    .expect("empty queues are removed");
                if queue.get().is_empty() {
                    queue.remove();
                }
                return Ok(payload);
            }
            if routing.closed {
                return Err(CommunicationError::UnexpectedTermination);
            }
            let (tx, rx) = oneshot::channel();
            match routing.waiting.entry(header) {
                // the receive future of a closed sender was dropped
                Entry::Occupied(mut entry) if entry.get().is_closed() => {
                    entry.insert(tx);
                }
                Entry::Occupied(_) => {
                    panic!("Concurrent receive for identical header {header:?}")
                }
                Entry::Vacant(entry) => {
                    entry.insert(tx);
                }
            }
            rx
        };
        trace!(?header, "Waiting for packet");
        waiting
            .await
            .map_err(|_| CommunicationError::UnexpectedTermination)
    }
}

impl Debug for Channel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("own", &self.own)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

async fn dispatch(
    own: PartyId,
    mut stream: PacketStream,
    routing: Arc<Mutex<Routing>>,
    stats: CommStatistics,
) {
    while let Some(packet) = stream.next().await {
        let DataPacket { header, payload } = match packet {
            Ok(packet) => packet,
            Err(err) => {
                warn!(%err, "Receiving packet failed. Closing channel");
                break;
            }
        };
        if header.receiver_id != own {
            warn!(?header, "Dropping packet addressed to other party");
            continue;
        }
        stats.record_received(&payload);
        let mut routing = routing.lock();
        let payload = match routing.waiting.remove(&header) {
            // the send only fails if the waiting receive was dropped
            Some(waiting) => match waiting.send(payload) {
                Ok(()) => continue,
                Err(payload) => payload,
            },
            None => payload,
        };
        trace!(?header, "Buffering packet");
        routing.arrived.entry(header).or_default().push_back(payload);
    }
    debug!(%own, "Channel closed");
    let mut routing = routing.lock();
    routing.closed = true;
    // dropping the senders wakes all pending receives
    routing.waiting.clear();
}
