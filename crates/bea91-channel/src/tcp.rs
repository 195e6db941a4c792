//! TCP transport for [`Channel`]s.
//!
//! Packets are [bincode](https://docs.rs/bincode/1.3.1/bincode/) serialized and sent as
//! length delimited frames.
use crate::util::{TrackingReader, TrackingWriter};
use crate::{Channel, CommStatistics, DataPacket, PartyId};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::time::Instant;
use tokio_serde::formats::SymmetricalBincode;
use tokio_serde::SymmetricallyFramed;
use tokio_util::codec::LengthDelimitedCodec;
use tracing::info;

const MAX_FRAME_LENGTH: usize = 256 * 1024 * 1024;

/// Network configuration of one party. The [`PartyId::FIRST`] party listens on `address`,
/// the [`PartyId::SECOND`] party connects to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpConfig {
    pub own: PartyId,
    pub address: SocketAddr,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    30
}

/// Establish the connection described by `config`.
#[tracing::instrument(err)]
pub async fn establish(config: &TcpConfig) -> Result<Channel, io::Error> {
    match config.own {
        PartyId::FIRST => listen(config.own, config.address).await,
        PartyId::SECOND => {
            let timeout = Duration::from_secs(config.connect_timeout_secs);
            connect_with_timeout(config.own, config.address, timeout).await
        }
        PartyId(illegal) => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Illegal party id {illegal}"),
        )),
    }
}

#[tracing::instrument(err)]
pub async fn listen(own: PartyId, addr: impl ToSocketAddrs + Debug) -> Result<Channel, io::Error> {
    info!("Listening for connections");
    let listener = TcpListener::bind(addr).await?;
    let (socket, remote_addr) = listener.accept().await?;
    info!(?remote_addr, "Established connection to remote");
    from_tcp_stream(own, socket)
}

#[tracing::instrument(err)]
pub async fn connect(
    own: PartyId,
    remote_addr: impl ToSocketAddrs + Debug,
) -> Result<Channel, io::Error> {
    info!("Connecting to remote");
    let socket = TcpStream::connect(remote_addr).await?;
    info!("Established connection to remote");
    from_tcp_stream(own, socket)
}

/// Connect to remote and retry upon failure for `timeout` time.
#[tracing::instrument(err)]
pub async fn connect_with_timeout(
    own: PartyId,
    remote_addr: impl ToSocketAddrs + Debug,
    timeout: Duration,
) -> Result<Channel, io::Error> {
    info!("Connecting to remote with timeout {timeout:?}");
    let mut wait = Duration::from_millis(10);
    let exp_wait_factor = 1.2;
    let start = Instant::now();
    let mut last_err = None;
    while start.elapsed() < timeout {
        match TcpStream::connect(&remote_addr).await {
            Ok(socket) => {
                info!("Established connection to remote");
                return from_tcp_stream(own, socket);
            }
            Err(err) => {
                last_err = Some(err);
                tokio::time::sleep(wait).await;
                wait = Duration::from_millis((wait.as_millis() as f64 * exp_wait_factor) as u64);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::TimedOut, "Connecting to remote timed out")
    }))
}

/// For testing purposes. Create two parties communicating via TcpStreams on localhost:port
/// If None is supplied, a random available port is selected
pub async fn new_local_pair(port: Option<u16>) -> Result<(Channel, Channel), io::Error> {
    // use port 0 to bind to available random one
    let mut port = port.unwrap_or(0);
    let addr = (Ipv4Addr::LOCALHOST, port);
    let listener = TcpListener::bind(addr).await?;
    if port == 0 {
        // get the actual port bound to
        port = listener.local_addr()?.port();
    }
    let addr = (Ipv4Addr::LOCALHOST, port);
    let accept = async {
        let (socket, _) = listener.accept().await?;
        Ok(socket)
    };
    let (server, client) = tokio::try_join!(accept, TcpStream::connect(addr))?;
    Ok((
        from_tcp_stream(PartyId::FIRST, server)?,
        from_tcp_stream(PartyId::SECOND, client)?,
    ))
}

fn from_tcp_stream(own: PartyId, socket: TcpStream) -> Result<Channel, io::Error> {
    // send data ASAP
    socket.set_nodelay(true)?;
    let stats = CommStatistics::default();
    let (read_half, write_half) = socket.into_split();
    let mut codec = LengthDelimitedCodec::builder();
    codec.max_frame_length(MAX_FRAME_LENGTH);
    let framed_read = codec.new_read(TrackingReader::new(read_half, stats.wire_bytes_read()));
    let framed_write = codec.new_write(TrackingWriter::new(
        write_half,
        stats.wire_bytes_written(),
    ));
    // Deserialize frames
    let receiver =
        SymmetricallyFramed::new(framed_read, SymmetricalBincode::<DataPacket>::default());
    let sender =
        SymmetricallyFramed::new(framed_write, SymmetricalBincode::<DataPacket>::default());
    Ok(Channel::with_statistics(own, sender, receiver, stats))
}
