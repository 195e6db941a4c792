//! Communication tracking.
use pin_project::pin_project;
use serde::{Serialize, Serializer};
use std::io::{self, IoSlice};
use std::ops::AddAssign;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// [AsyncWriter](`AsyncWrite`) that tracks the number of bytes written.
#[pin_project]
pub struct TrackingWriter<AsyncWriter> {
    #[pin]
    writer: AsyncWriter,
    bytes_written: Counter,
}

/// [AsyncReader](`AsyncRead`) that tracks the number of bytes read.
#[pin_project]
pub struct TrackingReader<AsyncReader> {
    #[pin]
    reader: AsyncReader,
    bytes_read: Counter,
}

#[derive(Clone, Default, Debug)]
/// A shared counter of bytes or packets. Clones refer to the same count.
pub struct Counter(Arc<AtomicUsize>);

/// Communication of a [`Channel`](crate::Channel).
///
/// Payload counters are updated for every sent and received packet. The wire counters are
/// only updated by transports which actually serialize packets, e.g. [`tcp`](crate::tcp),
/// and include framing and header overhead.
#[derive(Clone, Default, Debug)]
pub struct CommStatistics {
    packets_sent: Counter,
    packets_received: Counter,
    payload_bytes_sent: Counter,
    payload_bytes_received: Counter,
    wire_bytes_written: Counter,
    wire_bytes_read: Counter,
}

#[derive(Copy, Clone, Default, Debug, PartialEq, Eq, Serialize)]
pub struct CommSnapshot {
    pub packets_sent: usize,
    pub packets_received: usize,
    pub payload_bytes_sent: usize,
    pub payload_bytes_received: usize,
    pub wire_bytes_written: usize,
    pub wire_bytes_read: usize,
}

impl<AsyncWriter> TrackingWriter<AsyncWriter> {
    pub fn new(writer: AsyncWriter, bytes_written: Counter) -> Self {
        Self {
            writer,
            bytes_written,
        }
    }

    #[inline]
    pub fn bytes_written(&self) -> Counter {
        self.bytes_written.clone()
    }
}

impl<AsyncReader> TrackingReader<AsyncReader> {
    pub fn new(reader: AsyncReader, bytes_read: Counter) -> Self {
        Self { reader, bytes_read }
    }

    #[inline]
    pub fn bytes_read(&self) -> Counter {
        self.bytes_read.clone()
    }
}

impl<AW: AsyncWrite> AsyncWrite for TrackingWriter<AW> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize, io::Error>> {
        let this = self.project();
        let poll = this.writer.poll_write(cx, buf);
        if let Poll::Ready(Ok(bytes_written)) = &poll {
            *this.bytes_written += *bytes_written;
        }
        poll
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        self.project().writer.poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        self.project().writer.poll_shutdown(cx)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[IoSlice<'_>],
    ) -> Poll<Result<usize, io::Error>> {
        let this = self.project();
        let poll = this.writer.poll_write_vectored(cx, bufs);
        if let Poll::Ready(Ok(bytes_written)) = &poll {
            *this.bytes_written += *bytes_written;
        }
        poll
    }

    fn is_write_vectored(&self) -> bool {
        self.writer.is_write_vectored()
    }
}

impl<AR: AsyncRead> AsyncRead for TrackingReader<AR> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let bytes_before = buf.filled().len();
        let this = self.project();
        let poll = this.reader.poll_read(cx, buf);
        *this.bytes_read += buf.filled().len() - bytes_before;
        poll
    }
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    pub fn add(&self, n: usize) {
        self.0.fetch_add(n, Ordering::SeqCst);
    }

    pub fn reset(&self) -> usize {
        self.0.swap(0, Ordering::SeqCst)
    }
}

impl AddAssign<usize> for Counter {
    fn add_assign(&mut self, rhs: usize) {
        self.add(rhs);
    }
}

impl CommStatistics {
    pub(crate) fn record_sent(&self, payload: &[Vec<u8>]) {
        self.packets_sent.add(1);
        self.payload_bytes_sent.add(payload_len(payload));
    }

    pub(crate) fn record_received(&self, payload: &[Vec<u8>]) {
        self.packets_received.add(1);
        self.payload_bytes_received.add(payload_len(payload));
    }

    pub(crate) fn wire_bytes_written(&self) -> Counter {
        self.wire_bytes_written.clone()
    }

    pub(crate) fn wire_bytes_read(&self) -> Counter {
        self.wire_bytes_read.clone()
    }

    pub fn packets_sent(&self) -> usize {
        self.packets_sent.get()
    }

    pub fn packets_received(&self) -> usize {
        self.packets_received.get()
    }

    pub fn snapshot(&self) -> CommSnapshot {
        CommSnapshot {
            packets_sent: self.packets_sent.get(),
            packets_received: self.packets_received.get(),
            payload_bytes_sent: self.payload_bytes_sent.get(),
            payload_bytes_received: self.payload_bytes_received.get(),
            wire_bytes_written: self.wire_bytes_written.get(),
            wire_bytes_read: self.wire_bytes_read.get(),
        }
    }

    /// Reset all counters and return their previous values.
    pub fn reset(&self) -> CommSnapshot {
        CommSnapshot {
            packets_sent: self.packets_sent.reset(),
            packets_received: self.packets_received.reset(),
            payload_bytes_sent: self.payload_bytes_sent.reset(),
            payload_bytes_received: self.payload_bytes_received.reset(),
            wire_bytes_written: self.wire_bytes_written.reset(),
            wire_bytes_read: self.wire_bytes_read.reset(),
        }
    }
}

impl Serialize for CommStatistics {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.snapshot().serialize(serializer)
    }
}

fn payload_len(payload: &[Vec<u8>]) -> usize {
    payload.iter().map(Vec::len).sum()
}

#[cfg(test)]
mod tests {
    use super::Counter;

    #[test]
    fn counter_clones_share_count() {
        let mut cnt = Counter::new();
        let cloned = cnt.clone();
        cnt += 5;
        cloned.add(3);
        assert_eq!(8, cnt.get());
        assert_eq!(8, cloned.reset());
        assert_eq!(0, cnt.get());
    }
}
