//! Mock serial link for testing
//!
//! [`MockSerialPort::pair`] returns one end of an in-memory duplex stream for the
//! transport under test and a [`MockSerialPort`] driving the other end. The mock
//! plays the rest of the bus: it can inject arbitrary traffic, observe the
//! frames the transport writes, and answer READ_TABLE requests from a table
//! map.
//!
//! [`FailingPort`] is a link that delivers some bytes and then fails, the way
//! a USB adapter does when it is unplugged.

use crate::bus::frame::{InfinityFrame, Op};
use crate::bus::reassembly::{FrameReassembler, Reassembled};
use crate::constants::TABLE_ADDRESS_LEN;
use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use tokio::io::{
    AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf, ReadHalf, WriteHalf,
};
use tokio::task::JoinHandle;

type TableKey = (u16, [u8; TABLE_ADDRESS_LEN]);

/// The far end of a simulated bus.
pub struct MockSerialPort {
    rx: tokio::sync::Mutex<(ReadHalf<DuplexStream>, FrameReassembler)>,
    tx: tokio::sync::Mutex<WriteHalf<DuplexStream>>,
    tables: Mutex<HashMap<TableKey, Vec<u8>>>,
    requests_seen: AtomicUsize,
}

impl MockSerialPort {
    /// Creates a linked pair: the stream goes to the transport, the mock drives it.
    pub fn pair() -> (DuplexStream, Arc<MockSerialPort>) {
        let (ours, theirs) = tokio::io::duplex(4096);
        let (rx, tx) = tokio::io::split(theirs);
        let mock = MockSerialPort {
            rx: tokio::sync::Mutex::new((rx, FrameReassembler::new())),
            tx: tokio::sync::Mutex::new(tx),
            tables: Mutex::new(HashMap::new()),
            requests_seen: AtomicUsize::new(0),
        };
        (ours, Arc::new(mock))
    }

    /// Sets the table bytes `device` answers with for `table`.
    pub fn set_table(&self, device: u16, table: [u8; TABLE_ADDRESS_LEN], data: Vec<u8>) {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((device, table), data);
    }

    /// Writes a frame onto the simulated bus.
    pub async fn inject(&self, frame: &InfinityFrame) -> io::Result<()> {
        let bytes = frame
            .encode()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        self.inject_raw(&bytes).await
    }

    /// Writes raw bytes, for example line noise or corrupted frames.
    pub async fn inject_raw(&self, bytes: &[u8]) -> io::Result<()> {
        let mut tx = self.tx.lock().await;
        tx.write_all(bytes).await?;
        tx.flush().await
    }

    /// Next valid frame written by the transport, or `None` once it hangs up.
    pub async fn next_frame(&self) -> Option<InfinityFrame> {
        let mut guard = self.rx.lock().await;
        let (reader, reassembler) = &mut *guard;
        let mut buf = [0u8; 256];
        loop {
            while let Some(out) = reassembler.next_frame() {
                if let Reassembled::Frame(frame) = out {
                    return Some(frame);
                }
            }
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => return None,
                Ok(n) => reassembler.push(&buf[..n]),
            }
        }
    }

    /// Answers READ_TABLE requests from the table map until the transport hangs up.
    /// Requests for unknown tables are left unanswered.
    pub fn serve(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(request) = self.next_frame().await {
                if request.op != Op::ReadTable {
                    continue;
                }
                self.requests_seen.fetch_add(1, Ordering::SeqCst);
                let Some(table) = request.table_address() else {
                    continue;
                };
                let data = self
                    .tables
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(&(request.dst, table))
                    .cloned();
                if let Some(data) = data {
                    let mut payload = table.to_vec();
                    payload.extend_from_slice(&data);
                    let response = InfinityFrame::new(request.dst, request.src, Op::Ack06, payload);
                    if self.inject(&response).await.is_err() {
                        break;
                    }
                }
            }
        })
    }

    /// Number of READ_TABLE requests observed by [`serve`](Self::serve).
    pub fn requests_seen(&self) -> usize {
        self.requests_seen.load(Ordering::SeqCst)
    }
}

/// A link that yields `pending` once, then fails every read with
/// "device disconnected". Writes are accepted and discarded.
pub struct FailingPort {
    pending: Option<Vec<u8>>,
}

impl FailingPort {
    pub fn new(pending: Vec<u8>) -> Self {
        FailingPort {
            pending: Some(pending),
        }
    }
}

impl AsyncRead for FailingPort {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.pending.take() {
            Some(bytes) => {
                let n = bytes.len().min(buf.remaining());
                buf.put_slice(&bytes[..n]);
                if n < bytes.len() {
                    self.pending = Some(bytes[n..].to_vec());
                }
                Poll::Ready(Ok(()))
            }
            None => Poll::Ready(Err(io::Error::other("device disconnected"))),
        }
    }
}

impl AsyncWrite for FailingPort {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
