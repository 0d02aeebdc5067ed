//! # Infinity Serial Transport
//!
//! This module owns the physical link: it opens the serial device, serializes
//! all writes through one path, and runs the read loop that turns the inbound
//! byte stream into frames.
//!
//! Every frame the read loop decodes is fanned out to two independent consumers,
//! in this order:
//!
//! 1. the [`TransactionManager`], which completes the outstanding request if the
//!    frame is its response;
//! 2. the [`SnoopDispatcher`], which delivers the frame to every matching
//!    observer, whether or not step 1 claimed it.
//!
//! Invalid frames are logged and dropped; neither consumer ever sees them.

use crate::bus::frame::InfinityFrame;
use crate::bus::reassembly::{FrameReassembler, Reassembled};
use crate::bus::snoop::SnoopDispatcher;
use crate::bus::transaction::{TransactionConfig, TransactionManager};
use crate::constants::DEFAULT_BAUD_RATE;
use crate::error::InfinityError;
use crate::util::logging::{log_frame_hex, LogThrottle};
use log::{debug, error, info, trace};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_serial::SerialPortBuilderExt;

/// Configuration for the serial connection.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub baudrate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            baudrate: DEFAULT_BAUD_RATE,
        }
    }
}

/// Opens the serial device 8N1 without flow control.
///
/// Failure here is a startup precondition failure; callers should not retry.
pub fn open_serial(
    path: &str,
    config: &SerialConfig,
) -> Result<tokio_serial::SerialStream, InfinityError> {
    tokio_serial::new(path, config.baudrate)
        .data_bits(tokio_serial::DataBits::Eight)
        .stop_bits(tokio_serial::StopBits::One)
        .parity(tokio_serial::Parity::None)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| InfinityError::SerialPortError(format!("{path}: {e}")))
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// The single write path onto the bus.
pub struct BusWriter {
    port: tokio::sync::Mutex<BoxedWriter>,
    frames_written: AtomicU64,
}

impl BusWriter {
    pub fn new<W>(port: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        BusWriter {
            port: tokio::sync::Mutex::new(Box::new(port)),
            frames_written: AtomicU64::new(0),
        }
    }

    /// Encodes and writes one frame. Concurrent writers are serialized.
    pub async fn write_frame(&self, frame: &InfinityFrame) -> Result<(), InfinityError> {
        let bytes = frame.encode()?;
        let mut port = self.port.lock().await;
        port.write_all(&bytes).await?;
        port.flush().await?;
        self.frames_written.fetch_add(1, Ordering::Relaxed);
        trace!("tx {frame}");
        log_frame_hex("tx", &bytes);
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written.load(Ordering::Relaxed)
    }
}

/// Reads the inbound stream until EOF, an I/O error, or shutdown.
///
/// Returns `Ok(())` on shutdown and an error if the link fails.
pub async fn run_read_loop<R>(
    mut reader: R,
    transactions: Arc<TransactionManager>,
    snoops: Arc<SnoopDispatcher>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), InfinityError>
where
    R: AsyncRead + Unpin,
{
    let mut reassembler = FrameReassembler::new();
    let mut dropped_log = LogThrottle::new(1_000, 5);
    let mut buf = [0u8; 256];

    loop {
        let n = tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!("read loop shutting down: {:?}", reassembler.stats());
                    return Ok(());
                }
                continue;
            }
            read = reader.read(&mut buf) => match read {
                Ok(n) => n,
                Err(e) => {
                    error!("serial read failed: {e} ({:?})", reassembler.stats());
                    return Err(InfinityError::Io(e));
                }
            },
        };

        if n == 0 {
            error!("serial link closed: {:?}", reassembler.stats());
            return Err(InfinityError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        log_frame_hex("rx", &buf[..n]);
        reassembler.push(&buf[..n]);

        while let Some(out) = reassembler.next_frame() {
            match out {
                Reassembled::Frame(frame) => {
                    trace!("rx {frame}");
                    let claimed = transactions.offer(&frame);
                    let observers = snoops.dispatch(&frame);
                    if claimed || observers > 0 {
                        trace!("frame claimed={claimed} observers={observers}");
                    }
                }
                Reassembled::Dropped(err) => {
                    if dropped_log.allow() {
                        let suppressed = dropped_log.take_suppressed();
                        debug!("dropped invalid frame: {err} ({suppressed} suppressed)");
                    }
                }
            }
        }
    }
}

/// Owner of the physical link and of the consumers fed by its read loop.
pub struct BusTransport {
    writer: Arc<BusWriter>,
    transactions: Arc<TransactionManager>,
    snoops: Arc<SnoopDispatcher>,
    shutdown: watch::Sender<bool>,
    closed: watch::Receiver<bool>,
    reader: JoinHandle<Result<(), InfinityError>>,
}

impl BusTransport {
    /// Opens `path` and starts the read loop.
    pub fn open(
        path: &str,
        serial: &SerialConfig,
        transaction: TransactionConfig,
        snoops: Arc<SnoopDispatcher>,
    ) -> Result<Self, InfinityError> {
        let port = open_serial(path, serial)?;
        info!("opened {path} at {} baud", serial.baudrate);
        Ok(Self::from_port(port, transaction, snoops))
    }

    /// Starts the read loop over any byte stream. Must be called inside a tokio runtime.
    pub fn from_port<P>(
        port: P,
        transaction: TransactionConfig,
        snoops: Arc<SnoopDispatcher>,
    ) -> Self
    where
        P: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(port);
        let writer = Arc::new(BusWriter::new(writer));
        let transactions = Arc::new(TransactionManager::new(Arc::clone(&writer), transaction));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (closed_tx, closed) = watch::channel(false);

        let read_loop = run_read_loop(
            reader,
            Arc::clone(&transactions),
            Arc::clone(&snoops),
            shutdown_rx,
        );
        let reader = tokio::spawn(async move {
            let result = read_loop.await;
            let _ = closed_tx.send(true);
            result
        });

        BusTransport {
            writer,
            transactions,
            snoops,
            shutdown,
            closed,
            reader,
        }
    }

    pub fn transactions(&self) -> Arc<TransactionManager> {
        Arc::clone(&self.transactions)
    }

    pub fn snoops(&self) -> Arc<SnoopDispatcher> {
        Arc::clone(&self.snoops)
    }

    /// Writes a frame through the shared write path.
    pub async fn write(&self, frame: &InfinityFrame) -> Result<(), InfinityError> {
        self.writer.write_frame(frame).await
    }

    /// Whether the read loop has exited.
    pub fn is_closed(&self) -> bool {
        self.reader.is_finished()
    }

    /// Resolves once the read loop has exited, for any reason. The cause is
    /// returned by [`close`](Self::close).
    pub async fn closed(&self) {
        let mut closed = self.closed.clone();
        while !*closed.borrow_and_update() {
            if closed.changed().await.is_err() {
                return;
            }
        }
    }

    /// Stops the read loop and releases the link.
    pub async fn close(self) -> Result<(), InfinityError> {
        let _ = self.shutdown.send(true);
        match self.reader.await {
            Ok(result) => result,
            Err(e) => Err(InfinityError::Io(std::io::Error::other(e.to_string()))),
        }
    }
}
