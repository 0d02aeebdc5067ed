//! # Read Transactions
//!
//! A transaction writes a READ_TABLE request for a `(device, table)` pair and
//! waits for the ACK06 response carrying the same table address.
//!
//! Only one transaction is outstanding at a time. Concurrent callers queue on
//! an async mutex, so a response can never be attributed to the wrong request.
//! The read loop hands every decoded frame to [`TransactionManager::offer`];
//! the outstanding request, if any, claims it through a oneshot channel.

use crate::bus::frame::{InfinityFrame, Op};
use crate::bus::serial::BusWriter;
use crate::constants::TABLE_ADDRESS_LEN;
use crate::error::TransactionError;
use crate::tables::{Device, DeviceTableAddress, Table};
use log::{debug, trace};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;

/// Timing of a single transaction.
#[derive(Debug, Clone)]
pub struct TransactionConfig {
    /// How long to wait for a response after each write.
    pub response_timeout: Duration,
    /// Number of times the request is written before giving up.
    pub attempts: u32,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        TransactionConfig {
            response_timeout: Duration::from_millis(500),
            attempts: 2,
        }
    }
}

impl TransactionConfig {
    /// Upper bound on the duration of one transaction.
    pub fn deadline(&self) -> Duration {
        self.response_timeout * self.attempts.max(1)
    }
}

/// Snapshot of transaction counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransactionStats {
    pub requests: u64,
    pub successes: u64,
    pub timeouts: u64,
    pub schema_mismatches: u64,
}

struct Pending {
    device: u16,
    table: [u8; TABLE_ADDRESS_LEN],
    reply: oneshot::Sender<InfinityFrame>,
}

/// Clears the pending slot when a transaction ends, including on cancellation.
struct PendingGuard<'a>(&'a Mutex<Option<Pending>>);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    successes: AtomicU64,
    timeouts: AtomicU64,
    schema_mismatches: AtomicU64,
}

/// Issues addressed reads and matches their responses.
pub struct TransactionManager {
    writer: Arc<BusWriter>,
    config: TransactionConfig,
    source: u16,
    in_flight: tokio::sync::Mutex<()>,
    pending: Mutex<Option<Pending>>,
    counters: Counters,
}

impl TransactionManager {
    pub fn new(writer: Arc<BusWriter>, config: TransactionConfig) -> Self {
        TransactionManager {
            writer,
            config,
            source: Device::Sam.address(),
            in_flight: tokio::sync::Mutex::new(()),
            pending: Mutex::new(None),
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    /// Reads and decodes table `T`.
    ///
    /// Fails with [`TransactionError::Timeout`] if no matching response arrives
    /// within [`TransactionConfig::deadline`], and with
    /// [`TransactionError::SchemaMismatch`] if the response is too short for `T`.
    pub async fn read<T: Table>(&self) -> Result<T, TransactionError> {
        let response = self.request(T::ADDRESS).await?;
        match T::from_table_data(response.table_data()) {
            Ok(table) => {
                self.counters.successes.fetch_add(1, Ordering::Relaxed);
                Ok(table)
            }
            Err(err) => {
                self.counters
                    .schema_mismatches
                    .fetch_add(1, Ordering::Relaxed);
                debug!("{}: {}", T::ADDRESS, err);
                Err(err)
            }
        }
    }

    /// Reads table `T` into `out`. Returns `false` on any failure, leaving `out` untouched.
    pub async fn read_into<T: Table>(&self, out: &mut T) -> bool {
        match self.read::<T>().await {
            Ok(table) => {
                *out = table;
                true
            }
            Err(_) => false,
        }
    }

    /// Writes a READ_TABLE request and returns the raw matching response.
    pub async fn request(
        &self,
        address: DeviceTableAddress,
    ) -> Result<InfinityFrame, TransactionError> {
        let _turn = self.in_flight.lock().await;
        self.counters.requests.fetch_add(1, Ordering::Relaxed);

        let device = address.device.address();
        let table = address.table.bytes();
        let request = InfinityFrame::read_request(self.source, device, table);

        let (reply, mut response) = oneshot::channel();
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(Pending {
            device,
            table,
            reply,
        });
        let _clear = PendingGuard(&self.pending);

        // Each attempt's budget covers the write as well, so a stalled port
        // cannot hold the bus past the deadline.
        let attempts = self.config.attempts.max(1);
        for attempt in 1..=attempts {
            let exchange = self.exchange(&request, &mut response);
            match timeout(self.config.response_timeout, exchange).await {
                Ok(Ok(Some(frame))) => {
                    trace!("{address}: response on attempt {attempt}");
                    return Ok(frame);
                }
                Ok(Ok(None)) => break,
                Ok(Err(err)) => return Err(err),
                Err(_) => debug!("{address}: no response (attempt {attempt}/{attempts})"),
            }
        }

        self.counters.timeouts.fetch_add(1, Ordering::Relaxed);
        Err(TransactionError::Timeout {
            device,
            table: address.table.to_string(),
        })
    }

    /// Writes `request` and waits for the reply. `None` if the reply channel closed.
    async fn exchange(
        &self,
        request: &InfinityFrame,
        response: &mut oneshot::Receiver<InfinityFrame>,
    ) -> Result<Option<InfinityFrame>, TransactionError> {
        self.writer
            .write_frame(request)
            .await
            .map_err(|e| TransactionError::Bus(e.to_string()))?;
        Ok(response.await.ok())
    }

    /// Offers a received frame to the outstanding request. Returns `true` if it
    /// completed that request.
    pub fn offer(&self, frame: &InfinityFrame) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let matched = pending.as_ref().is_some_and(|p| {
            frame.op == Op::Ack06
                && frame.src == p.device
                && frame.dst == self.source
                && frame.table_address() == Some(p.table)
        });
        if !matched {
            return false;
        }
        match pending.take() {
            Some(p) => p.reply.send(frame.clone()).is_ok(),
            None => false,
        }
    }

    /// Whether a request is waiting for its response.
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn stats(&self) -> TransactionStats {
        TransactionStats {
            requests: self.counters.requests.load(Ordering::Relaxed),
            successes: self.counters.successes.load(Ordering::Relaxed),
            timeouts: self.counters.timeouts.load(Ordering::Relaxed),
            schema_mismatches: self.counters.schema_mismatches.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEVICE_SAM;
    use crate::tables::TableId;

    fn manager() -> TransactionManager {
        TransactionManager::new(
            Arc::new(BusWriter::new(tokio::io::sink())),
            TransactionConfig::default(),
        )
    }

    #[test]
    fn test_deadline() {
        let config = TransactionConfig {
            response_timeout: Duration::from_millis(300),
            attempts: 3,
        };
        assert_eq!(config.deadline(), Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_writer_times_out() {
        // Far end kept open but never read: the second write blocks.
        let (near, _far) = tokio::io::duplex(8);
        let m = TransactionManager::new(
            Arc::new(BusWriter::new(near)),
            TransactionConfig::default(),
        );
        let address = DeviceTableAddress {
            device: Device::Thermostat,
            table: TableId::TStatZoneParams,
        };

        let started = tokio::time::Instant::now();
        let err = m.request(address).await.unwrap_err();
        assert!(matches!(err, TransactionError::Timeout { device: 0x2001, .. }));
        assert!(started.elapsed() <= m.config().deadline());
        assert!(!m.is_pending());
    }

    #[test]
    fn test_offer_without_pending() {
        let m = manager();
        let frame = InfinityFrame::new(0x2001, DEVICE_SAM, Op::Ack06, vec![0x00, 0x3b, 0x02]);
        assert!(!m.offer(&frame));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_against_silent_bus() {
        let m = manager();
        let address = DeviceTableAddress {
            device: Device::Thermostat,
            table: TableId::TStatCurrentParams,
        };
        let err = m.request(address).await.unwrap_err();
        assert!(matches!(err, TransactionError::Timeout { device: 0x2001, .. }));
        assert!(!m.is_pending());
        assert_eq!(m.stats().timeouts, 1);
        assert_eq!(m.stats().requests, 1);
    }
}
