//! # Snoop Dispatcher
//!
//! Passive observers of bus traffic. Every frame the read loop decodes is offered
//! here, whether or not it also completed a transaction. A registration matches
//! when the frame's source address lies in `[low, high]` (inclusive) and, for
//! response registrations, the frame is an ACK06 read response. Matching
//! handlers run in registration order.
//!
//! Dispatch runs inline on the read task. Handlers must be short and must not
//! block: while a handler runs, no further frames are processed and pending
//! transactions cannot complete. Slow dispatch passes are reported with a
//! rate-limited warning.

use crate::bus::frame::{InfinityFrame, Op};
use crate::util::logging::LogThrottle;
use log::warn;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Callback invoked for each matching frame.
pub type SnoopHandler = Box<dyn Fn(&InfinityFrame) + Send + Sync>;

/// Dispatch passes slower than this are logged.
pub const SLOW_DISPATCH: Duration = Duration::from_millis(10);

struct Registration {
    low: u16,
    high: u16,
    op: Option<Op>,
    handler: SnoopHandler,
}

impl Registration {
    fn matches(&self, frame: &InfinityFrame) -> bool {
        (self.low..=self.high).contains(&frame.src) && self.op.map_or(true, |op| op == frame.op)
    }
}

/// Registry of address-range observers.
pub struct SnoopDispatcher {
    registrations: RwLock<Vec<Arc<Registration>>>,
    slow_log: Mutex<LogThrottle>,
    delivered: AtomicU64,
}

impl Default for SnoopDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl SnoopDispatcher {
    pub fn new() -> Self {
        SnoopDispatcher {
            registrations: RwLock::new(Vec::new()),
            slow_log: Mutex::new(LogThrottle::new(60_000, 5)),
            delivered: AtomicU64::new(0),
        }
    }

    /// Observes every frame whose source address is in `[low, high]`.
    pub fn register_range<F>(&self, low: u16, high: u16, handler: F)
    where
        F: Fn(&InfinityFrame) + Send + Sync + 'static,
    {
        self.register(low, high, None, Box::new(handler));
    }

    /// Observes ACK06 responses whose source address is in `[low, high]`.
    pub fn register_response_range<F>(&self, low: u16, high: u16, handler: F)
    where
        F: Fn(&InfinityFrame) + Send + Sync + 'static,
    {
        self.register(low, high, Some(Op::Ack06), Box::new(handler));
    }

    fn register(&self, low: u16, high: u16, op: Option<Op>, handler: SnoopHandler) {
        let mut regs = self
            .registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        regs.push(Arc::new(Registration {
            low,
            high,
            op,
            handler,
        }));
    }

    /// Delivers `frame` to every matching handler. Returns how many ran.
    pub fn dispatch(&self, frame: &InfinityFrame) -> usize {
        // Snapshot so a handler may register further observers without deadlocking.
        let matching: Vec<Arc<Registration>> = self
            .registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|reg| reg.matches(frame))
            .cloned()
            .collect();

        if matching.is_empty() {
            return 0;
        }

        let started = Instant::now();
        for reg in &matching {
            (reg.handler)(frame);
        }
        let elapsed = started.elapsed();
        if elapsed > SLOW_DISPATCH {
            let mut throttle = self.slow_log.lock().unwrap_or_else(PoisonError::into_inner);
            if throttle.allow() {
                warn!(
                    "snoop handlers for frame from 0x{:04X} took {:?}; read loop stalled",
                    frame.src, elapsed
                );
            }
        }

        self.delivered
            .fetch_add(matching.len() as u64, Ordering::Relaxed);
        matching.len()
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total handler invocations so far.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}
