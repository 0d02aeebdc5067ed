//! # Gateway
//!
//! Composition of the engine: one transport, one cache, the telemetry snoops
//! and the state poller, each handed its collaborators at construction.

use crate::bus::serial::BusTransport;
use crate::bus::snoop::SnoopDispatcher;
use crate::cache::StateCache;
use crate::config::BusConfig;
use crate::decode::DomainRecord;
use crate::error::InfinityError;
use crate::poller::StatePoller;
use crate::snoops::attach_snoops;
use crate::state::HvacState;
use log::info;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A running bus engine.
pub struct Gateway {
    bus: BusTransport,
    state: HvacState,
    poller: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl Gateway {
    /// Opens the serial device and starts the read loop and poller.
    pub fn open(path: &str, config: &BusConfig) -> Result<Self, InfinityError> {
        config.validate()?;
        let cache = Arc::new(StateCache::new());
        let snoops = Arc::new(SnoopDispatcher::new());
        attach_snoops(&snoops, Arc::clone(&cache));
        let bus = BusTransport::open(path, &config.serial, config.transaction.clone(), snoops)?;
        Ok(Self::start(bus, cache, config))
    }

    /// Same as [`open`](Self::open) over an already connected byte stream.
    pub fn from_port<P>(port: P, config: &BusConfig) -> Result<Self, InfinityError>
    where
        P: AsyncRead + AsyncWrite + Send + 'static,
    {
        config.validate()?;
        let cache = Arc::new(StateCache::new());
        let snoops = Arc::new(SnoopDispatcher::new());
        attach_snoops(&snoops, Arc::clone(&cache));
        let bus = BusTransport::from_port(port, config.transaction.clone(), snoops);
        Ok(Self::start(bus, cache, config))
    }

    fn start(bus: BusTransport, cache: Arc<StateCache<DomainRecord>>, config: &BusConfig) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let poller = StatePoller::new(bus.transactions(), Arc::clone(&cache), config.poller.clone())
            .spawn(shutdown_rx);
        info!("state poller running every {:?}", config.poller.interval);
        Gateway {
            bus,
            state: HvacState::new(cache),
            poller,
            shutdown,
        }
    }

    pub fn state(&self) -> HvacState {
        self.state.clone()
    }

    pub fn bus(&self) -> &BusTransport {
        &self.bus
    }

    /// Resolves when the serial link is gone. The cached state stops updating
    /// at that point; [`shutdown`](Self::shutdown) returns the link error.
    pub async fn closed(&self) {
        self.bus.closed().await
    }

    /// Stops the poller, then the read loop.
    pub async fn shutdown(self) -> Result<(), InfinityError> {
        let _ = self.shutdown.send(true);
        let _ = self.poller.await;
        info!(
            "stopping bus: {:?}, {} snooped frames delivered",
            self.bus.transactions().stats(),
            self.bus.snoops().delivered()
        );
        self.bus.close().await
    }
}
