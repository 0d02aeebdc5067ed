//! Periodic thermostat poller.
//!
//! Every interval the poller reads the thermostat zone and current parameter
//! tables, composes zone 1 configuration and writes it to the cache. A failed
//! cycle is skipped; the previous cached value stays authoritative and the next
//! tick retries. There is no backoff and no failure cap.

use crate::bus::transaction::TransactionManager;
use crate::cache::StateCache;
use crate::constants::KEY_THERMOSTAT;
use crate::decode::{thermostat_zone_config, DomainRecord, ThermostatZoneConfig};
use crate::error::TransactionError;
use crate::tables::{TStatCurrentParams, TStatZoneParams};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Consecutive failures between repeated warnings.
const WARN_EVERY: u64 = 30;

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        PollerConfig {
            interval: Duration::from_secs(1),
        }
    }
}

pub struct StatePoller {
    transactions: Arc<TransactionManager>,
    cache: Arc<StateCache<DomainRecord>>,
    config: PollerConfig,
    consecutive_failures: u64,
}

impl StatePoller {
    pub fn new(
        transactions: Arc<TransactionManager>,
        cache: Arc<StateCache<DomainRecord>>,
        config: PollerConfig,
    ) -> Self {
        StatePoller {
            transactions,
            cache,
            config,
            consecutive_failures: 0,
        }
    }

    /// One read-decode-store round trip.
    pub async fn poll_once(&mut self) -> Result<ThermostatZoneConfig, TransactionError> {
        let result = self.fetch().await;
        match &result {
            Ok(cfg) => {
                if self.consecutive_failures > 0 {
                    info!(
                        "thermostat reachable again after {} failed polls",
                        self.consecutive_failures
                    );
                }
                self.consecutive_failures = 0;
                self.cache
                    .update(KEY_THERMOSTAT, DomainRecord::Thermostat(cfg.clone()));
            }
            Err(err) => {
                self.consecutive_failures += 1;
                if self.consecutive_failures % WARN_EVERY == 0 {
                    warn!(
                        "thermostat poll failing: {} consecutive failures, last: {err}",
                        self.consecutive_failures
                    );
                } else {
                    debug!("thermostat poll failed: {err}");
                }
            }
        }
        result
    }

    async fn fetch(&self) -> Result<ThermostatZoneConfig, TransactionError> {
        let zone = self.transactions.read::<TStatZoneParams>().await?;
        let current = self.transactions.read::<TStatCurrentParams>().await?;
        Ok(thermostat_zone_config(&zone, &current))
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures
    }

    /// Polls until `shutdown` turns true or its sender is dropped. A poll in
    /// progress is abandoned at shutdown.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = stop_requested(&mut shutdown) => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                biased;
                _ = stop_requested(&mut shutdown) => break,
                _ = self.poll_once() => {}
            }
        }
        debug!("state poller stopped");
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

/// Resolves once `shutdown` is true or its sender is gone.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
