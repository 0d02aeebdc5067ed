//! Runtime configuration for the bus engine.

use crate::bus::serial::SerialConfig;
use crate::bus::transaction::TransactionConfig;
use crate::error::InfinityError;
use crate::poller::PollerConfig;

/// Everything needed to bring up the bus engine.
#[derive(Debug, Clone, Default)]
pub struct BusConfig {
    pub serial: SerialConfig,
    pub transaction: TransactionConfig,
    pub poller: PollerConfig,
}

impl BusConfig {
    /// Rejects settings that would make transactions or polling meaningless.
    pub fn validate(&self) -> Result<(), InfinityError> {
        if self.serial.baudrate == 0 {
            return Err(InfinityError::Config("baud rate must be non-zero".into()));
        }
        if self.transaction.response_timeout.is_zero() {
            return Err(InfinityError::Config(
                "transaction timeout must be non-zero".into(),
            ));
        }
        if self.transaction.attempts == 0 {
            return Err(InfinityError::Config(
                "transaction attempts must be at least 1".into(),
            ));
        }
        if self.poller.interval.is_zero() {
            return Err(InfinityError::Config("poll interval must be non-zero".into()));
        }
        Ok(())
    }
}
