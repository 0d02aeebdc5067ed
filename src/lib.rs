//! # infinity-bus - Bus Protocol Engine for Infinity HVAC Controllers
//!
//! The infinity-bus crate talks to the RS-485 bus that connects an Infinity
//! thermostat, air handler and heat pump, and keeps a consistent, concurrently
//! readable snapshot of the system state.
//!
//! ## Features
//!
//! - Decode and encode bus frames with CRC-16 integrity checking
//! - Issue addressed table reads and wait for the matching response
//! - Passively snoop telemetry that is never explicitly requested
//! - Merge both sources into a thread-safe, last-value-wins state cache
//! - Poll the thermostat on a fixed interval
//! - Serve the cached state as JSON
//!
//! ## Usage
//!
//! ```rust,no_run
//! use infinity_bus::{BusConfig, Gateway};
//!
//! # async fn run() -> Result<(), infinity_bus::InfinityError> {
//! let gateway = Gateway::open("/dev/ttyUSB0", &BusConfig::default())?;
//! if let Some(hp) = gateway.state().get_heat_pump_state() {
//!     println!("coil {} outside {}", hp.coil_temp, hp.outside_temp);
//! }
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod cache;
pub mod config;
pub mod constants;
pub mod decode;
pub mod error;
pub mod gateway;
pub mod http;
pub mod logging;
pub mod poller;
pub mod snoops;
pub mod state;
pub mod tables;
pub mod util;

pub use crate::error::{FrameError, InfinityError, TransactionError};
pub use crate::logging::{init_logger, log_info};

pub use bus::{BusTransport, InfinityFrame, Op, SnoopDispatcher, TransactionManager};
pub use cache::{CacheEntry, StateCache};
pub use config::BusConfig;
pub use decode::{AirHandlerTelemetry, DomainRecord, HeatPumpTelemetry, ThermostatZoneConfig};
pub use gateway::Gateway;
pub use poller::StatePoller;
pub use state::HvacState;
pub use tables::{Device, DeviceTableAddress, TStatCurrentParams, TStatZoneParams, Table, TableId};
