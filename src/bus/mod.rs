//! The bus module contains the wire protocol: frame codec and reassembly, the
//! serial transport and its read loop, read transactions, and snoop dispatch.

pub mod frame;
pub mod reassembly;
pub mod serial;
pub mod serial_mock;
pub mod snoop;
pub mod transaction;

pub use frame::{InfinityFrame, Op};
pub use serial::{BusTransport, BusWriter, SerialConfig};
pub use snoop::SnoopDispatcher;
pub use transaction::{TransactionConfig, TransactionManager, TransactionStats};
