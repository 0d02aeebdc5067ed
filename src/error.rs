//! # Infinity Bus Error Handling
//!
//! This module defines the error types that can occur in the infinity-bus crate.
//!
//! Errors are layered the same way the protocol is: [`FrameError`] covers a single
//! frame on the wire, [`TransactionError`] covers a request/response exchange, and
//! [`InfinityError`] is the crate-level error returned by the public API.

use thiserror::Error;

/// Errors produced while decoding or encoding a single bus frame.
///
/// These never leave the read loop: an invalid frame is logged and dropped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Not enough bytes for the header or for the declared payload length.
    #[error("Truncated frame: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    /// The CRC carried in the frame disagrees with the recomputed one.
    #[error("Checksum mismatch: expected 0x{expected:04X}, calculated 0x{calculated:04X}")]
    ChecksumMismatch { expected: u16, calculated: u16 },

    /// The payload does not fit in the one-byte length field.
    #[error("Payload too long: {0} bytes (max 255)")]
    PayloadTooLong(usize),
}

/// Reasons a read transaction failed.
///
/// A failed transaction is a normal runtime condition; callers decide whether
/// to retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// No matching response arrived before the deadline.
    #[error("Transaction timeout: no response from 0x{device:04X} table {table}")]
    Timeout { device: u16, table: String },

    /// A response matched the address but its payload does not fit the schema.
    #[error("Schema mismatch for table {table}: expected {expected} bytes, got {actual}")]
    SchemaMismatch {
        table: String,
        expected: usize,
        actual: usize,
    },

    /// Writing the request to the bus failed.
    #[error("Bus write failed: {0}")]
    Bus(String),
}

/// Represents the different error types that can occur in the infinity-bus crate.
#[derive(Debug, Error)]
pub enum InfinityError {
    /// The serial device could not be opened. Fatal at startup.
    #[error("Serial port error: {0}")]
    SerialPortError(String),

    /// An I/O error on an already open link.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame codec failure.
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Transaction failure.
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),
}
