//! # Utility Modules
//!
//! Hex formatting and rate-limited logging helpers shared by the protocol code.

pub mod hex;
pub mod logging;

pub use hex::{decode_hex, encode_hex, format_hex_compact};
pub use logging::{log_frame_hex, LogThrottle};
