//! # Logging Utilities
//!
//! Rate limiting and hex dump helpers for per-frame diagnostics. A noisy serial
//! line can produce a dropped frame per byte, so those paths go through a
//! [`LogThrottle`].
//!
//! ## Usage
//!
//! ```rust
//! use infinity_bus::util::logging::LogThrottle;
//!
//! // Allow 5 messages per second
//! let mut throttle = LogThrottle::new(1000, 5);
//! if throttle.allow() {
//!     log::warn!("CRC error detected");
//! }
//! ```

use std::time::Instant;

/// Throttling structure for rate-limiting log messages
#[derive(Debug)]
pub struct LogThrottle {
    /// Time window for throttling (in milliseconds)
    window_ms: u64,
    /// Maximum messages allowed per window
    cap: u32,
    /// Current message count in window
    count: u32,
    /// Messages refused since the last allowed one
    suppressed: u64,
    /// Start time of current window
    t0: Instant,
}

impl LogThrottle {
    /// Create new throttle with time window and message cap
    pub fn new(window_ms: u64, cap: u32) -> Self {
        Self {
            window_ms,
            cap,
            count: 0,
            suppressed: 0,
            t0: Instant::now(),
        }
    }

    /// Check if logging is allowed (resets counter after window expires)
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        let elapsed_ms = now.duration_since(self.t0).as_millis() as u64;

        if elapsed_ms > self.window_ms {
            self.t0 = now;
            self.count = 0;
        }

        self.count = self.count.saturating_add(1);
        if self.count <= self.cap {
            true
        } else {
            self.suppressed += 1;
            false
        }
    }

    /// Returns and clears the number of messages refused so far.
    pub fn take_suppressed(&mut self) -> u64 {
        std::mem::take(&mut self.suppressed)
    }
}

/// Log frame data in hex format for debugging
pub fn log_frame_hex(prefix: &str, data: &[u8]) {
    const MAX_LOG_BYTES: usize = 64;

    if !log::log_enabled!(log::Level::Trace) {
        return;
    }

    let display_data = &data[..data.len().min(MAX_LOG_BYTES)];
    let hex_str = crate::util::hex::format_hex_compact(display_data);
    let suffix = if data.len() > MAX_LOG_BYTES {
        format!(" ... ({} bytes total)", data.len())
    } else {
        String::new()
    };

    log::trace!(target: "infinity::frame", "{prefix}: {hex_str}{suffix}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_caps_messages() {
        let mut throttle = LogThrottle::new(60_000, 2);
        assert!(throttle.allow());
        assert!(throttle.allow());
        assert!(!throttle.allow());
        assert!(!throttle.allow());
        assert_eq!(throttle.take_suppressed(), 2);
        assert_eq!(throttle.take_suppressed(), 0);
    }
}
