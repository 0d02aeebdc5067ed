//! # Frame Reassembly
//!
//! The serial link delivers an unframed byte stream. [`FrameReassembler`]
//! accumulates those bytes and cuts them into validated [`InfinityFrame`]s,
//! resynchronising one byte at a time after a checksum failure.

use crate::bus::frame::{frame_len, parse_frame, InfinityFrame};
use crate::constants::{FRAME_MAX_LEN, FRAME_MIN_LEN};
use crate::error::FrameError;
use bytes::{Buf, BytesMut};

/// Default cap on buffered bytes before the oldest are discarded.
pub const DEFAULT_BUFFER_LIMIT: usize = 1024;

/// Outcome of one extraction attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum Reassembled {
    /// A valid frame was removed from the buffer.
    Frame(InfinityFrame),
    /// A candidate frame was invalid; one byte was discarded.
    Dropped(FrameError),
}

/// Counters for monitoring link quality.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReassemblyStats {
    pub frames: u64,
    pub checksum_errors: u64,
    pub overflow_bytes: u64,
}

/// Streaming frame extractor.
#[derive(Debug)]
pub struct FrameReassembler {
    buf: BytesMut,
    limit: usize,
    stats: ReassemblyStats,
}

impl Default for FrameReassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReassembler {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_BUFFER_LIMIT)
    }

    /// The limit is raised to one maximum-size frame if set lower.
    pub fn with_limit(limit: usize) -> Self {
        let limit = limit.max(FRAME_MAX_LEN);
        FrameReassembler {
            buf: BytesMut::with_capacity(limit),
            limit,
            stats: ReassemblyStats::default(),
        }
    }

    /// Appends received bytes, discarding the oldest if the limit is exceeded.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        if self.buf.len() > self.limit {
            let excess = self.buf.len() - self.limit;
            self.buf.advance(excess);
            self.stats.overflow_bytes += excess as u64;
        }
    }

    /// Extracts the next frame, or `None` if more bytes are needed.
    pub fn next_frame(&mut self) -> Option<Reassembled> {
        if self.buf.len() < FRAME_MIN_LEN {
            return None;
        }
        let needed = frame_len(&self.buf)?;
        if self.buf.len() < needed {
            return None;
        }

        match parse_frame(&self.buf[..needed]) {
            Ok((frame, _)) => {
                self.buf.advance(needed);
                self.stats.frames += 1;
                Some(Reassembled::Frame(frame))
            }
            Err(err) => {
                self.buf.advance(1);
                self.stats.checksum_errors += 1;
                Some(Reassembled::Dropped(err))
            }
        }
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn stats(&self) -> ReassemblyStats {
        self.stats
    }
}
