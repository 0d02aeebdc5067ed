//! # Infinity Frame Codec
//!
//! This module decodes and encodes the binary frames carried on the Infinity
//! RS-485 bus. It uses the `nom` crate for parsing and the `crc` crate for the
//! integrity check.
//!
//! ## Frame layout
//!
//! ```text
//! +-----+-----+-----+------+-----+---------+---------+
//! | dst | src | len | rsvd | op  | payload | crc16   |
//! | 2B  | 2B  | 1B  | 2B   | 1B  | len B   | 2B (LE) |
//! +-----+-----+-----+------+-----+---------+---------+
//! ```
//!
//! Addresses are big-endian. The CRC is CRC-16/ARC over every byte before it,
//! transmitted low byte first.
//!
//! ## Usage
//!
//! ```rust
//! use infinity_bus::bus::frame::{InfinityFrame, Op};
//!
//! let frame = InfinityFrame::new(0x9201, 0x2001, Op::ReadTable, vec![0x00, 0x3b, 0x02]);
//! let bytes = frame.encode().unwrap();
//! assert_eq!(InfinityFrame::decode(&bytes).unwrap(), frame);
//! ```

use crate::constants::{
    FRAME_CRC_LEN, FRAME_HEADER_LEN, FRAME_LENGTH_OFFSET, FRAME_MAX_PAYLOAD, FRAME_MIN_LEN,
    OP_ACK02, OP_ACK06, OP_ALARM_PACKET, OP_CHANGE_TABLE_NAME, OP_NACK, OP_READ_TABLE,
    OP_WRITE_TABLE, TABLE_ADDRESS_LEN,
};
use crate::error::FrameError;
use crc::{Crc, CRC_16_ARC};
use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u8, le_u16};
use nom::IResult;
use std::fmt;

const BUS_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);

/// Operation byte of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// Write acknowledged.
    Ack02,
    /// Read response; the payload carries the table address and table data.
    Ack06,
    ReadTable,
    WriteTable,
    Nack,
    ChangeTableName,
    AlarmPacket,
    /// Any operation this crate does not interpret, preserved verbatim.
    Unknown(u8),
}

impl From<u8> for Op {
    fn from(byte: u8) -> Self {
        match byte {
            OP_ACK02 => Op::Ack02,
            OP_ACK06 => Op::Ack06,
            OP_READ_TABLE => Op::ReadTable,
            OP_WRITE_TABLE => Op::WriteTable,
            OP_NACK => Op::Nack,
            OP_CHANGE_TABLE_NAME => Op::ChangeTableName,
            OP_ALARM_PACKET => Op::AlarmPacket,
            other => Op::Unknown(other),
        }
    }
}

impl From<Op> for u8 {
    fn from(op: Op) -> Self {
        match op {
            Op::Ack02 => OP_ACK02,
            Op::Ack06 => OP_ACK06,
            Op::ReadTable => OP_READ_TABLE,
            Op::WriteTable => OP_WRITE_TABLE,
            Op::Nack => OP_NACK,
            Op::ChangeTableName => OP_CHANGE_TABLE_NAME,
            Op::AlarmPacket => OP_ALARM_PACKET,
            Op::Unknown(byte) => byte,
        }
    }
}

/// Represents an Infinity bus frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfinityFrame {
    pub dst: u16,
    pub src: u16,
    pub op: Op,
    pub data: Vec<u8>,
    pub checksum: u16,
}

impl InfinityFrame {
    /// Builds a frame and computes its checksum.
    pub fn new(src: u16, dst: u16, op: Op, data: Vec<u8>) -> Self {
        let mut frame = InfinityFrame {
            dst,
            src,
            op,
            data,
            checksum: 0,
        };
        frame.checksum = BUS_CRC.checksum(&frame.header_and_payload());
        frame
    }

    /// Builds a READ_TABLE request for `table` on `dst`.
    pub fn read_request(src: u16, dst: u16, table: [u8; TABLE_ADDRESS_LEN]) -> Self {
        Self::new(src, dst, Op::ReadTable, table.to_vec())
    }

    /// Leading three payload bytes: the table address of a read/response, or
    /// the discriminator of a snooped report.
    pub fn table_address(&self) -> Option<[u8; TABLE_ADDRESS_LEN]> {
        let head = self.data.get(..TABLE_ADDRESS_LEN)?;
        let mut table = [0u8; TABLE_ADDRESS_LEN];
        table.copy_from_slice(head);
        Some(table)
    }

    /// Payload after the table address.
    pub fn table_data(&self) -> &[u8] {
        self.data.get(TABLE_ADDRESS_LEN..).unwrap_or(&[])
    }

    /// Checks the stored checksum against the frame contents.
    pub fn verify(&self) -> Result<(), FrameError> {
        let calculated = BUS_CRC.checksum(&self.header_and_payload());
        if calculated == self.checksum {
            Ok(())
        } else {
            Err(FrameError::ChecksumMismatch {
                expected: self.checksum,
                calculated,
            })
        }
    }

    /// Serializes the frame. The checksum is always recomputed, so the output
    /// is checksum-consistent even if `self.checksum` is stale.
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        if self.data.len() > FRAME_MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLong(self.data.len()));
        }
        let mut out = self.header_and_payload();
        let crc = BUS_CRC.checksum(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        Ok(out)
    }

    /// Decodes exactly one frame from the start of `input`. Trailing bytes are ignored.
    pub fn decode(input: &[u8]) -> Result<InfinityFrame, FrameError> {
        parse_frame(input).map(|(frame, _)| frame)
    }

    fn header_and_payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FRAME_HEADER_LEN + self.data.len() + FRAME_CRC_LEN);
        out.extend_from_slice(&self.dst.to_be_bytes());
        out.extend_from_slice(&self.src.to_be_bytes());
        out.push(self.data.len() as u8);
        out.extend_from_slice(&[0x00, 0x00]);
        out.push(self.op.into());
        out.extend_from_slice(&self.data);
        out
    }
}

impl fmt::Display for InfinityFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:04X} -> 0x{:04X} {:?} [{}]",
            self.src,
            self.dst,
            self.op,
            crate::util::hex::format_hex_compact(&self.data)
        )
    }
}

/// Total length of the frame starting at `input[0]`, if the length byte is available.
pub fn frame_len(input: &[u8]) -> Option<usize> {
    input
        .get(FRAME_LENGTH_OFFSET)
        .map(|&len| FRAME_MIN_LEN + len as usize)
}

struct RawFrame<'a> {
    dst: u16,
    src: u16,
    op: u8,
    data: &'a [u8],
    checksum: u16,
}

fn raw_frame(input: &[u8]) -> IResult<&[u8], RawFrame<'_>> {
    let (input, dst) = be_u16(input)?;
    let (input, src) = be_u16(input)?;
    let (input, len) = be_u8(input)?;
    let (input, _reserved) = take(2usize)(input)?;
    let (input, op) = be_u8(input)?;
    let (input, data) = take(len as usize)(input)?;
    let (input, checksum) = le_u16(input)?;
    Ok((
        input,
        RawFrame {
            dst,
            src,
            op,
            data,
            checksum,
        },
    ))
}

/// Parses a frame and returns it with the unconsumed remainder.
///
/// Fails with [`FrameError::Truncated`] when the header or the declared payload
/// is incomplete, and with [`FrameError::ChecksumMismatch`] when the CRC does
/// not match.
pub fn parse_frame(input: &[u8]) -> Result<(InfinityFrame, &[u8]), FrameError> {
    let needed = frame_len(input).unwrap_or(FRAME_MIN_LEN);
    if input.len() < needed {
        return Err(FrameError::Truncated {
            needed,
            available: input.len(),
        });
    }

    let (rest, raw) = raw_frame(input).map_err(|_| FrameError::Truncated {
        needed,
        available: input.len(),
    })?;

    let calculated = BUS_CRC.checksum(&input[..needed - FRAME_CRC_LEN]);
    if calculated != raw.checksum {
        return Err(FrameError::ChecksumMismatch {
            expected: raw.checksum,
            calculated,
        });
    }

    Ok((
        InfinityFrame {
            dst: raw.dst,
            src: raw.src,
            op: Op::from(raw.op),
            data: raw.data.to_vec(),
            checksum: raw.checksum,
        },
        rest,
    ))
}
