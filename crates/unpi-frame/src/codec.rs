use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::subsystem::MAX_SUBSYSTEM;

/// Start-of-frame marker.
pub const SOF: u8 = 0xFE;

/// Frame header: marker (1) + length (2) + cmd0 (1) + cmd1 (1) = 5 bytes.
pub const HEADER_SIZE: usize = 5;

/// Trailing checksum size.
pub const FCS_SIZE: usize = 1;

/// Default maximum payload length accepted from the line: 1 KiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 1024;

const TYPE_SHIFT: u8 = 5;

/// Request type carried in the top 3 bits of `cmd0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UnpiType {
    /// Synchronous request; the device answers with a [`UnpiType::SyncRsp`].
    SyncReq = 1,
    /// Asynchronous request or notification.
    AsyncReq = 2,
    /// Synchronous response.
    SyncRsp = 3,
}

impl UnpiType {
    /// All request types, in wire order.
    pub const ALL: [UnpiType; 3] = [UnpiType::SyncReq, UnpiType::AsyncReq, UnpiType::SyncRsp];

    /// Extract the request type from a `cmd0` byte.
    pub fn from_cmd0(cmd0: u8) -> Option<Self> {
        Self::try_from(cmd0 >> TYPE_SHIFT).ok()
    }

    /// Wire value of this type.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Name used in the textual representation.
    pub fn name(self) -> &'static str {
        match self {
            UnpiType::SyncReq => "SyncReq",
            UnpiType::AsyncReq => "AsyncReq",
            UnpiType::SyncRsp => "SyncRsp",
        }
    }
}

impl TryFrom<u8> for UnpiType {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(UnpiType::SyncReq),
            2 => Ok(UnpiType::AsyncReq),
            3 => Ok(UnpiType::SyncRsp),
            other => Err(FrameError::InvalidType(other)),
        }
    }
}

impl FromStr for UnpiType {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self> {
        UnpiType::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or(FrameError::InvalidType(0))
    }
}

impl fmt::Display for UnpiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single uNPI frame as it crosses the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Request type.
    pub unpi_type: UnpiType,
    /// Subsystem id (`0x00..=0x1F`).
    pub subsystem: u8,
    /// Command within the subsystem.
    pub command: u8,
    /// Encoded payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(unpi_type: UnpiType, subsystem: u8, command: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            unpi_type,
            subsystem,
            command,
            payload: payload.into(),
        }
    }

    /// The packed `cmd0` byte.
    pub fn cmd0(&self) -> u8 {
        (self.unpi_type.as_u8() << TYPE_SHIFT) | (self.subsystem & MAX_SUBSYSTEM)
    }

    /// The total wire size of this frame (header + payload + checksum).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len() + FCS_SIZE
    }

    /// Encode into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        encode_frame(self, &mut buf)?;
        Ok(buf.freeze())
    }
}

/// XOR checksum over `bytes`.
pub fn fcs(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────┬───────────┬──────────────────┬──────┬─────────┬─────┐
/// │ 0xFE │ Length    │ cmd0             │ cmd1 │ Payload │ FCS │
/// │      │ (2B LE)   │ type<<5 | subsys │      │         │     │
/// └──────┴───────────┴──────────────────┴──────┴─────────┴─────┘
/// ```
/// The checksum covers Length through the end of Payload.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    if frame.payload.len() > u16::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: frame.payload.len(),
            max: u16::MAX as usize,
        });
    }
    if frame.subsystem > MAX_SUBSYSTEM {
        return Err(FrameError::InvalidSubsystem(frame.subsystem));
    }

    dst.reserve(frame.wire_size());
    let start = dst.len();
    dst.put_u8(SOF);
    dst.put_u16_le(frame.payload.len() as u16);
    dst.put_u8(frame.cmd0());
    dst.put_u8(frame.command);
    dst.put_slice(&frame.payload);
    let checksum = fcs(&dst[start + 1..]);
    dst.put_u8(checksum);
    Ok(())
}

/// Decode one frame from the start of `src`.
///
/// `src` must begin with the marker. Returns the frame and the number of
/// bytes it occupied; anything after that is left for the caller.
pub fn decode_frame(src: &[u8]) -> Result<(Frame, usize)> {
    let Some(&first) = src.first() else {
        return Err(FrameError::Truncated {
            needed: HEADER_SIZE + FCS_SIZE,
            available: 0,
        });
    };
    if first != SOF {
        return Err(FrameError::InvalidStartOfFrame(first));
    }
    if src.len() < HEADER_SIZE + FCS_SIZE {
        return Err(FrameError::Truncated {
            needed: HEADER_SIZE + FCS_SIZE,
            available: src.len(),
        });
    }

    let payload_len = u16::from_le_bytes([src[1], src[2]]) as usize;
    let total = HEADER_SIZE + payload_len + FCS_SIZE;
    if src.len() < total {
        return Err(FrameError::Truncated {
            needed: total,
            available: src.len(),
        });
    }

    let expected = src[total - 1];
    let actual = fcs(&src[1..total - 1]);
    if expected != actual {
        return Err(FrameError::ChecksumMismatch { expected, actual });
    }

    let cmd0 = src[3];
    let unpi_type = UnpiType::try_from(cmd0 >> TYPE_SHIFT)?;
    let frame = Frame {
        unpi_type,
        subsystem: cmd0 & MAX_SUBSYSTEM,
        command: src[4],
        payload: Bytes::copy_from_slice(&src[HEADER_SIZE..total - 1]),
    };

    Ok((frame, total))
}
