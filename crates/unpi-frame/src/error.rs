/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The candidate window does not start with the `0xFE` marker.
    #[error("invalid start of frame 0x{0:02X} (expected 0xFE)")]
    InvalidStartOfFrame(u8),

    /// Fewer bytes are available than the header or declared length requires.
    #[error("truncated frame ({available} of {needed} bytes)")]
    Truncated { needed: usize, available: usize },

    /// The trailing checksum does not match the frame contents.
    #[error("checksum mismatch (frame 0x{expected:02X}, computed 0x{actual:02X})")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// The type bits of `cmd0` name no known request type.
    #[error("invalid frame type {0}")]
    InvalidType(u8),

    /// The subsystem id does not fit in the 5 bits `cmd0` has for it.
    #[error("subsystem 0x{0:02X} out of range")]
    InvalidSubsystem(u8),

    /// The payload exceeds what the length field can carry.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
