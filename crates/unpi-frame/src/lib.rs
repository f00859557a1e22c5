//! uNPI frame codec and stream resynchronization.
//!
//! Every message on the serial line is framed as:
//! - A start-of-frame marker (`0xFE`)
//! - A 2-byte little-endian payload length
//! - `cmd0`: the request type in the top 3 bits, the subsystem in the low 5
//! - `cmd1`: the command within the subsystem
//! - The payload
//! - A 1-byte XOR checksum over everything from the length to the payload end
//!
//! [`StreamParser`] pulls complete frames out of an arbitrary byte stream,
//! skipping line noise one byte at a time until it finds a frame that
//! checks out.

pub mod codec;
pub mod error;
pub mod parser;
pub mod priority;
pub mod subsystem;

pub use codec::{
    decode_frame, encode_frame, fcs, Frame, UnpiType, DEFAULT_MAX_PAYLOAD, FCS_SIZE, HEADER_SIZE,
    SOF,
};
pub use error::{FrameError, Result};
pub use parser::{ParserConfig, ParserStats, StreamParser};
pub use priority::Priority;
pub use subsystem::{subsystem_id, subsystem_name, CM, RTLS, SNP, UTIL};
