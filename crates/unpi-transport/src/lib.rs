//! Serial transport for uNPI devices.
//!
//! This is the lowest layer of the stack. A link asks a [`Connector`] to open
//! a port described by [`PortSettings`] and gets back a boxed
//! [`SerialStream`] it can read and write with a bounded read timeout.
//!
//! - [`serial`] opens real ports through the `serialport` crate.
//! - [`memory`] provides connected in-process port pairs for simulated
//!   devices and tests.

pub mod error;
pub mod memory;
pub mod serial;
pub mod traits;

pub use error::{Result, TransportError};
pub use memory::{MemoryConnector, MemoryPort};
pub use serial::{available_ports, PortDescription, SystemPorts};
pub use traits::{Connector, PortSettings, SerialStream, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT};
