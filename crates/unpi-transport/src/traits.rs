use std::fmt;
use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// Default line speed for uNPI devices.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default bound on a single blocking read.
///
/// Reads that see no bytes within this window return `ErrorKind::TimedOut`,
/// which gives the owning loop a chance to service outbound work and
/// observe stop requests.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(50);

/// An open serial connection.
///
/// Reads must honour the read timeout the port was opened with and report
/// an idle line as `ErrorKind::TimedOut` (or `WouldBlock`). A read of zero
/// bytes means the port is gone.
pub trait SerialStream: Read + Write + Send {}

impl<T: Read + Write + Send + ?Sized> SerialStream for T {}

/// Opens serial streams.
///
/// Links hold a connector rather than a stream so that opening happens on
/// the link's own thread and a failure is recorded there.
pub trait Connector: Send + Sync {
    /// Open the port described by `settings`.
    fn open(&self, settings: &PortSettings) -> Result<Box<dyn SerialStream>>;
}

/// Where and how to open a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSettings {
    /// Port name, e.g. `/dev/ttyACM0` or `COM3`.
    pub port: String,
    /// Line speed in baud.
    pub baud_rate: u32,
    /// Bound on a single blocking read.
    pub read_timeout: Duration,
}

impl PortSettings {
    /// Settings for `port` at the default baud rate and read timeout.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Override the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Override the read timeout.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }
}

impl fmt::Display for PortSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.port, self.baud_rate)
    }
}
