//! In-process serial port pairs.
//!
//! Each [`MemoryPort`] is one end of a full-duplex byte pipe. Writes on one
//! end become readable on the other, and reads honour a timeout the same way
//! an idle serial line does. [`MemoryConnector`] hands pre-built ports to
//! links by port name, so simulated devices can stand in for hardware.

use std::collections::HashMap;
use std::io::{self, ErrorKind, Read, Write};
use std::sync::Mutex;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{Connector, PortSettings, SerialStream, DEFAULT_READ_TIMEOUT};

/// One end of an in-memory serial line.
#[derive(Debug)]
pub struct MemoryPort {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    read_timeout: Duration,
}

impl MemoryPort {
    /// Create two connected ends.
    pub fn pair() -> (MemoryPort, MemoryPort) {
        let (left_tx, right_rx) = crossbeam_channel::unbounded();
        let (right_tx, left_rx) = crossbeam_channel::unbounded();
        (
            MemoryPort {
                tx: left_tx,
                rx: left_rx,
                pending: Vec::new(),
                read_timeout: DEFAULT_READ_TIMEOUT,
            },
            MemoryPort {
                tx: right_tx,
                rx: right_rx,
                pending: Vec::new(),
                read_timeout: DEFAULT_READ_TIMEOUT,
            },
        )
    }

    /// Set the bound on a single blocking read.
    pub fn set_read_timeout(&mut self, read_timeout: Duration) {
        self.read_timeout = read_timeout;
    }
}

impl Read for MemoryPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        if self.pending.is_empty() {
            match self.rx.recv_timeout(self.read_timeout) {
                Ok(chunk) => self.pending = chunk,
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::Error::new(ErrorKind::TimedOut, "read timed out"))
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

impl Write for MemoryPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(ErrorKind::BrokenPipe, "peer end dropped"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Serves [`MemoryPort`]s to links by port name.
///
/// Each registered port can be opened once; a second open of the same name,
/// or an open of an unknown name, fails like a missing device would.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    ports: Mutex<HashMap<String, MemoryPort>>,
}

impl MemoryConnector {
    /// Create an empty connector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a host-side port under `name` and return the device side.
    pub fn attach(&self, name: impl Into<String>) -> MemoryPort {
        let (host, device) = MemoryPort::pair();
        self.insert(name, host);
        device
    }

    /// Register an existing port under `name`.
    pub fn insert(&self, name: impl Into<String>, port: MemoryPort) {
        let mut ports = match self.ports.lock() {
            Ok(ports) => ports,
            Err(poisoned) => poisoned.into_inner(),
        };
        ports.insert(name.into(), port);
    }
}

impl Connector for MemoryConnector {
    fn open(&self, settings: &PortSettings) -> Result<Box<dyn SerialStream>> {
        let mut ports = match self.ports.lock() {
            Ok(ports) => ports,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut port = ports
            .remove(&settings.port)
            .ok_or_else(|| TransportError::Open {
                port: settings.port.clone(),
                message: "no such device".to_string(),
            })?;
        debug!(port = %settings.port, "opening memory port");
        port.set_read_timeout(settings.read_timeout);
        Ok(Box::new(port))
    }
}
