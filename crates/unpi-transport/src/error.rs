/// Errors that can occur in serial transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the named port.
    #[error("failed to open {port}: {message}")]
    Open { port: String, message: String },

    /// Failed to enumerate the ports present on this host.
    #[error("failed to enumerate serial ports: {0}")]
    Enumerate(String),

    /// An I/O error occurred on an open port.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote end of the port went away.
    #[error("port closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
