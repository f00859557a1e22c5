/// Errors that can occur in link operations.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] unpi_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] unpi_frame::FrameError),

    /// Message could not be built or encoded.
    #[error("schema error: {0}")]
    Schema(#[from] unpi_schema::SchemaError),

    /// The link thread is already running.
    #[error("link {0} already started")]
    AlreadyStarted(String),

    /// The device side of the link went away.
    #[error("link {0} disconnected")]
    Disconnected(String),

    /// The link thread could not be spawned.
    #[error("failed to spawn link thread: {0}")]
    Spawn(std::io::Error),
}

pub type Result<T> = std::result::Result<T, NodeError>;
