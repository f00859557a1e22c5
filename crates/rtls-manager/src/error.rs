use rtls_node::NodeError;
use unpi_schema::{DeviceAddress, SchemaError};

/// Errors that can occur while coordinating devices.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// A link failed.
    #[error("node error: {0}")]
    Node(#[from] NodeError),

    /// A message could not be built or parsed.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// No managed device has this identity.
    #[error("no device with identifier {0}")]
    UnknownDevice(DeviceAddress),

    /// No identified device advertises the master role.
    #[error("no master device identified")]
    NoMaster,

    /// Angle-of-arrival needs at least one passive device.
    #[error("angle-of-arrival needs at least one passive device")]
    NoPassives,

    /// Some devices advertise ranging roles and some do not.
    #[error("devices disagree on ranging support: {0}")]
    MixedModes(String),

    /// The router thread is already running.
    #[error("manager already started")]
    AlreadyStarted,

    /// The router thread is not running.
    #[error("manager is not running")]
    NotRunning,

    /// The router thread could not be spawned.
    #[error("failed to spawn router thread: {0}")]
    Spawn(std::io::Error),
}

pub type Result<T> = std::result::Result<T, ManagerError>;

/// Errors in textual requests from remote consumers.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The text is not JSON.
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// A `control` object that names no known request.
    #[error("invalid control request: {0}")]
    Control(#[source] serde_json::Error),

    /// The command envelope did not map onto the registry.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl BridgeError {
    /// Component the error is reported under.
    pub fn module(&self) -> &'static str {
        match self {
            BridgeError::InvalidJson(_) => "json",
            BridgeError::Control(_) => "control",
            BridgeError::Schema(_) => "schema",
        }
    }
}
