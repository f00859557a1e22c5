use std::fmt;
use std::io;

use rtls_manager::ManagerError;
use rtls_node::NodeError;
use unpi_schema::SchemaError;
use unpi_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Io(source) => io_error(context, source),
        TransportError::Closed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn schema_error(context: &str, err: SchemaError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn node_error(context: &str, err: NodeError) -> CliError {
    match err {
        NodeError::Transport(err) => transport_error(context, err),
        NodeError::Frame(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        NodeError::Schema(err) => schema_error(context, err),
        NodeError::Disconnected(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn manager_error(context: &str, err: ManagerError) -> CliError {
    match err {
        ManagerError::Node(err) => node_error(context, err),
        ManagerError::Schema(err) => schema_error(context, err),
        ManagerError::NoMaster => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        ManagerError::NoPassives | ManagerError::MixedModes(_) | ManagerError::UnknownDevice(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}
