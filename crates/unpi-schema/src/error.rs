use unpi_frame::FrameError;

/// Errors that can occur while encoding, decoding, or building messages.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The payload ended before a field could be read.
    #[error("payload truncated reading '{field}' ({available} of {needed} bytes)")]
    Truncated {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    /// Bytes were left over after the last field.
    #[error("{0} unexpected trailing payload bytes")]
    TrailingBytes(usize),

    /// A field carried a value outside its defined range.
    #[error("invalid value for '{field}': {value}")]
    InvalidValue { field: &'static str, value: String },

    /// No subsystem with this name or id is registered.
    #[error("unknown subsystem '{0}'")]
    UnknownSubsystem(String),

    /// The subsystem has no command with this name.
    #[error("unknown command '{command}' in subsystem {subsystem}")]
    UnknownCommand { subsystem: String, command: String },

    /// No schema is registered for the given message key.
    #[error("no schema registered for {0}")]
    NoSchema(String),

    /// Two schemas were registered for the same message key.
    #[error("duplicate schema for {0}")]
    DuplicateSchema(String),

    /// Arguments could not be mapped onto the schema's fields.
    #[error("invalid arguments for {command}: {message}")]
    InvalidArguments { command: String, message: String },

    /// The request envelope schema could not be compiled.
    #[error("failed to compile schema: {0}")]
    CompileFailed(String),

    /// A textual request failed envelope validation.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// The input is not valid JSON.
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Frame-level error while building wire bytes.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

pub type Result<T> = std::result::Result<T, SchemaError>;
