//! The textual contract spoken with remote consumers.
//!
//! Events go out as `{"identifier", "message"}` envelopes. Consumers send
//! back either the same envelope, addressing a command to one device, or a
//! `{"control": {"req": ...}}` request. Anything that fails comes back as
//! `{"error": {"module", "message"}}`.

use serde_json::{json, Value};
use unpi_schema::{DeviceAddress, Message, MessageRegistry};

use crate::control::ControlRequest;
use crate::error::BridgeError;

/// A parsed textual request.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Control(ControlRequest),
    Command {
        identifier: DeviceAddress,
        message: Message,
    },
}

/// Parse one textual request.
pub fn parse_inbound(registry: &MessageRegistry, text: &str) -> Result<Inbound, BridgeError> {
    let value: Value = serde_json::from_str(text).map_err(BridgeError::InvalidJson)?;
    if let Some(control) = value.get("control") {
        let request =
            serde_json::from_value(control.clone()).map_err(BridgeError::Control)?;
        return Ok(Inbound::Control(request));
    }
    let (identifier, message) = registry.parse_addressed(&value)?;
    Ok(Inbound::Command {
        identifier,
        message,
    })
}

/// The error form sent back to a consumer.
pub fn error_json(module: &str, message: impl std::fmt::Display) -> Value {
    json!({
        "error": {
            "module": module,
            "message": message.to_string(),
        }
    })
}

impl BridgeError {
    pub fn to_json(&self) -> Value {
        error_json(self.module(), self)
    }
}
