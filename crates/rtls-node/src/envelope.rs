use serde_json::{json, Value};
use unpi_frame::Priority;
use unpi_schema::{DeviceAddress, Message, MessageRegistry};

/// Something that can be queued by priority.
pub trait Prioritized {
    fn priority(&self) -> Priority;
}

impl Prioritized for Message {
    fn priority(&self) -> Priority {
        Message::priority(self)
    }
}

/// A decoded message tagged with the device it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeMessage {
    /// Device identity, `None` until the link has been identified.
    pub identifier: Option<DeviceAddress>,
    /// Friendly name of the link.
    pub name: String,
    pub message: Message,
}

impl NodeMessage {
    pub fn new(identifier: Option<DeviceAddress>, name: impl Into<String>, message: Message) -> Self {
        Self {
            identifier,
            name: name.into(),
            message,
        }
    }

    /// Textual form: `{"identifier": "AA:BB:..", "message": {...}}`.
    ///
    /// Messages from unidentified links carry `"unknown"` as identifier.
    pub fn to_json(&self, registry: &MessageRegistry) -> Value {
        let identifier = match self.identifier {
            Some(addr) => addr.to_string(),
            None => "unknown".to_string(),
        };
        json!({
            "identifier": identifier,
            "message": registry.to_json(&self.message),
        })
    }
}

impl Prioritized for NodeMessage {
    fn priority(&self) -> Priority {
        self.message.priority()
    }
}
