use std::fmt;
use std::time::Duration;

use unpi_frame::{UnpiType, RTLS};
use unpi_schema::{rtls_cmd, Capabilities, DeviceAddress, Message, Originator, Payload};

/// Configuration for the identify exchange run when a link opens.
#[derive(Debug, Clone)]
pub struct IdentifyConfig {
    /// How long to wait for the identify reply before reporting the device
    /// as unidentified.
    pub timeout: Duration,
}

impl Default for IdentifyConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(500),
        }
    }
}

/// Address and capabilities a device reported about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identity {
    pub identifier: DeviceAddress,
    pub capabilities: Capabilities,
}

impl Identity {
    /// Can coordinate a connection as RTLS master.
    pub fn is_master(&self) -> bool {
        self.capabilities.contains(Capabilities::RTLS_MASTER)
    }

    pub fn is_passive(&self) -> bool {
        self.capabilities.contains(Capabilities::RTLS_PASSIVE)
    }

    /// Can take part in ranging as master or passive.
    pub fn supports_tof(&self) -> bool {
        self.capabilities
            .intersects(Capabilities::TOF_MASTER | Capabilities::TOF_PASSIVE)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.identifier, self.capabilities)
    }
}

/// Extract the identity from an identify reply, if `message` is one.
pub fn identity_from(message: &Message) -> Option<Identity> {
    if message.originator != Originator::Nwp
        || !message.is(UnpiType::SyncRsp, RTLS, rtls_cmd::IDENTIFY)
    {
        return None;
    }
    match &message.payload {
        Payload::Identify(rsp) => Some(Identity {
            identifier: rsp.identifier,
            capabilities: rsp.capabilities,
        }),
        _ => None,
    }
}
