use std::fmt;

use serde::{Deserialize, Serialize};
use unpi_frame::{Frame, Priority, UnpiType};

use crate::error::Result;
use crate::payload::Payload;

/// Which side of the serial line produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Originator {
    /// The host application processor.
    Ap,
    /// The network processor on the device.
    Nwp,
}

impl Originator {
    /// Name used in the textual representation.
    pub fn name(self) -> &'static str {
        match self {
            Originator::Ap => "Ap",
            Originator::Nwp => "Nwp",
        }
    }
}

/// Key under which a schema is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageKey {
    pub originator: Originator,
    pub unpi_type: UnpiType,
    pub subsystem: u8,
    pub command: u8,
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/0x{:02X}/0x{:02X}",
            self.originator.name(),
            self.unpi_type,
            self.subsystem,
            self.command
        )
    }
}

/// A decoded (or ready to encode) uNPI message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub originator: Originator,
    pub unpi_type: UnpiType,
    pub subsystem: u8,
    pub command: u8,
    pub payload: Payload,
    /// The frame this message was decoded from, kept for diagnostics.
    pub raw: Option<Frame>,
}

impl Message {
    /// Create a message with no raw frame attached.
    pub fn new(
        originator: Originator,
        unpi_type: UnpiType,
        subsystem: u8,
        command: u8,
        payload: Payload,
    ) -> Self {
        Self {
            originator,
            unpi_type,
            subsystem,
            command,
            payload,
            raw: None,
        }
    }

    /// A synchronous request from the host.
    pub fn request(subsystem: u8, command: u8, payload: Payload) -> Self {
        Self::new(Originator::Ap, UnpiType::SyncReq, subsystem, command, payload)
    }

    /// Registry key of this message.
    pub fn key(&self) -> MessageKey {
        MessageKey {
            originator: self.originator,
            unpi_type: self.unpi_type,
            subsystem: self.subsystem,
            command: self.command,
        }
    }

    /// Delivery priority, derived from the request type.
    pub fn priority(&self) -> Priority {
        Priority::for_type(self.unpi_type)
    }

    /// True when this message has the given type, subsystem, and command.
    pub fn is(&self, unpi_type: UnpiType, subsystem: u8, command: u8) -> bool {
        self.unpi_type == unpi_type && self.subsystem == subsystem && self.command == command
    }

    /// Encode into a frame ready for the wire.
    pub fn to_frame(&self) -> Result<Frame> {
        self.payload.check()?;
        let payload = self.payload.to_bytes().freeze();
        if payload.len() > u16::MAX as usize {
            return Err(unpi_frame::FrameError::PayloadTooLarge {
                size: payload.len(),
                max: u16::MAX as usize,
            }
            .into());
        }
        Ok(Frame::new(
            self.unpi_type,
            self.subsystem,
            self.command,
            payload,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;
    use crate::payload::{EnableReq, Payload};

    #[test]
    fn request_defaults() {
        let msg = Message::request(
            unpi_frame::RTLS,
            0x14,
            Payload::Enable(EnableReq { enable: true }),
        );
        assert_eq!(msg.originator, Originator::Ap);
        assert_eq!(msg.unpi_type, UnpiType::SyncReq);
        assert_eq!(msg.priority(), Priority::Urgent);
        assert!(msg.is(UnpiType::SyncReq, unpi_frame::RTLS, 0x14));

        let frame = msg.to_frame().unwrap();
        assert_eq!(frame.cmd0(), 0x39);
        assert_eq!(frame.payload.as_ref(), &[1]);
    }

    #[test]
    fn key_display() {
        let msg = Message::new(
            Originator::Nwp,
            UnpiType::AsyncReq,
            unpi_frame::RTLS,
            0x24,
            Payload::default(),
        );
        assert_eq!(msg.key().to_string(), "Nwp/AsyncReq/0x19/0x24");
        assert_eq!(msg.priority(), Priority::Normal);
    }

    #[test]
    fn oversized_frequency_plan_is_rejected() {
        use crate::payload::TofSetParamsReq;
        use crate::types::{TofResultMode, TofRole, TofRunMode};

        let mut params = TofSetParamsReq {
            tof_role: TofRole::Master,
            num_samples: 256,
            num_freq: 0,
            auto_tof_rssi_thresh: -55,
            result_mode: TofResultMode::Distance,
            run_mode: TofRunMode::Continuous,
            frequencies: (0..256).map(|n| 2400 + n).collect(),
        };
        let msg = Message::request(unpi_frame::RTLS, 0x11, Payload::TofSetParams(params.clone()));
        assert!(matches!(
            msg.to_frame(),
            Err(SchemaError::InvalidValue { field: "frequencies", .. })
        ));

        params.frequencies.truncate(255);
        let msg = Message::request(unpi_frame::RTLS, 0x11, Payload::TofSetParams(params));
        let frame = msg.to_frame().unwrap();
        assert_eq!(frame.payload[3], 255);
        assert_eq!(frame.payload.len(), 7 + 2 * 255);
    }
}
