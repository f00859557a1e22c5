//! Typed message schemas for uNPI subsystems.
//!
//! A [`MessageRegistry`] maps each `(originator, type, subsystem, command)`
//! signature to a payload shape that knows its wire layout and its textual
//! field names. The registry decodes inbound frames into [`Message`]s and
//! doubles as the outbound command catalog: requests can be built by name
//! from JSON arguments, or through the typed constructors in [`commands`].
//!
//! Frames whose signature has no schema keep their payload bytes as
//! [`Payload::Raw`] so newer device firmware never stalls a link.

pub mod catalog;
pub mod commands;
pub mod config;
pub mod error;
pub mod message;
pub mod payload;
pub mod registry;
pub mod types;
mod validator;
pub mod wire;

pub use catalog::{rtls_cmd, util_cmd, SchemaDef, SubsystemDef};
pub use config::RegistryConfig;
pub use error::{Result, SchemaError};
pub use message::{Message, MessageKey, Originator};
pub use payload::{Payload, PayloadKind};
pub use registry::MessageRegistry;
pub use types::{
    AoaResultMode, AoaRole, Capabilities, DeviceAddress, RtlsStatus, SecuritySeed, TofResultMode,
    TofRole, TofRunMode,
};
