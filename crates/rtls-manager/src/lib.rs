//! Fleet coordination for RTLS devices.
//!
//! An [`RtlsManager`] owns one [`rtls_node::RtlsNode`] per device, routes
//! commands to devices by identity, and aggregates their messages on one
//! priority bus. Once the fleet has identified, a [`Sequencer`] drives it
//! through connection, configuration, security seeding, calibration, and
//! measurement for either angle-of-arrival or time-of-flight ranging.
//!
//! Remote consumers talk to the manager through the textual contract in
//! [`bridge`]: node-addressed message envelopes plus a couple of
//! [`control`] requests.

pub mod bridge;
pub mod control;
pub mod error;
pub mod iq;
pub mod manager;
mod router;
pub mod sequencer;
pub mod state;

pub use bridge::{error_json, parse_inbound, Inbound};
pub use control::ControlRequest;
pub use error::{BridgeError, ManagerError, Result};
pub use iq::{IqAssembler, IqCapture};
pub use manager::{DeviceHandle, Identified, ManagerConfig, NodeInfo, RtlsManager};
pub use router::Routed;
pub use sequencer::{AoaSettings, Mode, SequenceConfig, Sequencer, Step, TofSettings};
pub use state::{CoordinationState, Phase};
