//! Per-device link management for RTLS devices speaking uNPI.
//!
//! An [`RtlsNode`] owns one serial connection on its own thread. It writes
//! queued commands in priority order, resynchronizes and decodes the inbound
//! byte stream, identifies the device, and fans decoded messages out to
//! subscribers through a priority [`Bus`].

pub mod bus;
pub mod commands;
pub mod envelope;
pub mod error;
pub mod identify;
pub mod node;
pub mod queue;
pub mod signal;

pub use bus::{Bus, Subscriber, SubscriptionId};
pub use commands::{CommandSink, RtlsCommands};
pub use envelope::{NodeMessage, Prioritized};
pub use error::{NodeError, Result};
pub use identify::{identity_from, IdentifyConfig, Identity};
pub use node::{NodeConfig, RtlsNode};
pub use queue::PriorityQueue;
pub use signal::Signal;
