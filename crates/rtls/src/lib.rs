//! Real-time locating over uNPI serial links.
//!
//! rtls talks to TI RTLS devices over their serial uNPI protocol: it frames
//! and resynchronizes the byte stream, decodes messages through a schema
//! registry, runs one link thread per device, and coordinates a fleet
//! through angle-of-arrival or time-of-flight bring-up.
//!
//! # Crate Structure
//!
//! - [`transport`] — Serial port abstraction and in-memory port pairs
//! - [`frame`] — uNPI frame codec and stream resynchronizer
//! - [`schema`] — Message schemas, typed payloads, and the command catalog
//! - [`node`] — Per-device links and the priority event bus
//! - [`manager`] — Fleet coordination, bring-up sequencing, and the textual bridge

/// Re-export transport types.
pub mod transport {
    pub use unpi_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use unpi_frame::*;
}

/// Re-export schema types.
pub mod schema {
    pub use unpi_schema::*;
}

/// Re-export link types.
pub mod node {
    pub use rtls_node::*;
}

/// Re-export coordination types.
pub mod manager {
    pub use rtls_manager::*;
}
