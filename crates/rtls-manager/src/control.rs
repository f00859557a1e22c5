//! Control requests answered by the manager itself.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use unpi_schema::{Capabilities, DeviceAddress, MessageRegistry};

use rtls_node::RtlsNode;

use crate::bridge::error_json;

/// A `{"control": {"req": ...}}` request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "req", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlRequest {
    /// Every managed link with its identity.
    ListDevices,
    /// The request catalogue available on one device.
    ListSubsystems {
        #[serde(default)]
        identifier: Option<String>,
    },
}

impl ControlRequest {
    pub fn name(&self) -> &'static str {
        match self {
            ControlRequest::ListDevices => "LIST_DEVICES",
            ControlRequest::ListSubsystems { .. } => "LIST_SUBSYSTEMS",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceEntry {
    pub name: String,
    pub port: String,
    pub identifier: Option<DeviceAddress>,
    pub caps: Option<Capabilities>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestEntry {
    pub originator: &'static str,
    pub cmd: String,
    #[serde(rename = "type")]
    pub unpi_type: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubsystemEntry {
    pub name: &'static str,
    pub val: u8,
    pub requests: Vec<RequestEntry>,
}

pub fn list_devices(nodes: &[Arc<RtlsNode>]) -> Vec<DeviceEntry> {
    nodes
        .iter()
        .map(|node| {
            let identity = node.identity();
            DeviceEntry {
                name: node.name().to_string(),
                port: node.port().to_string(),
                identifier: identity.map(|id| id.identifier),
                caps: identity.map(|id| id.capabilities),
            }
        })
        .collect()
}

pub fn list_subsystems(registry: &MessageRegistry) -> Vec<SubsystemEntry> {
    registry
        .subsystems()
        .map(|def| SubsystemEntry {
            name: def.name,
            val: def.id,
            requests: registry
                .requests(def.id)
                .into_iter()
                .map(|schema| RequestEntry {
                    originator: schema.originator.name(),
                    cmd: def
                        .command_name(schema.command)
                        .map_or_else(|| schema.command.to_string(), str::to_string),
                    unpi_type: schema.unpi_type.name(),
                })
                .collect(),
        })
        .collect()
}

/// Answer a control request.
///
/// Failures come back in the bridge's error form.
pub fn respond(request: &ControlRequest, nodes: &[Arc<RtlsNode>], registry: &MessageRegistry) -> Value {
    match request {
        ControlRequest::ListDevices => json!({
            "control": {
                "req": request.name(),
                "devices": list_devices(nodes),
            }
        }),
        ControlRequest::ListSubsystems { identifier } => {
            let Some(identifier) = identifier else {
                return error_json("control", "Missing identifier");
            };
            let known = identifier.parse::<DeviceAddress>().ok().is_some_and(|addr| {
                nodes
                    .iter()
                    .any(|node| node.identity().is_some_and(|id| id.identifier == addr))
            });
            if !known {
                return error_json("control", "Could not find node with identifier");
            }
            json!({
                "control": {
                    "req": request.name(),
                    "identifier": identifier,
                    "subsystems": list_subsystems(registry),
                }
            })
        }
    }
}
