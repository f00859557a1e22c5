use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rtls_manager::{Identified, IqCapture, NodeInfo};
use rtls_node::{Identity, NodeMessage};
use serde::Serialize;
use serde_json::Value;
use unpi_schema::types::hex_string;
use unpi_schema::MessageRegistry;
use unpi_transport::PortDescription;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_ports(ports: &[PortDescription], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<Value> = ports
                .iter()
                .map(|port| {
                    serde_json::json!({
                        "port": port.name,
                        "kind": port.kind,
                        "detail": port.detail,
                    })
                })
                .collect();
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = table(vec!["PORT", "KIND", "DETAIL"]);
            for port in ports {
                table.add_row(vec![
                    port.name.clone(),
                    port.kind.clone(),
                    port.detail.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for port in ports {
                match &port.detail {
                    Some(detail) => println!("{} ({}) {}", port.name, port.kind, detail),
                    None => println!("{} ({})", port.name, port.kind),
                }
            }
        }
    }
}

#[derive(Serialize)]
struct DeviceOutput<'a> {
    name: &'a str,
    port: &'a str,
    role: &'a str,
    identifier: Option<String>,
    caps: Vec<&'static str>,
}

fn role(identity: &Identity) -> &'static str {
    if identity.is_master() {
        "master"
    } else if identity.is_passive() {
        "passive"
    } else {
        "other"
    }
}

pub fn print_fleet(fleet: &Identified, nodes: &[NodeInfo], format: OutputFormat) {
    let rows: Vec<DeviceOutput<'_>> = nodes
        .iter()
        .map(|node| DeviceOutput {
            name: &node.name,
            port: &node.port,
            role: node.identity.as_ref().map_or("unidentified", role),
            identifier: node.identity.map(|id| id.identifier.to_string()),
            caps: node
                .identity
                .map(|id| id.capabilities.names().collect())
                .unwrap_or_default(),
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "masters": fleet.masters.len(),
            "passives": fleet.passives.len(),
            "failed": fleet.failed.len(),
            "devices": rows,
        })),
        OutputFormat::Table => {
            let mut table = table(vec!["NAME", "PORT", "ROLE", "IDENTIFIER", "CAPS"]);
            for row in &rows {
                table.add_row(vec![
                    row.name.to_string(),
                    row.port.to_string(),
                    row.role.to_string(),
                    row.identifier.clone().unwrap_or_else(|| "-".to_string()),
                    row.caps.join(" "),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for row in &rows {
                println!(
                    "{} port={} role={} identifier={} caps={}",
                    row.name,
                    row.port,
                    row.role,
                    row.identifier.as_deref().unwrap_or("-"),
                    row.caps.join("|")
                );
            }
        }
    }
}

pub fn print_event(event: &NodeMessage, registry: &MessageRegistry, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&event.to_json(registry)),
        OutputFormat::Table => {
            let json = registry.to_json(&event.message);
            let mut table = table(vec!["NODE", "TYPE", "COMMAND", "PAYLOAD"]);
            table.add_row(vec![
                event.name.clone(),
                event.message.unpi_type.name().to_string(),
                command_label(&json["command"]),
                json["payload"].to_string(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let json = registry.to_json(&event.message);
            println!(
                "{} {} {} {}",
                event.name,
                event.message.unpi_type.name(),
                command_label(&json["command"]),
                json["payload"]
            );
        }
        OutputFormat::Raw => {
            let bytes = event.message.raw.as_ref().and_then(|frame| frame.to_bytes().ok());
            match bytes {
                Some(bytes) => println!("{}", hex_string(&bytes)),
                None => println!("-"),
            }
        }
    }
}

/// Command name, or its number when the catalog has no name for it.
fn command_label(command: &Value) -> String {
    match command {
        Value::String(name) => name.clone(),
        other => other.to_string(),
    }
}

pub fn print_capture(capture: &IqCapture, format: OutputFormat) {
    let identifier = capture
        .identifier
        .map_or_else(|| "unknown".to_string(), |id| id.to_string());
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "identifier": identifier,
            "iq": {
                "rssi": capture.rssi,
                "antenna": capture.antenna,
                "channel": capture.channel,
                "samplesLength": capture.samples_length,
                "complete": capture.is_complete(),
                "samples": capture.samples.iter().map(|s| [s.i, s.q]).collect::<Vec<_>>(),
            },
        })),
        _ => println!(
            "iq {} rssi={} antenna={} channel={} samples={}/{}",
            identifier,
            capture.rssi,
            capture.antenna,
            capture.channel,
            capture.samples.len(),
            capture.samples_length
        ),
    }
}
