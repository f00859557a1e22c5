use tracing::info;
use unpi_transport::available_ports;

use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::{print_ports, OutputFormat};

pub fn run(format: OutputFormat) -> CliResult<i32> {
    let ports = available_ports().map_err(|err| transport_error("ports", err))?;
    info!(count = ports.len(), "serial ports");
    print_ports(&ports, format);
    Ok(SUCCESS)
}
