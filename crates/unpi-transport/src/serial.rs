use serialport::SerialPortType;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{Connector, PortSettings, SerialStream};

/// Opens ports on the host through the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPorts;

impl Connector for SystemPorts {
    fn open(&self, settings: &PortSettings) -> Result<Box<dyn SerialStream>> {
        debug!(port = %settings.port, baud = settings.baud_rate, "opening serial port");
        let port = serialport::new(&settings.port, settings.baud_rate)
            .timeout(settings.read_timeout)
            .open()
            .map_err(|err| TransportError::Open {
                port: settings.port.clone(),
                message: err.to_string(),
            })?;
        Ok(Box::new(port))
    }
}

/// A port found on this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescription {
    /// Port name to pass to [`PortSettings::new`].
    pub name: String,
    /// Short description of the port kind.
    pub kind: String,
    /// USB vendor/product and serial number, when the port is a USB device.
    pub detail: Option<String>,
}

/// List the serial ports present on this host.
pub fn available_ports() -> Result<Vec<PortDescription>> {
    let ports =
        serialport::available_ports().map_err(|err| TransportError::Enumerate(err.to_string()))?;

    Ok(ports
        .into_iter()
        .map(|info| {
            let (kind, detail) = match info.port_type {
                SerialPortType::UsbPort(usb) => {
                    let mut detail = format!("{:04x}:{:04x}", usb.vid, usb.pid);
                    if let Some(product) = usb.product {
                        detail.push(' ');
                        detail.push_str(&product);
                    }
                    if let Some(serial) = usb.serial_number {
                        detail.push_str(" sn=");
                        detail.push_str(&serial);
                    }
                    ("usb".to_string(), Some(detail))
                }
                SerialPortType::BluetoothPort => ("bluetooth".to_string(), None),
                SerialPortType::PciPort => ("pci".to_string(), None),
                SerialPortType::Unknown => ("unknown".to_string(), None),
            };
            PortDescription {
                name: info.port_name,
                kind,
                detail,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_port_reports_port_name() {
        let settings = PortSettings::new("/dev/rtls-test-port-that-does-not-exist");
        let err = match SystemPorts.open(&settings) {
            Ok(_) => panic!("opening a missing port should fail"),
            Err(err) => err,
        };
        match err {
            TransportError::Open { port, .. } => {
                assert_eq!(port, "/dev/rtls-test-port-that-does-not-exist")
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
