mod identify;
mod ports;
mod run;
mod version;

use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use rtls_manager::{ManagerConfig, RtlsManager};
use rtls_node::NodeConfig;
use unpi_schema::MessageRegistry;
use unpi_transport::DEFAULT_BAUD_RATE;

use crate::exit::{schema_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List serial ports present on this host.
    Ports,
    /// Identify the devices on the given ports.
    Identify(IdentifyArgs),
    /// Bring up the fleet and print events until interrupted.
    Run(RunArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// A device port with an optional friendly name: `PORT[=NAME]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSpec {
    pub port: String,
    pub name: Option<String>,
}

impl std::str::FromStr for DeviceSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (port, name) = match s.split_once('=') {
            Some((port, name)) => (port, Some(name)),
            None => (s, None),
        };
        if port.is_empty() {
            return Err(format!("missing port in '{s}'"));
        }
        if name.is_some_and(str::is_empty) {
            return Err(format!("empty name in '{s}'"));
        }
        Ok(Self {
            port: port.to_string(),
            name: name.map(str::to_string),
        })
    }
}

#[derive(Args, Debug)]
pub struct FleetArgs {
    /// Devices as PORT or PORT=NAME.
    #[arg(value_name = "PORT[=NAME]", required = true)]
    pub devices: Vec<DeviceSpec>,

    /// Time every device has to answer its identify request.
    #[arg(long, default_value = "500ms", value_parser = parse_duration)]
    pub timeout: Duration,

    /// Serial baud rate.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
}

impl FleetArgs {
    fn node_configs(&self) -> Vec<NodeConfig> {
        self.devices
            .iter()
            .map(|device| {
                let config = NodeConfig::new(&device.port)
                    .with_baud_rate(self.baud)
                    .with_identify_timeout(self.timeout);
                match &device.name {
                    Some(name) => config.with_name(name),
                    None => config,
                }
            })
            .collect()
    }

    fn manager(&self, auto_params: bool) -> CliResult<RtlsManager> {
        let registry = MessageRegistry::standard().map_err(|err| schema_error("registry", err))?;
        let config = ManagerConfig {
            identify_timeout: self.timeout,
            auto_params,
            ..ManagerConfig::default()
        };
        Ok(RtlsManager::new(self.node_configs(), Arc::new(registry), config))
    }
}

#[derive(Args, Debug)]
pub struct IdentifyArgs {
    #[command(flatten)]
    pub fleet: FleetArgs,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Pick from the devices' capabilities.
    Auto,
    Aoa,
    Tof,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub fleet: FleetArgs,

    /// Measurement mode.
    #[arg(long, value_enum, default_value = "auto")]
    pub mode: ModeArg,

    /// Only connect to this peer address (AA:BB:CC:DD:EE:FF).
    #[arg(long)]
    pub target: Option<String>,

    /// Exit after this many events.
    #[arg(long)]
    pub count: Option<usize>,

    /// Exit after this long.
    #[arg(long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Do not relay the master's connection parameters to passives.
    #[arg(long)]
    pub no_auto_params: bool,

    /// Print every raw IQ chunk instead of reassembled bursts.
    #[arg(long)]
    pub iq_chunks: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Include build target and enabled features.
    #[arg(long)]
    pub extended: bool,
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ports => ports::run(format),
        Command::Identify(args) => identify::run(args, format),
        Command::Run(args) => run::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

/// Parse "2s", "150ms", or bare seconds.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    if let Some(ms) = value.strip_suffix("ms") {
        let ms = ms
            .parse::<u64>()
            .map_err(|_| format!("invalid milliseconds: {value}"))?;
        return Ok(Duration::from_millis(ms));
    }
    let secs = value.strip_suffix('s').unwrap_or(value);
    let secs = secs
        .parse::<u64>()
        .map_err(|_| format!("invalid duration: {value}"))?;
    Ok(Duration::from_secs(secs))
}

pub(crate) fn usage(message: impl Into<String>) -> CliError {
    CliError::new(USAGE, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_device_specs() {
        let plain: DeviceSpec = "/dev/ttyACM0".parse().unwrap();
        assert_eq!(plain.port, "/dev/ttyACM0");
        assert_eq!(plain.name, None);

        let named: DeviceSpec = "COM3=master".parse().unwrap();
        assert_eq!(named.port, "COM3");
        assert_eq!(named.name.as_deref(), Some("master"));

        assert!("=master".parse::<DeviceSpec>().is_err());
        assert!("COM3=".parse::<DeviceSpec>().is_err());
    }

    #[test]
    fn parses_durations() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
        assert!(parse_duration("soon").is_err());
    }
}
