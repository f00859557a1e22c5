use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rtls_manager::{IqAssembler, Mode, Phase, SequenceConfig};
use tracing::{info, warn};
use unpi_schema::{DeviceAddress, Payload};

use crate::exit::{manager_error, CliError, CliResult, FAILURE, INTERNAL, SUCCESS};
use crate::output::{print_capture, print_event, print_fleet, OutputFormat};

use super::identify::node_infos;
use super::{usage, ModeArg};

const POLL: Duration = Duration::from_millis(100);

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

fn sequence_config(args: &super::RunArgs) -> CliResult<SequenceConfig> {
    let mut config = SequenceConfig::default();
    match args.mode {
        ModeArg::Auto => {}
        ModeArg::Aoa => config = config.with_mode(Mode::AngleOfArrival),
        ModeArg::Tof => config = config.with_mode(Mode::Ranging),
    }
    if let Some(target) = &args.target {
        let target: DeviceAddress = target
            .parse()
            .map_err(|err| usage(format!("invalid --target '{target}': {err}")))?;
        config = config.with_target(target);
    }
    Ok(config)
}

pub fn run(args: super::RunArgs, format: OutputFormat) -> CliResult<i32> {
    let config = sequence_config(&args)?;
    let manager = args.fleet.manager(!args.no_auto_params)?;
    let events = manager.subscribe();
    manager.start().map_err(|err| manager_error("start", err))?;

    let fleet = manager.wait_identified();
    if !fleet.failed.is_empty() {
        print_fleet(&fleet, &node_infos(&manager), format);
    }
    let mode = manager
        .start_sequence(config)
        .map_err(|err| manager_error("sequence", err))?;
    info!(?mode, passives = fleet.passives.len(), "bring-up started");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    let deadline = args.duration.map(|d| Instant::now() + d);
    let mut iq = IqAssembler::new();
    let mut printed = 0usize;
    let mut code = SUCCESS;

    while running.load(Ordering::SeqCst) {
        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }
        if let Phase::Aborted(reason) = manager.phase() {
            warn!(%reason, "bring-up aborted");
            code = FAILURE;
            break;
        }

        let Some(event) = events.pend(true, Some(POLL)) else {
            continue;
        };
        if !args.iq_chunks && matches!(event.message.payload, Payload::AoaRaw(_)) {
            if let Some(capture) = iq.push(&event) {
                print_capture(&capture, format);
                printed += 1;
            }
            continue;
        }
        print_event(&event, manager.registry(), format);
        printed += 1;
    }

    for capture in iq.flush() {
        print_capture(&capture, format);
    }
    manager.stop();
    info!(events = printed, "stopped");
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::FleetArgs;

    fn args(mode: ModeArg, target: Option<&str>) -> super::super::RunArgs {
        super::super::RunArgs {
            fleet: FleetArgs {
                devices: vec!["/dev/null".parse().unwrap()],
                timeout: Duration::from_millis(10),
                baud: 115_200,
            },
            mode,
            target: target.map(str::to_string),
            count: None,
            duration: None,
            no_auto_params: false,
            iq_chunks: false,
        }
    }

    #[test]
    fn mode_and_target_reach_the_sequence() {
        let config = sequence_config(&args(ModeArg::Tof, Some("AA:BB:CC:DD:EE:FF"))).unwrap();
        assert_eq!(config.mode, Some(Mode::Ranging));
        assert_eq!(
            config.target,
            Some(DeviceAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]))
        );
        assert_eq!(sequence_config(&args(ModeArg::Auto, None)).unwrap().mode, None);
    }

    #[test]
    fn bad_target_is_a_usage_error() {
        let err = sequence_config(&args(ModeArg::Aoa, Some("not-an-address"))).unwrap_err();
        assert_eq!(err.code, crate::exit::USAGE);
    }
}
