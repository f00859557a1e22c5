use rtls_manager::{NodeInfo, RtlsManager};
use tracing::info;

use crate::exit::{manager_error, CliResult, FAILURE, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_fleet, OutputFormat};

pub(crate) fn node_infos(manager: &RtlsManager) -> Vec<NodeInfo> {
    manager
        .nodes()
        .iter()
        .map(|node| NodeInfo {
            name: node.name().to_string(),
            port: node.port().to_string(),
            identity: node.identity(),
        })
        .collect()
}

pub fn run(args: super::IdentifyArgs, format: OutputFormat) -> CliResult<i32> {
    let manager = args.fleet.manager(false)?;
    manager.start().map_err(|err| manager_error("start", err))?;

    let fleet = manager.wait_identified();
    info!(
        masters = fleet.masters.len(),
        passives = fleet.passives.len(),
        failed = fleet.failed.len(),
        "identification finished"
    );
    print_fleet(&fleet, &node_infos(&manager), format);
    manager.stop();

    let identified = fleet.masters.len() + fleet.passives.len();
    Ok(if identified == 0 {
        TRANSPORT_ERROR
    } else if !fleet.failed.is_empty() {
        FAILURE
    } else {
        SUCCESS
    })
}
