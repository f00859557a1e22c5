use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Sender};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use unpi_schema::{DeviceAddress, Message, MessageRegistry};
use unpi_transport::{Connector, SystemPorts};

use rtls_node::{
    Bus, CommandSink, Identity, NodeConfig, NodeMessage, PriorityQueue, RtlsCommands, RtlsNode,
    Subscriber,
};

use crate::bridge::{error_json, parse_inbound, Inbound};
use crate::control;
use crate::error::{ManagerError, Result};
use crate::router::{lock, Control, Routed, Router};
use crate::sequencer::{Mode, SequenceConfig, Sequencer};
use crate::state::Phase;

/// Configuration for an [`RtlsManager`].
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Shared bound for every device to answer its identify request.
    pub identify_timeout: Duration,
    /// How often the router checks for queued commands when idle.
    pub poll_interval: Duration,
    /// Relay the master's connection parameters to passives.
    pub auto_params: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            identify_timeout: Duration::from_millis(500),
            poll_interval: Duration::from_millis(50),
            auto_params: false,
        }
    }
}

/// A managed link, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub name: String,
    pub port: String,
    pub identity: Option<Identity>,
}

impl NodeInfo {
    fn of(node: &RtlsNode) -> Self {
        Self {
            name: node.name().to_string(),
            port: node.port().to_string(),
            identity: node.identity(),
        }
    }
}

/// The fleet split by role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identified {
    pub masters: Vec<Identity>,
    /// Every identified device that is not a master.
    pub passives: Vec<Identity>,
    pub failed: Vec<NodeInfo>,
}

/// Coordinates a fleet of RTLS devices.
///
/// Each device gets its own [`RtlsNode`]. Their decoded messages arrive on a
/// single router thread which publishes them on the manager's bus, relays
/// connection parameters when asked to, and feeds the bring-up
/// [`Sequencer`]. Commands are routed to devices by identity.
pub struct RtlsManager {
    config: ManagerConfig,
    registry: Arc<MessageRegistry>,
    nodes: Vec<Arc<RtlsNode>>,
    bus: Bus<NodeMessage>,
    outbound: Arc<PriorityQueue<Routed>>,
    auto_params: Arc<AtomicBool>,
    phase: Arc<Mutex<Phase>>,
    control: Sender<Control>,
    /// Holds the inbound channel open while no link does.
    _inbound: Sender<NodeMessage>,
    idle: Mutex<Option<Router>>,
    router: Mutex<Option<JoinHandle<Router>>>,
}

impl RtlsManager {
    /// Manage devices on real serial ports.
    pub fn new(nodes: Vec<NodeConfig>, registry: Arc<MessageRegistry>, config: ManagerConfig) -> Self {
        Self::with_connector(nodes, registry, config, Arc::new(SystemPorts))
    }

    /// Manage devices whose ports are opened through `connector`.
    pub fn with_connector(
        nodes: Vec<NodeConfig>,
        registry: Arc<MessageRegistry>,
        config: ManagerConfig,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (inbound_tx, inbound_rx) = unbounded();
        let (control_tx, control_rx) = unbounded();
        let nodes: Vec<Arc<RtlsNode>> = nodes
            .into_iter()
            .map(|node| {
                Arc::new(
                    RtlsNode::new(node, Arc::clone(&registry))
                        .with_connector(Arc::clone(&connector))
                        .with_sink(inbound_tx.clone()),
                )
            })
            .collect();

        let bus = Bus::new();
        let outbound = Arc::new(PriorityQueue::new());
        let auto_params = Arc::new(AtomicBool::new(config.auto_params));
        let phase = Arc::new(Mutex::new(Phase::Idle));
        let router = Router {
            nodes: nodes.clone(),
            inbound: inbound_rx,
            control: control_rx,
            outbound: Arc::clone(&outbound),
            bus: bus.clone(),
            auto_params: Arc::clone(&auto_params),
            phase: Arc::clone(&phase),
            poll_interval: config.poll_interval,
            sequencer: None,
        };

        Self {
            config,
            registry,
            nodes,
            bus,
            outbound,
            auto_params,
            phase,
            control: control_tx,
            _inbound: inbound_tx,
            idle: Mutex::new(Some(router)),
            router: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<MessageRegistry> {
        &self.registry
    }

    pub fn nodes(&self) -> &[Arc<RtlsNode>] {
        &self.nodes
    }

    /// The link talking to `identifier`.
    pub fn node(&self, identifier: DeviceAddress) -> Option<&Arc<RtlsNode>> {
        self.nodes
            .iter()
            .find(|node| node.identity().is_some_and(|id| id.identifier == identifier))
    }

    /// Bus every inbound device message is published on.
    pub fn bus(&self) -> &Bus<NodeMessage> {
        &self.bus
    }

    /// Start the router and every link.
    pub fn start(&self) -> Result<()> {
        let mut running = lock(&self.router);
        if running.is_some() {
            return Err(ManagerError::AlreadyStarted);
        }
        let router = lock(&self.idle).take().ok_or(ManagerError::AlreadyStarted)?;
        let handle = thread::Builder::new()
            .name("rtls-router".to_string())
            .spawn(move || router.run())
            .map_err(ManagerError::Spawn)?;
        *running = Some(handle);
        drop(running);

        for node in &self.nodes {
            node.start()?;
        }
        info!(nodes = self.nodes.len(), "manager started");
        Ok(())
    }

    /// Stop every link, then the router. Queued commands are dropped.
    pub fn stop(&self) {
        for node in &self.nodes {
            node.stop();
        }
        let Some(handle) = lock(&self.router).take() else {
            return;
        };
        // A closed channel means the router already exited; join reaps it.
        let _ = self.control.send(Control::Stop);
        match handle.join() {
            Ok(router) => *lock(&self.idle) = Some(router),
            Err(_) => error!("router thread panicked"),
        }
        let dropped = self.outbound.clear();
        if dropped > 0 {
            debug!(dropped, "discarded queued commands");
        }
        info!("manager stopped");
    }

    pub fn is_running(&self) -> bool {
        lock(&self.router).is_some()
    }

    /// Queue `message` for the device with identity `to`.
    pub fn send(&self, to: DeviceAddress, message: Message) -> Result<()> {
        if !self.is_running() {
            return Err(ManagerError::NotRunning);
        }
        if self.node(to).is_none() {
            return Err(ManagerError::UnknownDevice(to));
        }
        self.outbound.push(message.priority(), Routed::new(to, message));
        self.control
            .send(Control::Wake)
            .map_err(|_| ManagerError::NotRunning)
    }

    /// Typed commands for one device.
    pub fn device(&self, identifier: DeviceAddress) -> DeviceHandle<'_> {
        DeviceHandle {
            manager: self,
            identifier,
        }
    }

    /// Next message from any device.
    pub fn recv(&self, timeout: Duration) -> Option<NodeMessage> {
        self.bus.recv(timeout)
    }

    pub fn subscribe(&self) -> Subscriber<NodeMessage> {
        self.bus.subscribe()
    }

    /// Wait for every device to identify, within the configured bound.
    pub fn wait_identified(&self) -> Identified {
        let deadline = Instant::now() + self.config.identify_timeout;
        let mut identified = Identified::default();
        for node in &self.nodes {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match node.wait_identified(remaining) {
                Some(identity) if identity.is_master() => identified.masters.push(identity),
                Some(identity) => identified.passives.push(identity),
                None => {
                    warn!(node = %node.name(), port = %node.port(), "device did not identify");
                    identified.failed.push(NodeInfo::of(node));
                }
            }
        }
        identified
    }

    /// Identities known right now, split by role.
    pub fn fleet(&self) -> Identified {
        let mut fleet = Identified::default();
        for node in &self.nodes {
            match node.identity() {
                Some(identity) if identity.is_master() => fleet.masters.push(identity),
                Some(identity) => fleet.passives.push(identity),
                None => fleet.failed.push(NodeInfo::of(node)),
            }
        }
        fleet
    }

    /// Drive the fleet through the bring-up sequence.
    ///
    /// Uses the first identified master; every other non-master device
    /// takes part as a passive. Returns the mode that will run.
    pub fn start_sequence(&self, config: SequenceConfig) -> Result<Mode> {
        if !self.is_running() {
            return Err(ManagerError::NotRunning);
        }
        let fleet = self.fleet();
        let master = *fleet.masters.first().ok_or(ManagerError::NoMaster)?;
        if fleet.masters.len() > 1 {
            warn!(master = %master.identifier, "several masters identified, using the first");
        }
        let sequencer = Sequencer::new(config, master, fleet.passives)?;
        let mode = sequencer.mode();
        self.control
            .send(Control::Start(Box::new(sequencer)))
            .map_err(|_| ManagerError::NotRunning)?;
        Ok(mode)
    }

    /// Where the bring-up sequence stands.
    pub fn phase(&self) -> Phase {
        lock(&self.phase).clone()
    }

    pub fn set_auto_params(&self, enabled: bool) {
        self.auto_params.store(enabled, Ordering::Relaxed);
    }

    pub fn auto_params(&self) -> bool {
        self.auto_params.load(Ordering::Relaxed)
    }

    /// Handle one textual request from a remote consumer.
    ///
    /// Returns the reply to send back, if any. Commands are routed and
    /// produce no reply unless they fail.
    pub fn handle_text(&self, text: &str) -> Option<Value> {
        match parse_inbound(&self.registry, text) {
            Ok(Inbound::Control(request)) => {
                Some(control::respond(&request, &self.nodes, &self.registry))
            }
            Ok(Inbound::Command {
                identifier,
                message,
            }) => match self.send(identifier, message) {
                Ok(()) => None,
                Err(err) => Some(error_json("manager", err)),
            },
            Err(err) => {
                warn!(error = %err, "rejected textual request");
                Some(err.to_json())
            }
        }
    }

    /// Textual form of an event for remote consumers.
    pub fn event_json(&self, event: &NodeMessage) -> Value {
        event.to_json(&self.registry)
    }
}

impl Drop for RtlsManager {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Commands addressed to one managed device.
pub struct DeviceHandle<'a> {
    manager: &'a RtlsManager,
    identifier: DeviceAddress,
}

impl DeviceHandle<'_> {
    pub fn identifier(&self) -> DeviceAddress {
        self.identifier
    }

    pub fn rtls(&self) -> RtlsCommands<'_, Self> {
        RtlsCommands::new(self)
    }
}

impl CommandSink for DeviceHandle<'_> {
    fn submit(&self, message: Message) {
        if let Err(err) = self.manager.send(self.identifier, message) {
            warn!(identifier = %self.identifier, error = %err, "command not sent");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.identify_timeout, Duration::from_millis(500));
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert!(!config.auto_params);
    }

    #[test]
    fn commands_need_a_running_manager() {
        let registry = Arc::new(MessageRegistry::standard().unwrap());
        let manager = RtlsManager::new(Vec::new(), registry, ManagerConfig::default());
        let addr = DeviceAddress::new([1, 2, 3, 4, 5, 6]);
        assert!(matches!(
            manager.send(addr, unpi_schema::commands::rtls::scan()),
            Err(ManagerError::NotRunning)
        ));
        assert!(matches!(
            manager.start_sequence(SequenceConfig::default()),
            Err(ManagerError::NotRunning)
        ));
        assert_eq!(manager.phase(), Phase::Idle);
    }

    #[test]
    fn restarts_after_stop() {
        let registry = Arc::new(MessageRegistry::standard().unwrap());
        let manager = RtlsManager::new(Vec::new(), registry, ManagerConfig::default());
        manager.start().unwrap();
        assert!(matches!(manager.start(), Err(ManagerError::AlreadyStarted)));
        manager.stop();
        assert!(!manager.is_running());
        manager.start().unwrap();
        assert!(matches!(
            manager.start_sequence(SequenceConfig::default()),
            Err(ManagerError::NoMaster)
        ));
        manager.stop();
    }
}
