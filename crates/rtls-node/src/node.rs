use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use crossbeam_channel::Sender;
use tracing::{debug, error, info, trace, warn};
use unpi_frame::{encode_frame, ParserConfig, StreamParser};
use unpi_schema::commands::rtls;
use unpi_schema::types::hex_string;
use unpi_schema::{Message, MessageRegistry, Originator};
use unpi_transport::{Connector, PortSettings, SerialStream, SystemPorts};

use crate::bus::{Bus, Subscriber};
use crate::commands::{CommandSink, RtlsCommands};
use crate::envelope::{NodeMessage, Prioritized};
use crate::error::{NodeError, Result};
use crate::identify::{identity_from, IdentifyConfig, Identity};
use crate::queue::{lock, PriorityQueue};
use crate::signal::Signal;

const READ_CHUNK: usize = 4096;

/// Configuration for one device link.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub port: PortSettings,
    /// Friendly name; defaults to the port name.
    pub name: Option<String>,
    pub identify: IdentifyConfig,
    pub parser: ParserConfig,
}

impl NodeConfig {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: PortSettings::new(port),
            name: None,
            identify: IdentifyConfig::default(),
            parser: ParserConfig::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.port = self.port.with_baud_rate(baud_rate);
        self
    }

    pub fn with_identify_timeout(mut self, timeout: Duration) -> Self {
        self.identify.timeout = timeout;
        self
    }

    /// The friendly name, or the port name when none was given.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.port.port)
    }
}

/// State shared between a node handle and its link thread.
struct Shared {
    name: String,
    outbound: PriorityQueue<Message>,
    bus: Bus<NodeMessage>,
    identity: OnceLock<Identity>,
    started: Signal,
    identified: Signal,
    stop: AtomicBool,
    error: Mutex<Option<Arc<NodeError>>>,
}

impl Shared {
    fn record_error(&self, err: NodeError) {
        error!(node = %self.name, error = %err, "link failed");
        *lock(&self.error) = Some(Arc::new(err));
    }
}

/// One serial link to an RTLS device.
///
/// [`start`](RtlsNode::start) opens the port on a dedicated thread, sends an
/// identify request, and then loops: write at most one queued command, read
/// whatever arrived within the port's read timeout, and decode complete
/// frames. Decoded messages are tagged with the device identity and handed
/// to the node's subscribers and, when set, to the sink given with
/// [`with_sink`](RtlsNode::with_sink).
pub struct RtlsNode {
    config: NodeConfig,
    connector: Arc<dyn Connector>,
    registry: Arc<MessageRegistry>,
    sink: Option<Sender<NodeMessage>>,
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl RtlsNode {
    /// Create a link that opens real serial ports.
    pub fn new(config: NodeConfig, registry: Arc<MessageRegistry>) -> Self {
        let name = config.display_name().to_string();
        Self {
            config,
            connector: Arc::new(SystemPorts),
            registry,
            sink: None,
            shared: Arc::new(Shared {
                name,
                outbound: PriorityQueue::new(),
                bus: Bus::new(),
                identity: OnceLock::new(),
                started: Signal::new(),
                identified: Signal::new(),
                stop: AtomicBool::new(false),
                error: Mutex::new(None),
            }),
            thread: Mutex::new(None),
        }
    }

    /// Open ports through `connector` instead of the system serial ports.
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    /// Also forward every decoded message to `sink`.
    pub fn with_sink(mut self, sink: Sender<NodeMessage>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn port(&self) -> &str {
        &self.config.port.port
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Spawn the link thread.
    pub fn start(&self) -> Result<()> {
        let mut thread = lock(&self.thread);
        if thread.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Err(NodeError::AlreadyStarted(self.shared.name.clone()));
        }
        if let Some(finished) = thread.take() {
            // The previous run already exited; a panic in it has been logged.
            let _ = finished.join();
        }

        self.shared.stop.store(false, Ordering::Release);
        self.shared.started.reset();
        *lock(&self.shared.error) = None;

        let link = Link {
            shared: Arc::clone(&self.shared),
            settings: self.config.port.clone(),
            identify: self.config.identify.clone(),
            parser: StreamParser::new(self.config.parser.clone()),
            connector: Arc::clone(&self.connector),
            registry: Arc::clone(&self.registry),
            sink: self.sink.clone(),
        };
        let handle = thread::Builder::new()
            .name(format!("link-{}", self.shared.name))
            .spawn(move || link.run())
            .map_err(NodeError::Spawn)?;
        *thread = Some(handle);
        Ok(())
    }

    /// Stop the link thread and wait for it to exit.
    ///
    /// Commands still queued for the device are dropped.
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::Release);
        if let Some(handle) = lock(&self.thread).take() {
            if handle.join().is_err() {
                error!(node = %self.shared.name, "link thread panicked");
            }
        }
        let dropped = self.shared.outbound.clear();
        if dropped > 0 {
            debug!(node = %self.shared.name, dropped, "dropped unsent commands");
        }
        self.shared.started.reset();
    }

    /// True while the link thread is running.
    pub fn is_running(&self) -> bool {
        lock(&self.thread)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Queue a message for the device.
    pub fn send(&self, message: Message) {
        self.shared.outbound.push(message.priority(), message);
    }

    /// Typed RTLS commands for this device.
    pub fn rtls(&self) -> RtlsCommands<'_, Self> {
        RtlsCommands::new(self)
    }

    /// Wait up to `timeout` for the next message from this device.
    pub fn recv(&self, timeout: Duration) -> Option<NodeMessage> {
        self.shared.bus.recv(timeout)
    }

    /// Subscribe to every message from this device.
    pub fn subscribe(&self) -> Subscriber<NodeMessage> {
        self.shared.bus.subscribe()
    }

    /// Wait until the port has been opened.
    pub fn wait_started(&self, timeout: Duration) -> bool {
        self.shared.started.wait(timeout)
    }

    /// Wait until the device has identified itself.
    pub fn wait_identified(&self, timeout: Duration) -> Option<Identity> {
        if self.shared.identified.wait(timeout) {
            self.identity()
        } else {
            None
        }
    }

    /// Identity reported by the device, once known.
    pub fn identity(&self) -> Option<Identity> {
        self.shared.identity.get().copied()
    }

    /// The error that terminated the link thread, if any.
    pub fn error(&self) -> Option<Arc<NodeError>> {
        lock(&self.shared.error).clone()
    }
}

impl CommandSink for RtlsNode {
    fn submit(&self, message: Message) {
        self.send(message);
    }
}

impl Drop for RtlsNode {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything the link thread owns.
struct Link {
    shared: Arc<Shared>,
    settings: PortSettings,
    identify: IdentifyConfig,
    parser: StreamParser,
    connector: Arc<dyn Connector>,
    registry: Arc<MessageRegistry>,
    sink: Option<Sender<NodeMessage>>,
}

impl Link {
    fn run(mut self) {
        let mut port = match self.connector.open(&self.settings) {
            Ok(port) => port,
            Err(err) => {
                self.shared.record_error(err.into());
                return;
            }
        };
        info!(node = %self.shared.name, port = %self.settings, "link opened");
        self.shared.started.set();

        if self.shared.identity.get().is_none() {
            self.shared.outbound.push(unpi_frame::Priority::Urgent, rtls::identify());
        }
        let identify_deadline = Instant::now() + self.identify.timeout;
        let mut identify_reported = false;

        let mut buf = BytesMut::with_capacity(READ_CHUNK);
        let mut chunk = [0u8; READ_CHUNK];

        while !self.shared.stop.load(Ordering::Acquire) {
            if let Some(message) = self.shared.outbound.try_pop() {
                if let Err(err) = self.write_message(port.as_mut(), &message) {
                    self.shared.record_error(err);
                    break;
                }
            }

            match port.read(&mut chunk) {
                Ok(0) => {
                    self.shared
                        .record_error(NodeError::Disconnected(self.shared.name.clone()));
                    break;
                }
                Ok(n) => {
                    trace!(node = %self.shared.name, "<<< {}", hex_string(&chunk[..n]));
                    buf.extend_from_slice(&chunk[..n]);
                    while let Some(frame) = self.parser.next_frame(&mut buf) {
                        let message = self.registry.decode(Originator::Nwp, &frame);
                        self.deliver(message);
                    }
                }
                Err(err)
                    if matches!(
                        err.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) => {}
                Err(err) => {
                    self.shared.record_error(unpi_transport::TransportError::Io(err).into());
                    break;
                }
            }

            if !identify_reported
                && self.shared.identity.get().is_none()
                && Instant::now() >= identify_deadline
            {
                warn!(
                    node = %self.shared.name,
                    timeout = ?self.identify.timeout,
                    "device did not identify in time"
                );
                identify_reported = true;
            }
        }

        let stats = self.parser.stats();
        debug!(
            node = %self.shared.name,
            frames = stats.frames,
            skipped_bytes = stats.skipped_bytes,
            checksum_errors = stats.checksum_errors,
            "link closed"
        );
    }

    fn write_message(&self, port: &mut dyn SerialStream, message: &Message) -> Result<()> {
        let frame = match message.to_frame() {
            Ok(frame) => frame,
            Err(err) => {
                warn!(node = %self.shared.name, key = %message.key(), error = %err, "dropping unencodable command");
                return Ok(());
            }
        };
        let mut wire = BytesMut::with_capacity(frame.wire_size());
        encode_frame(&frame, &mut wire)?;
        trace!(node = %self.shared.name, ">>> {}", hex_string(&wire));
        port.write_all(&wire)
            .and_then(|()| port.flush())
            .map_err(|err| unpi_transport::TransportError::Io(err).into())
    }

    fn deliver(&self, message: Message) {
        if self.shared.identity.get().is_none() {
            if let Some(identity) = identity_from(&message) {
                if self.shared.identity.set(identity).is_ok() {
                    info!(node = %self.shared.name, %identity, "device identified");
                    self.shared.identified.set();
                }
            }
        }

        let tagged = NodeMessage::new(
            self.shared.identity.get().map(|identity| identity.identifier),
            self.shared.name.clone(),
            message,
        );
        debug!(
            node = %self.shared.name,
            key = %tagged.message.key(),
            priority = ?tagged.priority(),
            "received message"
        );

        if let Some(sink) = &self.sink {
            if sink.send(tagged.clone()).is_err() {
                debug!(node = %self.shared.name, "message sink closed");
            }
        }
        self.shared.bus.publish(tagged);
    }
}
