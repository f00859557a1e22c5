use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crossbeam_channel::{select, Receiver};
use tracing::{debug, error, info, trace};
use unpi_frame::{Priority, UnpiType, RTLS};
use unpi_schema::commands::rtls;
use unpi_schema::{rtls_cmd, DeviceAddress, Message, Payload};

use rtls_node::{Bus, Identity, NodeMessage, Prioritized, PriorityQueue, RtlsNode};

use crate::sequencer::Sequencer;
use crate::state::Phase;

/// A command addressed to one device by identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Routed {
    pub to: DeviceAddress,
    pub message: Message,
}

impl Routed {
    pub fn new(to: DeviceAddress, message: Message) -> Self {
        Self { to, message }
    }
}

impl Prioritized for Routed {
    fn priority(&self) -> Priority {
        self.message.priority()
    }
}

/// Requests from the manager handle to its router thread.
pub(crate) enum Control {
    /// Outbound work was queued.
    Wake,
    Start(Box<Sequencer>),
    Stop,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State owned by the router thread.
///
/// Only this thread touches the sequencer, so coordination state is never
/// shared.
pub(crate) struct Router {
    pub nodes: Vec<Arc<RtlsNode>>,
    pub inbound: Receiver<NodeMessage>,
    pub control: Receiver<Control>,
    pub outbound: Arc<PriorityQueue<Routed>>,
    pub bus: Bus<NodeMessage>,
    pub auto_params: Arc<AtomicBool>,
    pub phase: Arc<Mutex<Phase>>,
    pub poll_interval: Duration,
    pub sequencer: Option<Sequencer>,
}

impl Router {
    /// Route until told to stop, then hand the router back for a restart.
    pub fn run(mut self) -> Self {
        debug!(nodes = self.nodes.len(), "router started");
        loop {
            select! {
                recv(self.inbound) -> event => match event {
                    Ok(event) => self.handle_inbound(event),
                    Err(_) => break,
                },
                recv(self.control) -> control => match control {
                    Ok(Control::Wake) => {}
                    Ok(Control::Start(sequencer)) => self.start_sequence(*sequencer),
                    Ok(Control::Stop) | Err(_) => break,
                },
                default(self.poll_interval) => {}
            }
            self.drain_outbound();
        }
        debug!("router stopped");
        self
    }

    fn start_sequence(&mut self, mut sequencer: Sequencer) {
        for routed in sequencer.start() {
            self.enqueue(routed);
        }
        *lock(&self.phase) = sequencer.phase().clone();
        self.sequencer = Some(sequencer);
    }

    fn handle_inbound(&mut self, event: NodeMessage) {
        trace!(node = %event.name, key = %event.message.key(), "inbound");
        self.relay_conn_params(&event);
        self.bus.publish(event.clone());

        let Some(sequencer) = self.sequencer.as_mut() else {
            return;
        };
        let step = sequencer.on_event(&event);
        *lock(&self.phase) = sequencer.phase().clone();
        for routed in step.commands {
            self.enqueue(routed);
        }
    }

    /// Hand the master's connection parameters to every passive.
    fn relay_conn_params(&self, event: &NodeMessage) {
        if !self.auto_params.load(Ordering::Relaxed) {
            return;
        }
        let msg = &event.message;
        if !msg.is(UnpiType::AsyncReq, RTLS, rtls_cmd::CONN_PARAMS) {
            return;
        }
        let Payload::ConnParams(params) = &msg.payload else {
            return;
        };
        if params.access_address == 0 {
            return;
        }
        let from_master = event
            .identifier
            .and_then(|id| self.identity_of(id))
            .is_some_and(|identity| identity.is_master());
        if !from_master {
            return;
        }
        for node in &self.nodes {
            if let Some(identity) = node.identity().filter(Identity::is_passive) {
                info!(passive = %identity.identifier, "relaying connection parameters");
                node.send(rtls::set_ble_conn_info(*params));
            }
        }
    }

    fn identity_of(&self, identifier: DeviceAddress) -> Option<Identity> {
        self.nodes
            .iter()
            .filter_map(|node| node.identity())
            .find(|identity| identity.identifier == identifier)
    }

    fn enqueue(&self, routed: Routed) {
        self.outbound.push(routed.priority(), routed);
    }

    fn drain_outbound(&self) {
        while let Some(routed) = self.outbound.try_pop() {
            route(&self.nodes, routed);
        }
    }
}

/// Deliver `routed` to the link whose device has its identity.
pub(crate) fn route(nodes: &[Arc<RtlsNode>], routed: Routed) {
    let target = nodes
        .iter()
        .find(|node| node.identity().is_some_and(|id| id.identifier == routed.to));
    match target {
        Some(node) => node.send(routed.message),
        None => {
            error!(identifier = %routed.to, "no link for identifier");
            debug_assert!(false, "routed a message to unknown identifier {}", routed.to);
        }
    }
}
