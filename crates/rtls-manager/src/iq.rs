//! Reassembly of raw angle-of-arrival IQ bursts.
//!
//! Devices in raw mode split each burst into chunks that carry their sample
//! offset. A chunk with offset 0 marks the start of a new burst, so the
//! previous one is complete when it arrives.

use std::collections::{BTreeMap, HashMap};

use unpi_schema::payload::{AoaResultRaw, IqSample};
use unpi_schema::DeviceAddress;

use rtls_node::NodeMessage;

/// One complete burst of IQ samples from one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IqCapture {
    pub identifier: Option<DeviceAddress>,
    pub rssi: i8,
    pub antenna: u8,
    pub channel: u8,
    /// Burst length the device announced.
    pub samples_length: u16,
    /// Samples ordered by their index within the burst.
    pub samples: Vec<IqSample>,
}

impl IqCapture {
    /// True when every announced sample arrived.
    pub fn is_complete(&self) -> bool {
        self.samples.len() == usize::from(self.samples_length)
    }
}

#[derive(Debug)]
struct Pending {
    rssi: i8,
    antenna: u8,
    channel: u8,
    samples_length: u16,
    samples: BTreeMap<usize, IqSample>,
}

impl Pending {
    fn new(chunk: &AoaResultRaw) -> Self {
        Self {
            rssi: chunk.rssi,
            antenna: chunk.antenna,
            channel: chunk.channel,
            samples_length: chunk.samples_length,
            samples: BTreeMap::new(),
        }
    }

    fn finish(self, identifier: Option<DeviceAddress>) -> IqCapture {
        IqCapture {
            identifier,
            rssi: self.rssi,
            antenna: self.antenna,
            channel: self.channel,
            samples_length: self.samples_length,
            samples: self.samples.into_values().collect(),
        }
    }
}

/// Collects raw IQ chunks per device into whole bursts.
#[derive(Debug, Default)]
pub struct IqAssembler {
    pending: HashMap<Option<DeviceAddress>, Pending>,
}

impl IqAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one event. Returns the device's previous burst when this event
    /// starts a new one.
    ///
    /// Events that are not raw IQ results are ignored.
    pub fn push(&mut self, event: &NodeMessage) -> Option<IqCapture> {
        let unpi_schema::Payload::AoaRaw(chunk) = &event.message.payload else {
            return None;
        };
        let key = event.identifier;

        let mut completed = None;
        if chunk.offset == 0 {
            if let Some(previous) = self.pending.remove(&key) {
                if !previous.samples.is_empty() {
                    completed = Some(previous.finish(key));
                }
            }
        }

        let pending = self.pending.entry(key).or_insert_with(|| Pending::new(chunk));
        let base = usize::from(chunk.offset);
        for (i, sample) in chunk.samples.iter().enumerate() {
            pending.samples.insert(base + i, *sample);
        }
        completed
    }

    /// Number of devices with a burst in progress.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Complete every burst still in progress.
    pub fn flush(&mut self) -> Vec<IqCapture> {
        let mut captures: Vec<IqCapture> = self
            .pending
            .drain()
            .filter(|(_, pending)| !pending.samples.is_empty())
            .map(|(key, pending)| pending.finish(key))
            .collect();
        captures.sort_by_key(|capture| capture.identifier);
        captures
    }
}
