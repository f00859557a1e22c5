//! Simulated RTLS devices on in-memory serial lines.

#![allow(dead_code)]

use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use unpi_frame::{encode_frame, ParserConfig, StreamParser, UnpiType, RTLS};
use unpi_schema::payload::{IdentifyRsp, StatusRsp};
use unpi_schema::{
    rtls_cmd, Capabilities, DeviceAddress, Message, MessageRegistry, Originator, Payload,
    RtlsStatus,
};
use unpi_transport::MemoryConnector;

/// Host requests a simulated device has seen.
#[derive(Clone, Default)]
pub struct Received(Arc<Mutex<Vec<Message>>>);

impl Received {
    pub fn count(&self, command: u8) -> usize {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.command == command)
            .count()
    }

    pub fn all(&self, command: u8) -> Vec<Message> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.command == command)
            .cloned()
            .collect()
    }
}

/// A device answering host requests from a script.
pub struct SimDevice {
    pub address: DeviceAddress,
    pub received: Received,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for SimDevice {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

pub fn address(last: u8) -> DeviceAddress {
    DeviceAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, last])
}

/// A device-originated message.
pub fn from_device(unpi_type: UnpiType, command: u8, payload: Payload) -> Message {
    Message::new(Originator::Nwp, unpi_type, RTLS, command, payload)
}

/// Successful synchronous reply to `command`.
pub fn ok(command: u8) -> Message {
    status(UnpiType::SyncRsp, command, RtlsStatus::Success)
}

pub fn status(unpi_type: UnpiType, command: u8, status: RtlsStatus) -> Message {
    from_device(unpi_type, command, Payload::Status(StatusRsp { status }))
}

/// Attach a device under `port` that identifies as `address` with `caps`
/// and answers every other request through `script`.
pub fn spawn<F>(
    connector: &MemoryConnector,
    port: &str,
    address: DeviceAddress,
    caps: Capabilities,
    mut script: F,
) -> SimDevice
where
    F: FnMut(&Message) -> Vec<Message> + Send + 'static,
{
    let mut line = connector.attach(port);
    line.set_read_timeout(Duration::from_millis(10));
    let registry = MessageRegistry::standard().unwrap();
    let received = Received::default();
    let stop = Arc::new(AtomicBool::new(false));

    let seen = received.clone();
    let halt = Arc::clone(&stop);
    let thread = thread::spawn(move || {
        let mut parser = StreamParser::new(ParserConfig::default());
        let mut buf = BytesMut::new();
        let mut chunk = [0u8; 512];
        while !halt.load(Ordering::SeqCst) {
            match line.read(&mut chunk) {
                Ok(0) => return,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == ErrorKind::TimedOut => continue,
                Err(_) => return,
            }
            while let Some(frame) = parser.next_frame(&mut buf) {
                let request = registry.decode(Originator::Ap, &frame);
                seen.0.lock().unwrap().push(request.clone());
                let replies = if request.command == rtls_cmd::IDENTIFY {
                    vec![from_device(
                        UnpiType::SyncRsp,
                        rtls_cmd::IDENTIFY,
                        Payload::Identify(IdentifyRsp {
                            capabilities: caps,
                            identifier: address,
                        }),
                    )]
                } else {
                    script(&request)
                };
                for reply in replies {
                    let mut wire = BytesMut::new();
                    encode_frame(&reply.to_frame().unwrap(), &mut wire).unwrap();
                    if line.write_all(&wire).is_err() {
                        return;
                    }
                }
            }
        }
    });

    SimDevice {
        address,
        received,
        stop,
        thread: Some(thread),
    }
}

/// Poll `check` until it holds or `timeout` passes.
pub fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    check()
}
