use std::io::{Read, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::BytesMut;
use rtls_node::{NodeConfig, RtlsNode};
use unpi_frame::{encode_frame, Frame, ParserConfig, StreamParser, UnpiType, RTLS};
use unpi_schema::{rtls_cmd, Capabilities, MessageRegistry, Payload, RtlsStatus};
use unpi_transport::{MemoryConnector, MemoryPort};

const MASTER_CAPS: u16 = 0x0080 | 0x0020;

fn wire(frame: &Frame) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_frame(frame, &mut buf).unwrap();
    buf.to_vec()
}

fn identify_reply(caps: u16) -> Vec<u8> {
    let mut payload = caps.to_le_bytes().to_vec();
    // AA:BB:CC:DD:EE:FF travels least significant byte first.
    payload.extend_from_slice(&[0xFF, 0xEE, 0xDD, 0xCC, 0xBB, 0xAA]);
    wire(&Frame::new(
        UnpiType::SyncRsp,
        RTLS,
        rtls_cmd::IDENTIFY,
        payload,
    ))
}

/// Read host frames until one with `command` arrives.
fn expect_command(device: &mut MemoryPort, command: u8) -> Frame {
    let mut parser = StreamParser::new(ParserConfig::default());
    let mut buf = BytesMut::new();
    let mut chunk = [0u8; 256];
    loop {
        if let Some(frame) = parser.next_frame(&mut buf) {
            if frame.command == command {
                return frame;
            }
            continue;
        }
        let n = device.read(&mut chunk).expect("host frame expected");
        assert!(n > 0, "host closed the link");
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn start_node(connector: &Arc<MemoryConnector>, port: &str) -> RtlsNode {
    let registry = Arc::new(MessageRegistry::standard().unwrap());
    let node = RtlsNode::new(NodeConfig::new(port), registry).with_connector(connector.clone());
    node.start().unwrap();
    assert!(node.wait_started(Duration::from_secs(2)));
    node
}

#[test]
fn identifies_through_line_noise() {
    let connector = Arc::new(MemoryConnector::new());
    let mut device = connector.attach("dev0");
    device.set_read_timeout(Duration::from_secs(2));
    let node = start_node(&connector, "dev0");

    expect_command(&mut device, rtls_cmd::IDENTIFY);
    let mut noisy = vec![0x00, 0xFE, 0x13, 0x37];
    noisy.extend(identify_reply(MASTER_CAPS));
    device.write_all(&noisy).unwrap();

    let identity = node
        .wait_identified(Duration::from_millis(500))
        .expect("device should identify");
    assert_eq!(identity.identifier.to_string(), "AA:BB:CC:DD:EE:FF");
    assert!(identity.capabilities.contains(Capabilities::RTLS_MASTER));
    node.stop();
}

#[test]
fn late_identify_reply_is_still_accepted() {
    let connector = Arc::new(MemoryConnector::new());
    let mut device = connector.attach("late");
    device.set_read_timeout(Duration::from_secs(2));
    let node = start_node(&connector, "late");

    expect_command(&mut device, rtls_cmd::IDENTIFY);
    assert_eq!(node.wait_identified(Duration::from_millis(100)), None);

    device.write_all(&identify_reply(0x0100)).unwrap();
    let identity = node.wait_identified(Duration::from_secs(1)).unwrap();
    assert!(identity.is_passive());
    node.stop();
}

#[test]
fn commands_and_events_flow_through_the_link() {
    let connector = Arc::new(MemoryConnector::new());
    let mut device = connector.attach("dev1");
    device.set_read_timeout(Duration::from_secs(2));
    let node = start_node(&connector, "dev1");
    let events = node.subscribe();

    expect_command(&mut device, rtls_cmd::IDENTIFY);
    device.write_all(&identify_reply(MASTER_CAPS)).unwrap();
    node.wait_identified(Duration::from_secs(1)).unwrap();

    node.rtls().scan();
    expect_command(&mut device, rtls_cmd::SCAN);
    device
        .write_all(&wire(&Frame::new(
            UnpiType::SyncRsp,
            RTLS,
            rtls_cmd::SCAN,
            vec![RtlsStatus::Success.as_u8()],
        )))
        .unwrap();

    let mut scan_rsp = None;
    while let Some(event) = events.pend(true, Some(Duration::from_secs(1))) {
        if event.message.command == rtls_cmd::SCAN {
            scan_rsp = Some(event);
            break;
        }
    }
    let scan_rsp = scan_rsp.expect("scan response should be published");
    assert_eq!(
        scan_rsp.identifier.map(|addr| addr.to_string()).as_deref(),
        Some("AA:BB:CC:DD:EE:FF")
    );
    assert_eq!(scan_rsp.message.payload.status(), Some(RtlsStatus::Success));
    node.stop();
}

#[test]
fn standalone_recv_returns_next_message() {
    let connector = Arc::new(MemoryConnector::new());
    let mut device = connector.attach("dev2");
    device.set_read_timeout(Duration::from_secs(2));
    let node = Arc::new(start_node(&connector, "dev2"));
    expect_command(&mut device, rtls_cmd::IDENTIFY);

    let receiver = Arc::clone(&node);
    let waiter = thread::spawn(move || receiver.recv(Duration::from_secs(2)));
    thread::sleep(Duration::from_millis(50));
    device.write_all(&identify_reply(MASTER_CAPS)).unwrap();

    let message = waiter.join().unwrap().expect("a message should arrive");
    assert!(matches!(message.message.payload, Payload::Identify(_)));
    assert!(node.recv(Duration::from_millis(20)).is_none());
    node.stop();
}

#[test]
fn device_disconnect_is_recorded() {
    let connector = Arc::new(MemoryConnector::new());
    let device = connector.attach("gone");
    let node = start_node(&connector, "gone");
    drop(device);

    for _ in 0..100 {
        if !node.is_running() {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert!(!node.is_running());
    assert!(node.error().is_some());
}
