//! The AoA and ToF bring-up sequence as a pure state machine.
//!
//! A [`Sequencer`] never touches a link. It consumes decoded events through
//! [`Sequencer::on_event`] and answers with the commands to route next, so
//! the router thread stays the only place coordination state changes.

use std::collections::HashMap;

use tracing::{debug, error, info, warn};
use unpi_frame::{UnpiType, RTLS, UTIL};
use unpi_schema::commands::rtls;
use unpi_schema::payload::{AoaSetParamsReq, TofSetParamsReq};
use unpi_schema::{
    rtls_cmd, util_cmd, AoaResultMode, AoaRole, Capabilities, DeviceAddress, Message, Originator,
    Payload, TofResultMode, TofRole, TofRunMode,
};

use rtls_node::{Identity, NodeMessage};

use crate::error::{ManagerError, Result};
use crate::router::Routed;
use crate::state::{CoordinationState, Phase};

/// Which kind of measurement the fleet runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Time-of-flight ranging.
    Ranging,
    /// Angle-of-arrival sampling.
    AngleOfArrival,
}

impl Mode {
    /// Pick the mode the fleet's capabilities allow.
    ///
    /// Ranging needs every device to advertise a ToF master or passive role.
    /// Angle-of-arrival is used when none does and needs a passive.
    pub fn detect(master: &Identity, passives: &[Identity]) -> Result<Mode> {
        let fleet: Vec<&Identity> = std::iter::once(master).chain(passives).collect();
        let ranging = fleet.iter().filter(|id| id.supports_tof()).count();
        if ranging == fleet.len() {
            Ok(Mode::Ranging)
        } else if ranging == 0 {
            if passives.is_empty() {
                Err(ManagerError::NoPassives)
            } else {
                Ok(Mode::AngleOfArrival)
            }
        } else {
            let without: Vec<String> = fleet
                .iter()
                .filter(|id| !id.supports_tof())
                .map(|id| id.identifier.to_string())
                .collect();
            Err(ManagerError::MixedModes(format!(
                "{} lack a ToF role",
                without.join(", ")
            )))
        }
    }
}

/// Ranging parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TofSettings {
    pub samples_per_burst: u16,
    pub frequencies: Vec<u16>,
    pub auto_rssi: i8,
    pub result_mode: TofResultMode,
    pub run_mode: TofRunMode,
    /// Samples per frequency while calibrating.
    pub samples_per_freq: u16,
    /// Calibration distance in meters.
    pub calib_distance: u8,
}

impl Default for TofSettings {
    fn default() -> Self {
        Self {
            samples_per_burst: 256,
            frequencies: vec![2408, 2412, 2418, 2424],
            auto_rssi: -55,
            result_mode: TofResultMode::Distance,
            run_mode: TofRunMode::Continuous,
            samples_per_freq: 1000,
            calib_distance: 1,
        }
    }
}

impl TofSettings {
    fn request(&self, role: TofRole) -> TofSetParamsReq {
        let mut request = TofSetParamsReq {
            tof_role: role,
            num_samples: self.samples_per_burst,
            num_freq: 0,
            auto_tof_rssi_thresh: self.auto_rssi,
            result_mode: self.result_mode,
            run_mode: self.run_mode,
            frequencies: self.frequencies.clone(),
        };
        // Checked in Sequencer::new.
        request.num_freq = request.frequency_count().unwrap_or(u8::MAX);
        request
    }
}

/// Angle-of-arrival parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AoaSettings {
    pub result_mode: AoaResultMode,
    pub cte_scan_ovs: u8,
    pub cte_offset: u8,
    pub cte_time: u16,
}

impl Default for AoaSettings {
    fn default() -> Self {
        Self {
            result_mode: AoaResultMode::Raw,
            cte_scan_ovs: 4,
            cte_offset: 4,
            cte_time: 20,
        }
    }
}

impl AoaSettings {
    fn request(&self, role: AoaRole) -> AoaSetParamsReq {
        AoaSetParamsReq {
            aoa_role: role,
            aoa_result_mode: self.result_mode,
            cte_scan_ovs: self.cte_scan_ovs,
            cte_offset: self.cte_offset,
            cte_time: self.cte_time,
        }
    }
}

/// How to run the sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceConfig {
    /// Forced mode; detected from capabilities when `None`.
    pub mode: Option<Mode>,
    /// Only connect to this slave address.
    pub target: Option<DeviceAddress>,
    pub tof: TofSettings,
    pub aoa: AoaSettings,
}

impl SequenceConfig {
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_target(mut self, target: DeviceAddress) -> Self {
        self.target = Some(target);
        self
    }
}

/// Commands produced by one event, and whether the sequence gave up.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Step {
    pub commands: Vec<Routed>,
    pub aborted: Option<String>,
}

impl Step {
    fn send(&mut self, to: DeviceAddress, message: Message) {
        self.commands.push(Routed::new(to, message));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Master,
    Passive,
}

/// Drives one master and its passives from scan to measurement.
#[derive(Debug)]
pub struct Sequencer {
    config: SequenceConfig,
    mode: Mode,
    master: Identity,
    passives: Vec<Identity>,
    states: HashMap<DeviceAddress, CoordinationState>,
    phase: Phase,
    scanned: Option<(u8, DeviceAddress)>,
}

impl Sequencer {
    /// Set up a sequence for an identified fleet.
    ///
    /// Fails when the fleet's capabilities do not allow the requested (or
    /// detected) mode.
    pub fn new(config: SequenceConfig, master: Identity, passives: Vec<Identity>) -> Result<Self> {
        let mode = match config.mode {
            Some(Mode::AngleOfArrival) if passives.is_empty() => {
                return Err(ManagerError::NoPassives)
            }
            Some(mode) => mode,
            None => Mode::detect(&master, &passives)?,
        };
        if mode == Mode::Ranging {
            config.tof.request(TofRole::Master).frequency_count()?;
        }
        let states = std::iter::once(&master)
            .chain(&passives)
            .map(|id| {
                let state = CoordinationState {
                    identified: true,
                    ..CoordinationState::default()
                };
                (id.identifier, state)
            })
            .collect();
        Ok(Self {
            config,
            mode,
            master,
            passives,
            states,
            phase: Phase::Idle,
            scanned: None,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn master(&self) -> &Identity {
        &self.master
    }

    pub fn passives(&self) -> &[Identity] {
        &self.passives
    }

    /// Progress of one device, if it takes part.
    pub fn state(&self, identifier: DeviceAddress) -> Option<&CoordinationState> {
        self.states.get(&identifier)
    }

    /// Begin: the master scans for a slave.
    pub fn start(&mut self) -> Vec<Routed> {
        info!(
            master = %self.master.identifier,
            passives = self.passives.len(),
            mode = ?self.mode,
            "starting sequence"
        );
        let mut step = Step::default();
        self.rescan(&mut step);
        step.commands
    }

    /// Advance on one decoded event.
    pub fn on_event(&mut self, event: &NodeMessage) -> Step {
        let mut step = Step::default();
        if !self.phase.is_active() {
            return step;
        }
        let Some(from) = event.identifier else {
            return step;
        };
        let Some(role) = self.role_of(from) else {
            return step;
        };
        let msg = &event.message;
        if msg.originator != Originator::Nwp {
            return step;
        }

        if msg.is(UnpiType::AsyncReq, UTIL, util_cmd::NPI_HW_ASSERT) {
            let detail = match &msg.payload {
                Payload::HwAssert(assert) => {
                    format!("cause {} subcause {}", assert.cause, assert.subcause)
                }
                _ => "no detail".to_string(),
            };
            self.abort(&mut step, format!("hardware assert on {from}: {detail}"));
            return step;
        }
        if msg.subsystem != RTLS {
            return step;
        }

        match (msg.unpi_type, msg.command) {
            (_, rtls_cmd::ERROR) => {
                let status = msg
                    .payload
                    .status()
                    .map_or_else(|| "unknown".to_string(), |s| s.to_string());
                self.abort(&mut step, format!("{from} reported {status}"));
            }
            (UnpiType::AsyncReq, rtls_cmd::SCAN) if role == Role::Master => {
                self.on_scan_result(&msg.payload);
            }
            (UnpiType::AsyncReq, rtls_cmd::SCAN_STOP) if role == Role::Master => {
                self.on_scan_stop(&mut step);
            }
            (UnpiType::AsyncReq, rtls_cmd::CONNECT) => {
                self.on_connect(&mut step, from, role, msg);
            }
            (UnpiType::SyncRsp, rtls_cmd::TOF_SET_PARAMS) if self.mode == Mode::Ranging => {
                if succeeded(from, msg) {
                    self.on_tof_params(&mut step, from);
                }
            }
            (UnpiType::SyncRsp, rtls_cmd::AOA_SET_PARAMS) if self.mode == Mode::AngleOfArrival => {
                if succeeded(from, msg) {
                    self.on_aoa_params(&mut step, from);
                }
            }
            (UnpiType::SyncRsp, rtls_cmd::TOF_GET_SEC_SEED) if role == Role::Master => {
                self.on_seed(&mut step, &msg.payload);
            }
            (UnpiType::SyncRsp, rtls_cmd::TOF_SET_SEC_SEED) if role == Role::Passive => {
                if succeeded(from, msg) {
                    self.on_seed_set(&mut step, from);
                }
            }
            (UnpiType::SyncRsp, rtls_cmd::TOF_CALIBRATE) if role == Role::Passive => {
                if succeeded(from, msg) {
                    self.on_calibration_configured(&mut step, from);
                }
            }
            (UnpiType::AsyncReq, rtls_cmd::TOF_CALIBRATE) if role == Role::Passive => {
                self.on_calibrated(&mut step, from);
            }
            _ => {}
        }
        step
    }

    fn role_of(&self, identifier: DeviceAddress) -> Option<Role> {
        if identifier == self.master.identifier {
            Some(Role::Master)
        } else if self.passives.iter().any(|p| p.identifier == identifier) {
            Some(Role::Passive)
        } else {
            None
        }
    }

    fn identity(&self, identifier: DeviceAddress) -> Option<&Identity> {
        std::iter::once(&self.master)
            .chain(&self.passives)
            .find(|id| id.identifier == identifier)
    }

    fn entry(&mut self, identifier: DeviceAddress) -> &mut CoordinationState {
        self.states.entry(identifier).or_default()
    }

    fn all_passives(&self, check: impl Fn(&CoordinationState) -> bool) -> bool {
        self.passives
            .iter()
            .all(|p| self.states.get(&p.identifier).is_some_and(&check))
    }

    fn abort(&mut self, step: &mut Step, reason: String) {
        error!(reason = %reason, "sequence aborted");
        self.phase = Phase::Aborted(reason.clone());
        step.aborted = Some(reason);
    }

    fn rescan(&mut self, step: &mut Step) {
        self.scanned = None;
        self.phase = Phase::Scanning;
        step.send(self.master.identifier, rtls::scan());
    }

    fn on_scan_result(&mut self, payload: &Payload) {
        let Payload::DeviceInfo(info) = payload else {
            return;
        };
        if self.config.target.is_some_and(|target| target != info.addr) {
            debug!(addr = %info.addr, "ignoring scan result");
            return;
        }
        debug!(addr = %info.addr, rssi = info.rssi, "slave found");
        self.scanned = Some((info.addr_type, info.addr));
    }

    fn on_scan_stop(&mut self, step: &mut Step) {
        match self.scanned {
            Some((addr_type, addr)) => {
                info!(addr = %addr, "connecting to slave");
                self.phase = Phase::Connecting;
                step.send(self.master.identifier, rtls::connect(addr_type, addr));
            }
            None => {
                debug!("no slave found, scanning again");
                self.rescan(step);
            }
        }
    }

    fn on_connect(&mut self, step: &mut Step, from: DeviceAddress, role: Role, msg: &Message) {
        if !msg.payload.status().is_some_and(|s| s.is_success()) {
            warn!(identifier = %from, "connection failed, scanning again");
            self.entry(from).connected = false;
            self.rescan(step);
            return;
        }
        let Some(caps) = self.identity(from).map(|id| id.capabilities) else {
            return;
        };
        let request = match self.mode {
            Mode::Ranging => {
                let tof_role = if caps.contains(Capabilities::TOF_MASTER) {
                    TofRole::Master
                } else {
                    TofRole::Passive
                };
                rtls::tof_set_params(self.config.tof.request(tof_role))
            }
            Mode::AngleOfArrival => {
                let aoa_role = if role == Role::Master && caps.contains(Capabilities::RTLS_MASTER) {
                    AoaRole::Master
                } else {
                    AoaRole::Passive
                };
                rtls::aoa_set_params(self.config.aoa.request(aoa_role))
            }
        };
        let state = self.entry(from);
        state.connected = true;
        state.role_assigned = true;
        self.phase = Phase::Configuring;
        step.send(from, request);
    }

    fn on_tof_params(&mut self, step: &mut Step, from: DeviceAddress) {
        self.entry(from).params_acked = true;
        let master = self.master.identifier;
        let everyone = self.states.values().all(|s| s.params_acked);
        if everyone && !self.entry(master).seed_requested {
            self.entry(master).seed_requested = true;
            self.phase = Phase::Seeding;
            step.send(master, rtls::tof_get_sec_seed());
        }
    }

    fn on_aoa_params(&mut self, step: &mut Step, from: DeviceAddress) {
        self.entry(from).params_acked = true;
        let everyone = self.states.values().all(|s| s.params_acked);
        if !everyone || self.phase == Phase::Measuring {
            return;
        }
        self.phase = Phase::Measuring;
        let targets: Vec<DeviceAddress> = std::iter::once(&self.master)
            .chain(&self.passives)
            .map(|id| id.identifier)
            .collect();
        for identifier in targets {
            self.entry(identifier).started = true;
            step.send(identifier, rtls::aoa_start(true));
        }
    }

    fn on_seed(&mut self, step: &mut Step, payload: &Payload) {
        let Payload::Seed(seed) = payload else {
            return;
        };
        let master = self.master.identifier;
        if seed.seed.is_zero() || self.entry(master).seed_received {
            return;
        }
        self.entry(master).seed_received = true;
        if self.passives.is_empty() {
            self.start_master(step);
            return;
        }
        let passives: Vec<DeviceAddress> = self.passives.iter().map(|p| p.identifier).collect();
        for identifier in passives {
            self.entry(identifier).seed_received = true;
            step.send(identifier, rtls::tof_set_sec_seed(seed.seed));
        }
    }

    fn on_seed_set(&mut self, step: &mut Step, from: DeviceAddress) {
        self.entry(from).seed_set = true;
        let tof = self.config.tof.clone();

        if tof.result_mode != TofResultMode::Distance {
            if self.all_passives(|s| s.seed_set) && !self.entry(self.master.identifier).started {
                let passives: Vec<DeviceAddress> =
                    self.passives.iter().map(|p| p.identifier).collect();
                for identifier in passives {
                    self.entry(identifier).started = true;
                    step.send(identifier, rtls::tof_start(true));
                }
                self.start_master(step);
            }
            return;
        }

        if !self.entry(from).calibration_configured {
            self.entry(from).calibration_configured = true;
            self.phase = Phase::Calibrating;
            step.send(
                from,
                rtls::tof_calib(true, tof.samples_per_freq, tof.calib_distance),
            );
        }
        let master = self.master.identifier;
        if self.all_passives(|s| s.calibration_configured)
            && !self.entry(master).calibration_configured
        {
            self.entry(master).calibration_configured = true;
            step.send(master, rtls::tof_calib(true, 0, tof.calib_distance));
        }
    }

    fn on_calibration_configured(&mut self, step: &mut Step, from: DeviceAddress) {
        if self.entry(from).started {
            return;
        }
        self.entry(from).started = true;
        step.send(from, rtls::tof_start(true));
        if self.all_passives(|s| s.started) {
            self.start_master(step);
        }
    }

    fn on_calibrated(&mut self, step: &mut Step, from: DeviceAddress) {
        self.entry(from).calibrated = true;
        let master = self.master.identifier;
        if self.all_passives(|s| s.calibrated) && !self.entry(master).calibrated {
            self.entry(master).calibrated = true;
            let distance = self.config.tof.calib_distance;
            step.send(master, rtls::tof_calib(false, 0, distance));
        }
    }

    fn start_master(&mut self, step: &mut Step) {
        let master = self.master.identifier;
        if self.entry(master).started {
            return;
        }
        self.entry(master).started = true;
        self.phase = Phase::Measuring;
        info!(master = %master, "ranging started");
        step.send(master, rtls::tof_start(true));
    }
}

fn succeeded(from: DeviceAddress, msg: &Message) -> bool {
    match msg.payload.status() {
        Some(status) if status.is_success() => true,
        status => {
            warn!(identifier = %from, command = msg.command, status = ?status, "request rejected");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use unpi_schema::payload::{DeviceInfo, HwAssert, SeedPayload, StatusRsp};
    use unpi_schema::{RtlsStatus, SecuritySeed};

    use super::*;

    fn id(last: u8, caps: Capabilities) -> Identity {
        Identity {
            identifier: DeviceAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, last]),
            capabilities: caps,
        }
    }

    fn tof_master() -> Identity {
        id(0x01, Capabilities::RTLS_MASTER | Capabilities::TOF_MASTER)
    }

    fn tof_passive(last: u8) -> Identity {
        id(last, Capabilities::RTLS_PASSIVE | Capabilities::TOF_PASSIVE)
    }

    fn aoa_master() -> Identity {
        id(0x01, Capabilities::RTLS_MASTER | Capabilities::AOA_TX)
    }

    fn aoa_passive(last: u8) -> Identity {
        id(last, Capabilities::RTLS_PASSIVE | Capabilities::AOA_RX)
    }

    fn event(from: &Identity, unpi_type: UnpiType, command: u8, payload: Payload) -> NodeMessage {
        let message = Message::new(Originator::Nwp, unpi_type, RTLS, command, payload);
        NodeMessage::new(Some(from.identifier), "dev", message)
    }

    fn ok(from: &Identity, command: u8) -> NodeMessage {
        event(
            from,
            UnpiType::SyncRsp,
            command,
            Payload::Status(StatusRsp {
                status: RtlsStatus::Success,
            }),
        )
    }

    fn connected(from: &Identity) -> NodeMessage {
        event(
            from,
            UnpiType::AsyncReq,
            rtls_cmd::CONNECT,
            Payload::Status(StatusRsp {
                status: RtlsStatus::Success,
            }),
        )
    }

    fn seed() -> NodeMessage {
        event(
            &tof_master(),
            UnpiType::SyncRsp,
            rtls_cmd::TOF_GET_SEC_SEED,
            Payload::Seed(SeedPayload {
                seed: SecuritySeed([7; 32]),
            }),
        )
    }

    fn commands(routed: &[Routed], command: u8) -> Vec<DeviceAddress> {
        routed
            .iter()
            .filter(|r| r.message.command == command)
            .map(|r| r.to)
            .collect()
    }

    fn ranging_after_connect(passives: Vec<Identity>) -> Sequencer {
        let mut seq =
            Sequencer::new(SequenceConfig::default(), tof_master(), passives.clone()).unwrap();
        seq.start();
        for device in std::iter::once(tof_master()).chain(passives) {
            seq.on_event(&connected(&device));
        }
        seq
    }

    #[test]
    fn detects_mode_from_capabilities() {
        assert_eq!(
            Mode::detect(&tof_master(), &[tof_passive(2)]).unwrap(),
            Mode::Ranging
        );
        assert_eq!(Mode::detect(&tof_master(), &[]).unwrap(), Mode::Ranging);
        assert_eq!(
            Mode::detect(&aoa_master(), &[aoa_passive(2)]).unwrap(),
            Mode::AngleOfArrival
        );
        assert!(matches!(
            Mode::detect(&aoa_master(), &[]),
            Err(ManagerError::NoPassives)
        ));
        assert!(matches!(
            Mode::detect(&tof_master(), &[aoa_passive(2)]),
            Err(ManagerError::MixedModes(_))
        ));
    }

    #[test]
    fn frequency_plan_must_fit_one_byte_count() {
        let mut config = SequenceConfig::default();
        config.tof.frequencies = (0..256).map(|n| 2400 + n).collect();
        let err = Sequencer::new(config.clone(), tof_master(), vec![tof_passive(2)]).unwrap_err();
        assert!(matches!(
            err,
            ManagerError::Schema(unpi_schema::SchemaError::InvalidValue { field: "frequencies", .. })
        ));

        // Angle-of-arrival never sends the plan.
        assert!(Sequencer::new(config.clone(), aoa_master(), vec![aoa_passive(2)]).is_ok());

        config.tof.frequencies.truncate(255);
        assert_eq!(config.tof.request(TofRole::Master).num_freq, 255);
        assert!(Sequencer::new(config, tof_master(), vec![tof_passive(2)]).is_ok());
    }

    #[test]
    fn scan_connects_to_target_or_rescans() {
        let master = aoa_master();
        let wanted = DeviceAddress::new([0x80, 0x6F, 0xB0, 0x1E, 0x38, 0xD4]);
        let config = SequenceConfig::default().with_target(wanted);
        let mut seq = Sequencer::new(config, master, vec![aoa_passive(2)]).unwrap();
        assert_eq!(commands(&seq.start(), rtls_cmd::SCAN), vec![master.identifier]);

        let other = DeviceInfo {
            event_type: 0,
            addr_type: 0,
            addr: DeviceAddress::new([1, 2, 3, 4, 5, 6]),
            rssi: -40,
            data_len: 0,
            data: Vec::new(),
        };
        seq.on_event(&event(
            &master,
            UnpiType::AsyncReq,
            rtls_cmd::SCAN,
            Payload::DeviceInfo(other.clone()),
        ));
        let stop = event(&master, UnpiType::AsyncReq, rtls_cmd::SCAN_STOP, Payload::default());
        let step = seq.on_event(&stop);
        assert_eq!(commands(&step.commands, rtls_cmd::SCAN), vec![master.identifier]);

        let target = DeviceInfo {
            addr: wanted,
            ..other
        };
        seq.on_event(&event(
            &master,
            UnpiType::AsyncReq,
            rtls_cmd::SCAN,
            Payload::DeviceInfo(target),
        ));
        let step = seq.on_event(&stop);
        assert_eq!(step.commands.len(), 1);
        assert_eq!(
            step.commands[0].message.payload,
            rtls::connect(0, wanted).payload
        );
        assert_eq!(seq.phase(), &Phase::Connecting);
    }

    #[test]
    fn failed_connection_rescans() {
        let master = aoa_master();
        let mut seq = Sequencer::new(SequenceConfig::default(), master, vec![aoa_passive(2)]).unwrap();
        seq.start();
        let failed = event(
            &master,
            UnpiType::AsyncReq,
            rtls_cmd::CONNECT,
            Payload::Status(StatusRsp {
                status: RtlsStatus::LinkEstabFail,
            }),
        );
        let step = seq.on_event(&failed);
        assert_eq!(commands(&step.commands, rtls_cmd::SCAN), vec![master.identifier]);
        assert_eq!(seq.phase(), &Phase::Scanning);
    }

    #[test]
    fn connect_assigns_roles() {
        let passive = tof_passive(2);
        let mut seq = Sequencer::new(SequenceConfig::default(), tof_master(), vec![passive]).unwrap();
        seq.start();

        let step = seq.on_event(&connected(&tof_master()));
        match &step.commands[0].message.payload {
            Payload::TofSetParams(req) => {
                assert_eq!(req.tof_role, TofRole::Master);
                assert_eq!(req.num_freq, 4);
                assert_eq!(req.frequencies, vec![2408, 2412, 2418, 2424]);
            }
            other => panic!("unexpected payload {other:?}"),
        }
        let step = seq.on_event(&connected(&passive));
        match &step.commands[0].message.payload {
            Payload::TofSetParams(req) => assert_eq!(req.tof_role, TofRole::Passive),
            other => panic!("unexpected payload {other:?}"),
        }
        assert!(seq.state(passive.identifier).unwrap().role_assigned);
    }

    #[test]
    fn seed_is_requested_once_after_every_ack() {
        let fleet = [tof_master(), tof_passive(2), tof_passive(3)];
        let orders = [[0, 1, 2], [2, 0, 1], [1, 2, 0], [2, 1, 0]];
        for order in orders {
            let mut seq = ranging_after_connect(fleet[1..].to_vec());
            let mut requests = Vec::new();
            for (n, &i) in order.iter().enumerate() {
                let step = seq.on_event(&ok(&fleet[i], rtls_cmd::TOF_SET_PARAMS));
                let seeds = commands(&step.commands, rtls_cmd::TOF_GET_SEC_SEED);
                if n < 2 {
                    assert!(seeds.is_empty(), "seed requested early for {order:?}");
                }
                requests.extend(seeds);
            }
            let repeat = seq.on_event(&ok(&fleet[order[0]], rtls_cmd::TOF_SET_PARAMS));
            requests.extend(commands(&repeat.commands, rtls_cmd::TOF_GET_SEC_SEED));
            assert_eq!(requests, vec![fleet[0].identifier], "order {order:?}");
            assert_eq!(seq.phase(), &Phase::Seeding);
        }
    }

    #[test]
    fn ranging_calibrates_then_measures() {
        let passives = vec![tof_passive(2), tof_passive(3)];
        let master = tof_master();
        let mut seq = ranging_after_connect(passives.clone());
        for device in std::iter::once(&master).chain(&passives) {
            seq.on_event(&ok(device, rtls_cmd::TOF_SET_PARAMS));
        }

        let step = seq.on_event(&seed());
        assert_eq!(
            commands(&step.commands, rtls_cmd::TOF_SET_SEC_SEED),
            vec![passives[0].identifier, passives[1].identifier]
        );
        assert!(seq.on_event(&seed()).commands.is_empty());

        let step = seq.on_event(&ok(&passives[0], rtls_cmd::TOF_SET_SEC_SEED));
        assert_eq!(
            commands(&step.commands, rtls_cmd::TOF_CALIBRATE),
            vec![passives[0].identifier]
        );
        let step = seq.on_event(&ok(&passives[1], rtls_cmd::TOF_SET_SEC_SEED));
        assert_eq!(
            commands(&step.commands, rtls_cmd::TOF_CALIBRATE),
            vec![passives[1].identifier, master.identifier]
        );
        assert_eq!(step.commands[1].message, rtls::tof_calib(true, 0, 1));

        let step = seq.on_event(&ok(&passives[0], rtls_cmd::TOF_CALIBRATE));
        assert_eq!(
            commands(&step.commands, rtls_cmd::TOF_ENABLE),
            vec![passives[0].identifier]
        );
        let step = seq.on_event(&ok(&passives[1], rtls_cmd::TOF_CALIBRATE));
        assert_eq!(
            commands(&step.commands, rtls_cmd::TOF_ENABLE),
            vec![passives[1].identifier, master.identifier]
        );
        assert_eq!(seq.phase(), &Phase::Measuring);

        let calibrated = |p: &Identity| {
            event(p, UnpiType::AsyncReq, rtls_cmd::TOF_CALIBRATE, Payload::default())
        };
        assert!(seq.on_event(&calibrated(&passives[0])).commands.is_empty());
        let step = seq.on_event(&calibrated(&passives[1]));
        assert_eq!(step.commands.len(), 1);
        assert_eq!(step.commands[0].to, master.identifier);
        assert_eq!(step.commands[0].message, rtls::tof_calib(false, 0, 1));
    }

    #[test]
    fn ranging_without_distance_mode_skips_calibration() {
        let passive = tof_passive(2);
        let mut config = SequenceConfig::default();
        config.tof.result_mode = TofResultMode::Statistics;
        let mut seq = Sequencer::new(config, tof_master(), vec![passive]).unwrap();
        seq.start();
        seq.on_event(&connected(&tof_master()));
        seq.on_event(&connected(&passive));
        seq.on_event(&ok(&tof_master(), rtls_cmd::TOF_SET_PARAMS));
        seq.on_event(&ok(&passive, rtls_cmd::TOF_SET_PARAMS));
        seq.on_event(&seed());

        let step = seq.on_event(&ok(&passive, rtls_cmd::TOF_SET_SEC_SEED));
        assert!(commands(&step.commands, rtls_cmd::TOF_CALIBRATE).is_empty());
        assert_eq!(
            commands(&step.commands, rtls_cmd::TOF_ENABLE),
            vec![passive.identifier, tof_master().identifier]
        );
    }

    #[test]
    fn aoa_starts_everyone_after_all_params() {
        let master = aoa_master();
        let passive = aoa_passive(2);
        let mut seq = Sequencer::new(SequenceConfig::default(), master, vec![passive]).unwrap();
        seq.start();
        let step = seq.on_event(&connected(&master));
        match &step.commands[0].message.payload {
            Payload::AoaSetParams(req) => {
                assert_eq!(req.aoa_role, AoaRole::Master);
                assert_eq!(req.aoa_result_mode, AoaResultMode::Raw);
            }
            other => panic!("unexpected payload {other:?}"),
        }
        seq.on_event(&connected(&passive));

        assert!(seq.on_event(&ok(&passive, rtls_cmd::AOA_SET_PARAMS)).commands.is_empty());
        let step = seq.on_event(&ok(&master, rtls_cmd::AOA_SET_PARAMS));
        assert_eq!(
            commands(&step.commands, rtls_cmd::AOA_ENABLE),
            vec![master.identifier, passive.identifier]
        );
        assert!(seq.on_event(&ok(&master, rtls_cmd::AOA_SET_PARAMS)).commands.is_empty());
    }

    #[test]
    fn hardware_assert_aborts() {
        let master = aoa_master();
        let mut seq = Sequencer::new(SequenceConfig::default(), master, vec![aoa_passive(2)]).unwrap();
        seq.start();
        let assert = NodeMessage::new(
            Some(master.identifier),
            "dev",
            Message::new(
                Originator::Nwp,
                UnpiType::AsyncReq,
                UTIL,
                util_cmd::NPI_HW_ASSERT,
                Payload::HwAssert(HwAssert {
                    cause: 2,
                    subcause: 9,
                }),
            ),
        );
        let step = seq.on_event(&assert);
        assert!(step.aborted.unwrap().contains("cause 2 subcause 9"));
        assert!(seq.phase().is_aborted());
        assert!(seq.on_event(&connected(&master)).commands.is_empty());
    }

    #[test]
    fn device_error_aborts() {
        let mut seq = ranging_after_connect(vec![tof_passive(2)]);
        let failure = event(
            &tof_passive(2),
            UnpiType::SyncRsp,
            rtls_cmd::ERROR,
            Payload::Status(StatusRsp {
                status: RtlsStatus::OutOfMemory,
            }),
        );
        let step = seq.on_event(&failure);
        assert!(step.aborted.unwrap().contains("RTLS_OUT_OF_MEMORY"));
        assert!(step.commands.is_empty());
    }

    #[test]
    fn events_from_strangers_are_ignored() {
        let mut seq = ranging_after_connect(vec![tof_passive(2)]);
        let stranger = tof_passive(9);
        assert_eq!(seq.on_event(&connected(&stranger)), Step::default());
        assert!(seq.state(stranger.identifier).is_none());
    }
}
