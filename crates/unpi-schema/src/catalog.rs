//! Built-in subsystem tables.
//!
//! Each [`SubsystemDef`] lists the subsystem's command names and one
//! [`SchemaDef`] per message shape that can cross the line, keyed by who
//! sends it and with which request type.

use unpi_frame::UnpiType::{self, AsyncReq, SyncRsp};
use unpi_frame::{RTLS, UTIL};

use self::rtls_cmd::*;
use crate::message::{MessageKey, Originator};
use crate::payload::{PayloadKind, PayloadKind as K};

/// RTLS command ids.
pub mod rtls_cmd {
    pub const IDENTIFY: u8 = 0x00;
    pub const CONN_PARAMS: u8 = 0x02;
    pub const CONNECT: u8 = 0x03;
    pub const SCAN: u8 = 0x04;
    pub const SCAN_STOP: u8 = 0x05;
    pub const TOF_RESULT_DIST: u8 = 0x06;
    pub const TOF_RESULT_STAT: u8 = 0x07;
    pub const TOF_RESULT_RAW: u8 = 0x08;
    pub const TOF_SET_SEC_SEED: u8 = 0x09;
    pub const TOF_GET_SEC_SEED: u8 = 0x10;
    pub const TOF_SET_PARAMS: u8 = 0x11;
    pub const TOF_ENABLE: u8 = 0x12;
    pub const AOA_SET_PARAMS: u8 = 0x13;
    pub const AOA_ENABLE: u8 = 0x14;
    pub const RESET_DEVICE: u8 = 0x20;
    pub const ERROR: u8 = 0x21;
    pub const TERMINATE_LINK: u8 = 0x22;
    pub const AOA_RESULT_ANGLE: u8 = 0x23;
    pub const AOA_RESULT_RAW: u8 = 0x24;
    pub const AOA_RESULT_PAIR_ANGLES: u8 = 0x25;
    pub const TOF_CALIBRATE: u8 = 0x26;
}

/// UTIL command ids.
pub mod util_cmd {
    pub const NPI_HW_ASSERT: u8 = 0x00;
}

/// One message shape within a subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaDef {
    /// Descriptive name, e.g. `IdentifyRsp`.
    pub name: &'static str,
    pub originator: Originator,
    pub unpi_type: UnpiType,
    pub command: u8,
    pub kind: PayloadKind,
}

impl SchemaDef {
    /// Registry key of this schema within `subsystem`.
    pub fn key(&self, subsystem: u8) -> MessageKey {
        MessageKey {
            originator: self.originator,
            unpi_type: self.unpi_type,
            subsystem,
            command: self.command,
        }
    }

    /// Field names in wire order.
    pub fn fields(&self) -> &'static [&'static str] {
        self.kind.fields()
    }
}

/// A subsystem's command names and message shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsystemDef {
    pub id: u8,
    pub name: &'static str,
    pub commands: &'static [(&'static str, u8)],
    pub schemas: &'static [SchemaDef],
}

impl SubsystemDef {
    /// Name of a command id.
    pub fn command_name(&self, command: u8) -> Option<&'static str> {
        self.commands
            .iter()
            .find(|(_, id)| *id == command)
            .map(|(name, _)| *name)
    }

    /// Id of a command name.
    pub fn command_id(&self, name: &str) -> Option<u8> {
        self.commands
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, id)| *id)
    }

    /// Schemas the host can send.
    pub fn requests(&self) -> impl Iterator<Item = &SchemaDef> {
        self.schemas
            .iter()
            .filter(|schema| schema.originator == Originator::Ap)
    }
}

const fn from_device(
    name: &'static str,
    unpi_type: UnpiType,
    command: u8,
    kind: PayloadKind,
) -> SchemaDef {
    SchemaDef {
        name,
        originator: Originator::Nwp,
        unpi_type,
        command,
        kind,
    }
}

const fn from_host(name: &'static str, command: u8, kind: PayloadKind) -> SchemaDef {
    SchemaDef {
        name,
        originator: Originator::Ap,
        unpi_type: UnpiType::SyncReq,
        command,
        kind,
    }
}

const RTLS_COMMANDS: &[(&str, u8)] = &[
    ("RTLS_CMD_IDENTIFY", rtls_cmd::IDENTIFY),
    ("RTLS_CMD_CONN_PARAMS", rtls_cmd::CONN_PARAMS),
    ("RTLS_CMD_CONNECT", rtls_cmd::CONNECT),
    ("RTLS_CMD_SCAN", rtls_cmd::SCAN),
    ("RTLS_CMD_SCAN_STOP", rtls_cmd::SCAN_STOP),
    ("RTLS_CMD_TOF_RESULT_DIST", rtls_cmd::TOF_RESULT_DIST),
    ("RTLS_CMD_TOF_RESULT_STAT", rtls_cmd::TOF_RESULT_STAT),
    ("RTLS_CMD_TOF_RESULT_RAW", rtls_cmd::TOF_RESULT_RAW),
    ("RTLS_CMD_TOF_SET_SEC_SEED", rtls_cmd::TOF_SET_SEC_SEED),
    ("RTLS_CMD_TOF_GET_SEC_SEED", rtls_cmd::TOF_GET_SEC_SEED),
    ("RTLS_CMD_TOF_SET_PARAMS", rtls_cmd::TOF_SET_PARAMS),
    ("RTLS_CMD_TOF_ENABLE", rtls_cmd::TOF_ENABLE),
    ("RTLS_CMD_AOA_SET_PARAMS", rtls_cmd::AOA_SET_PARAMS),
    ("RTLS_CMD_AOA_ENABLE", rtls_cmd::AOA_ENABLE),
    ("RTLS_CMD_RESET_DEVICE", rtls_cmd::RESET_DEVICE),
    ("RTLS_CMD_ERROR", rtls_cmd::ERROR),
    ("RTLS_CMD_TERMINATE_LINK", rtls_cmd::TERMINATE_LINK),
    ("RTLS_CMD_AOA_RESULT_ANGLE", rtls_cmd::AOA_RESULT_ANGLE),
    ("RTLS_CMD_AOA_RESULT_RAW", rtls_cmd::AOA_RESULT_RAW),
    ("RTLS_CMD_AOA_RESULT_PAIR_ANGLES", rtls_cmd::AOA_RESULT_PAIR_ANGLES),
    ("RTLS_CMD_TOF_CALIBRATE", rtls_cmd::TOF_CALIBRATE),
];

const RTLS_SCHEMAS: &[SchemaDef] = &[
    // Device to host
    from_device("IdentifyRsp", SyncRsp, IDENTIFY, K::Identify),
    from_device("ConnRsp", AsyncReq, CONNECT, K::Status),
    from_device("ErrorRsp", SyncRsp, ERROR, K::Status),
    from_device("DeviceInfoRsp", AsyncReq, SCAN, K::DeviceInfo),
    from_device("ScanRsp", SyncRsp, SCAN, K::Status),
    from_device("ResetDeviceRsp", SyncRsp, RESET_DEVICE, K::Status),
    from_device("ScanStopRsp", AsyncReq, SCAN_STOP, K::Status),
    from_device("ConnectRsp", SyncRsp, CONNECT, K::Status),
    from_device("SetConnParamsRsp", SyncRsp, CONN_PARAMS, K::Status),
    from_device("ConnParamsRsp", AsyncReq, CONN_PARAMS, K::ConnParams),
    from_device("AoaStartRsp", SyncRsp, AOA_ENABLE, K::Status),
    from_device("AoaSetParamsRsp", SyncRsp, AOA_SET_PARAMS, K::Status),
    from_device("AoaResultAngle", AsyncReq, AOA_RESULT_ANGLE, K::AoaAngle),
    from_device("AoaResultPairAngles", AsyncReq, AOA_RESULT_PAIR_ANGLES, K::AoaPairAngles),
    from_device("AoaResultRaw", AsyncReq, AOA_RESULT_RAW, K::AoaRaw),
    from_device("TofStartRsp", SyncRsp, TOF_ENABLE, K::Status),
    from_device("TofResultStatistics", AsyncReq, TOF_RESULT_STAT, K::TofStatistics),
    from_device("TofResultDistance", AsyncReq, TOF_RESULT_DIST, K::TofDistance),
    from_device("TofResultRaw", AsyncReq, TOF_RESULT_RAW, K::TofRaw),
    from_device("TofSetParamsRsp", SyncRsp, TOF_SET_PARAMS, K::Status),
    from_device("TofSetSecSeedRsp", SyncRsp, TOF_SET_SEC_SEED, K::Status),
    from_device("TofGetSecSeedRsp", SyncRsp, TOF_GET_SEC_SEED, K::Seed),
    from_device("TofCalibEnabledRsp", SyncRsp, TOF_CALIBRATE, K::Status),
    from_device("TofCalibCompleteRsp", AsyncReq, TOF_CALIBRATE, K::TofCalibration),
    // Host to device
    from_host("IdentifyReq", IDENTIFY, K::Empty),
    from_host("ScanReq", SCAN, K::Empty),
    from_host("ResetDeviceReq", RESET_DEVICE, K::Empty),
    from_host("ConnectReq", CONNECT, K::Connect),
    from_host("TerminateLinkReq", TERMINATE_LINK, K::Empty),
    from_host("AoaStartReq", AOA_ENABLE, K::Enable),
    from_host("AoaSetParamsReq", AOA_SET_PARAMS, K::AoaSetParams),
    from_host("TofCalibReq", TOF_CALIBRATE, K::TofCalib),
    from_host("TofStartReq", TOF_ENABLE, K::Enable),
    from_host("TofSetParamsReq", TOF_SET_PARAMS, K::TofSetParams),
    from_host("SetConnInfoReq", CONN_PARAMS, K::ConnParams),
    from_host("TofSetSecSeedReq", TOF_SET_SEC_SEED, K::Seed),
    from_host("TofGetSecSeedReq", TOF_GET_SEC_SEED, K::Empty),
];

const UTIL_COMMANDS: &[(&str, u8)] = &[("UTIL_NPI_HW_ASSERT", util_cmd::NPI_HW_ASSERT)];

const UTIL_SCHEMAS: &[SchemaDef] = &[from_device(
    "HwAssertRsp",
    UnpiType::AsyncReq,
    util_cmd::NPI_HW_ASSERT,
    PayloadKind::HwAssert,
)];

/// The real-time localization subsystem.
pub fn rtls() -> SubsystemDef {
    SubsystemDef {
        id: RTLS,
        name: "RTLS",
        commands: RTLS_COMMANDS,
        schemas: RTLS_SCHEMAS,
    }
}

/// The utility subsystem.
pub fn util() -> SubsystemDef {
    SubsystemDef {
        id: UTIL,
        name: "UTIL",
        commands: UTIL_COMMANDS,
        schemas: UTIL_SCHEMAS,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn command_names_resolve_both_ways() {
        let def = rtls();
        assert_eq!(def.command_name(0x26), Some("RTLS_CMD_TOF_CALIBRATE"));
        assert_eq!(def.command_id("RTLS_CMD_AOA_ENABLE"), Some(0x14));
        assert_eq!(def.command_name(0x01), None);
    }

    #[test]
    fn schema_keys_are_unique() {
        for def in [rtls(), util()] {
            let keys: HashSet<_> = def.schemas.iter().map(|s| s.key(def.id)).collect();
            assert_eq!(keys.len(), def.schemas.len(), "{}", def.name);
        }
    }

    #[test]
    fn every_schema_command_is_named() {
        for def in [rtls(), util()] {
            for schema in def.schemas {
                assert!(
                    def.command_name(schema.command).is_some(),
                    "{} has unnamed command",
                    schema.name
                );
            }
        }
    }

    #[test]
    fn host_requests_are_synchronous() {
        let def = rtls();
        assert_eq!(def.requests().count(), 13);
        assert!(def.requests().all(|s| s.unpi_type == UnpiType::SyncReq));
    }
}
