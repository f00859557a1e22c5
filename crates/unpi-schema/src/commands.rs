//! Typed constructors for host requests.

/// RTLS subsystem requests.
pub mod rtls {
    use unpi_frame::RTLS;

    use crate::catalog::rtls_cmd;
    use crate::message::Message;
    use crate::payload::{
        AoaSetParamsReq, ConnParams, ConnectReq, EnableReq, Payload, SeedPayload, TofCalibReq,
        TofSetParamsReq,
    };
    use crate::types::{DeviceAddress, SecuritySeed};

    fn request(command: u8, payload: Payload) -> Message {
        Message::request(RTLS, command, payload)
    }

    /// Ask the device for its address and capabilities.
    pub fn identify() -> Message {
        request(rtls_cmd::IDENTIFY, Payload::default())
    }

    /// Start scanning for peers.
    pub fn scan() -> Message {
        request(rtls_cmd::SCAN, Payload::default())
    }

    /// Connect to a scanned peer.
    pub fn connect(addr_type: u8, peer_addr: DeviceAddress) -> Message {
        request(
            rtls_cmd::CONNECT,
            Payload::Connect(ConnectReq {
                addr_type,
                peer_addr,
            }),
        )
    }

    /// Drop the current BLE connection.
    pub fn terminate_link() -> Message {
        request(rtls_cmd::TERMINATE_LINK, Payload::default())
    }

    pub fn reset_device() -> Message {
        request(rtls_cmd::RESET_DEVICE, Payload::default())
    }

    /// Hand a passive device the parameters of the master's connection.
    pub fn set_ble_conn_info(params: ConnParams) -> Message {
        request(rtls_cmd::CONN_PARAMS, Payload::ConnParams(params))
    }

    pub fn tof_set_params(params: TofSetParamsReq) -> Message {
        request(rtls_cmd::TOF_SET_PARAMS, Payload::TofSetParams(params))
    }

    pub fn tof_get_sec_seed() -> Message {
        request(rtls_cmd::TOF_GET_SEC_SEED, Payload::default())
    }

    pub fn tof_set_sec_seed(seed: SecuritySeed) -> Message {
        request(
            rtls_cmd::TOF_SET_SEC_SEED,
            Payload::Seed(SeedPayload { seed }),
        )
    }

    /// Enable or stop ranging calibration.
    pub fn tof_calib(enable: bool, samples_per_freq: u16, calib_distance: u8) -> Message {
        request(
            rtls_cmd::TOF_CALIBRATE,
            Payload::TofCalib(TofCalibReq {
                enable,
                samples_per_freq,
                calib_distance,
            }),
        )
    }

    pub fn tof_start(enable: bool) -> Message {
        request(rtls_cmd::TOF_ENABLE, Payload::Enable(EnableReq { enable }))
    }

    pub fn aoa_set_params(params: AoaSetParamsReq) -> Message {
        request(rtls_cmd::AOA_SET_PARAMS, Payload::AoaSetParams(params))
    }

    pub fn aoa_start(enable: bool) -> Message {
        request(rtls_cmd::AOA_ENABLE, Payload::Enable(EnableReq { enable }))
    }
}

#[cfg(test)]
mod tests {
    use unpi_frame::{encode_frame, UnpiType};

    use super::rtls;
    use crate::registry::MessageRegistry;

    #[test]
    fn identify_matches_known_wire_bytes() {
        let frame = rtls::identify().to_frame().unwrap();
        let mut buf = bytes::BytesMut::new();
        encode_frame(&frame, &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0xFE, 0x00, 0x00, 0x39, 0x00, 0x39]);
    }

    #[test]
    fn typed_builders_agree_with_the_catalog() {
        let registry = MessageRegistry::standard().unwrap();
        for message in [
            rtls::identify(),
            rtls::scan(),
            rtls::terminate_link(),
            rtls::reset_device(),
            rtls::tof_get_sec_seed(),
            rtls::tof_calib(true, 1000, 1),
            rtls::tof_start(true),
            rtls::aoa_start(false),
        ] {
            assert_eq!(message.unpi_type, UnpiType::SyncReq);
            let schema = registry
                .schema(&message.key())
                .unwrap_or_else(|| panic!("no schema for {}", message.key()));
            assert_eq!(schema.kind, message.payload.kind(), "{}", schema.name);
        }
    }
}
