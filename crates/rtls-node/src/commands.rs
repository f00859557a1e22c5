//! Typed RTLS command surface over anything that accepts messages.

use unpi_schema::commands::rtls;
use unpi_schema::payload::{AoaSetParamsReq, ConnParams, TofSetParamsReq};
use unpi_schema::{DeviceAddress, Message, SecuritySeed};

/// Destination for outbound requests.
pub trait CommandSink {
    fn submit(&self, message: Message);
}

/// RTLS commands queued onto a [`CommandSink`].
pub struct RtlsCommands<'a, S: ?Sized> {
    sink: &'a S,
}

impl<'a, S: CommandSink + ?Sized> RtlsCommands<'a, S> {
    pub fn new(sink: &'a S) -> Self {
        Self { sink }
    }

    pub fn identify(&self) {
        self.sink.submit(rtls::identify());
    }

    pub fn scan(&self) {
        self.sink.submit(rtls::scan());
    }

    pub fn connect(&self, addr_type: u8, peer_addr: DeviceAddress) {
        self.sink.submit(rtls::connect(addr_type, peer_addr));
    }

    pub fn terminate_link(&self) {
        self.sink.submit(rtls::terminate_link());
    }

    pub fn reset_device(&self) {
        self.sink.submit(rtls::reset_device());
    }

    pub fn set_ble_conn_info(&self, params: ConnParams) {
        self.sink.submit(rtls::set_ble_conn_info(params));
    }

    pub fn tof_set_params(&self, params: TofSetParamsReq) {
        self.sink.submit(rtls::tof_set_params(params));
    }

    pub fn tof_get_sec_seed(&self) {
        self.sink.submit(rtls::tof_get_sec_seed());
    }

    pub fn tof_set_sec_seed(&self, seed: SecuritySeed) {
        self.sink.submit(rtls::tof_set_sec_seed(seed));
    }

    pub fn tof_calib(&self, enable: bool, samples_per_freq: u16, calib_distance: u8) {
        self.sink
            .submit(rtls::tof_calib(enable, samples_per_freq, calib_distance));
    }

    pub fn tof_start(&self, enable: bool) {
        self.sink.submit(rtls::tof_start(enable));
    }

    pub fn aoa_set_params(&self, params: AoaSetParamsReq) {
        self.sink.submit(rtls::aoa_set_params(params));
    }

    pub fn aoa_start(&self, enable: bool) {
        self.sink.submit(rtls::aoa_start(enable));
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use unpi_schema::rtls_cmd;

    use super::*;

    #[derive(Default)]
    struct Recorder(RefCell<Vec<Message>>);

    impl CommandSink for Recorder {
        fn submit(&self, message: Message) {
            self.0.borrow_mut().push(message);
        }
    }

    #[test]
    fn commands_reach_the_sink_in_order() {
        let recorder = Recorder::default();
        let commands = RtlsCommands::new(&recorder);
        commands.scan();
        commands.tof_calib(true, 1000, 1);
        commands.aoa_start(true);

        let sent: Vec<u8> = recorder.0.borrow().iter().map(|m| m.command).collect();
        assert_eq!(
            sent,
            vec![rtls_cmd::SCAN, rtls_cmd::TOF_CALIBRATE, rtls_cmd::AOA_ENABLE]
        );
    }
}
