//! Typed payloads for every RTLS and UTIL message.
//!
//! Field names in the textual representation follow the device firmware's
//! naming (`accessAddress`, `samplesLength`, ...), so JSON produced here can
//! be fed straight back in as command arguments.

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SchemaError};
use crate::types::{
    AoaResultMode, AoaRole, Capabilities, DeviceAddress, RtlsStatus, SecuritySeed, TofResultMode,
    TofRole, TofRunMode,
};
use crate::wire::{flag, hex_bytes, put_address, put_all, GreedyItem, WirePayload, WireReader};

/// A payload with no fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmptyPayload {}

impl WirePayload for EmptyPayload {
    fn encode(&self, _dst: &mut BytesMut) {}

    fn decode(_src: &mut WireReader<'_>) -> Result<Self> {
        Ok(EmptyPayload {})
    }
}

/// A bare status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusRsp {
    pub status: RtlsStatus,
}

impl WirePayload for StatusRsp {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(self.status.as_u8());
    }

    fn decode(src: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            status: RtlsStatus::try_from(src.u8("status")?)?,
        })
    }
}

/// Reply to an identify request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentifyRsp {
    pub capabilities: Capabilities,
    pub identifier: DeviceAddress,
}

impl WirePayload for IdentifyRsp {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u16_le(self.capabilities.bits());
        put_address(dst, self.identifier);
    }

    fn decode(src: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            capabilities: Capabilities::from_bits(src.u16("capabilities")?),
            identifier: src.address("identifier")?,
        })
    }
}

/// A device seen while scanning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct DeviceInfo {
    pub event_type: u8,
    pub addr_type: u8,
    pub addr: DeviceAddress,
    pub rssi: i8,
    /// Mirrors `data.len()`; the encoder always writes the actual length.
    #[serde(default)]
    pub data_len: u8,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

impl WirePayload for DeviceInfo {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(self.event_type);
        dst.put_u8(self.addr_type);
        put_address(dst, self.addr);
        dst.put_i8(self.rssi);
        let len = self.data.len().min(u8::MAX as usize);
        dst.put_u8(len as u8);
        dst.put_slice(&self.data[..len]);
    }

    fn decode(src: &mut WireReader<'_>) -> Result<Self> {
        let event_type = src.u8("eventType")?;
        let addr_type = src.u8("addrType")?;
        let addr = src.address("addr")?;
        let rssi = src.i8("rssi")?;
        let data_len = src.u8("dataLen")?;
        let data = src.take("data", data_len as usize)?.to_vec();
        Ok(Self {
            event_type,
            addr_type,
            addr,
            rssi,
            data_len,
            data,
        })
    }
}

/// Parameters of an established BLE connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ConnParams {
    pub access_address: u32,
    pub conn_interval: u16,
    pub hop_value: u8,
    #[serde(rename = "mSCA")]
    pub m_sca: u16,
    pub curr_chan: u8,
    pub chan_map: [u8; 5],
    pub crc_init: u32,
}

impl WirePayload for ConnParams {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.access_address);
        dst.put_u16_le(self.conn_interval);
        dst.put_u8(self.hop_value);
        dst.put_u16_le(self.m_sca);
        dst.put_u8(self.curr_chan);
        dst.put_slice(&self.chan_map);
        dst.put_u32_le(self.crc_init);
    }

    fn decode(src: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            access_address: src.u32("accessAddress")?,
            conn_interval: src.u16("connInterval")?,
            hop_value: src.u8("hopValue")?,
            m_sca: src.u16("mSCA")?,
            curr_chan: src.u8("currChan")?,
            chan_map: src.array("chanMap")?,
            crc_init: src.u32("crcInit")?,
        })
    }
}

/// Connect to a scanned peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ConnectReq {
    pub addr_type: u8,
    pub peer_addr: DeviceAddress,
}

impl WirePayload for ConnectReq {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(self.addr_type);
        put_address(dst, self.peer_addr);
    }

    fn decode(src: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            addr_type: src.u8("addrType")?,
            peer_addr: src.address("peerAddr")?,
        })
    }
}

/// Start or stop ranging or angle sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnableReq {
    #[serde(deserialize_with = "flag")]
    pub enable: bool,
}

impl WirePayload for EnableReq {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(self.enable as u8);
    }

    fn decode(src: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            enable: src.u8("enable")? != 0,
        })
    }
}

/// Angle-of-arrival configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct AoaSetParamsReq {
    pub aoa_role: AoaRole,
    pub aoa_result_mode: AoaResultMode,
    pub cte_scan_ovs: u8,
    pub cte_offset: u8,
    pub cte_time: u16,
}

impl WirePayload for AoaSetParamsReq {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(self.aoa_role.as_u8());
        dst.put_u8(self.aoa_result_mode.as_u8());
        dst.put_u8(self.cte_scan_ovs);
        dst.put_u8(self.cte_offset);
        dst.put_u16_le(self.cte_time);
    }

    fn decode(src: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            aoa_role: AoaRole::try_from(src.u8("aoaRole")?)?,
            aoa_result_mode: AoaResultMode::try_from(src.u8("aoaResultMode")?)?,
            cte_scan_ovs: src.u8("cteScanOvs")?,
            cte_offset: src.u8("cteOffset")?,
            cte_time: src.u16("cteTime")?,
        })
    }
}

/// A single computed angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AoaResultAngle {
    pub angle: i16,
    pub rssi: i8,
    pub antenna: u8,
    pub channel: u8,
}

impl WirePayload for AoaResultAngle {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_i16_le(self.angle);
        dst.put_i8(self.rssi);
        dst.put_u8(self.antenna);
        dst.put_u8(self.channel);
    }

    fn decode(src: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            angle: src.i16("angle")?,
            rssi: src.i8("rssi")?,
            antenna: src.u8("antenna")?,
            channel: src.u8("channel")?,
        })
    }
}

/// Angles computed for each antenna pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct AoaResultPairAngles {
    pub rssi: i8,
    pub antenna: u8,
    pub channel: u8,
    pub pair_angle: [i16; 3],
}

impl WirePayload for AoaResultPairAngles {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_i8(self.rssi);
        dst.put_u8(self.antenna);
        dst.put_u8(self.channel);
        for angle in self.pair_angle {
            dst.put_i16_le(angle);
        }
    }

    fn decode(src: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            rssi: src.i8("rssi")?,
            antenna: src.u8("antenna")?,
            channel: src.u8("channel")?,
            pair_angle: [
                src.i16("pairAngle")?,
                src.i16("pairAngle")?,
                src.i16("pairAngle")?,
            ],
        })
    }
}

/// One in-phase/quadrature sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IqSample {
    pub q: i16,
    pub i: i16,
}

impl WirePayload for IqSample {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_i16_le(self.q);
        dst.put_i16_le(self.i);
    }

    fn decode(src: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            q: src.i16("q")?,
            i: src.i16("i")?,
        })
    }
}

impl GreedyItem for IqSample {
    const SIZE: usize = 4;
}

/// A chunk of raw IQ samples from one sampling burst.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct AoaResultRaw {
    pub rssi: i8,
    pub antenna: u8,
    pub channel: u8,
    /// Index of the first sample in this chunk within the burst.
    pub offset: u16,
    /// Total number of samples in the burst.
    pub samples_length: u16,
    pub samples: Vec<IqSample>,
}

impl WirePayload for AoaResultRaw {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_i8(self.rssi);
        dst.put_u8(self.antenna);
        dst.put_u8(self.channel);
        dst.put_u16_le(self.offset);
        dst.put_u16_le(self.samples_length);
        put_all(dst, &self.samples);
    }

    fn decode(src: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            rssi: src.i8("rssi")?,
            antenna: src.u8("antenna")?,
            channel: src.u8("channel")?,
            offset: src.u16("offset")?,
            samples_length: src.u16("samplesLength")?,
            samples: src.greedy()?,
        })
    }
}

/// Ranging statistics for one frequency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct TofStatEntry {
    pub freq: u16,
    pub tick: f64,
    pub tick_variance: f64,
    pub rssi: i8,
    pub num_ok: u32,
}

impl WirePayload for TofStatEntry {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u16_le(self.freq);
        dst.put_f64_le(self.tick);
        dst.put_f64_le(self.tick_variance);
        dst.put_i8(self.rssi);
        dst.put_u32_le(self.num_ok);
    }

    fn decode(src: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            freq: src.u16("freq")?,
            tick: src.f64("tick")?,
            tick_variance: src.f64("tickVariance")?,
            rssi: src.i8("rssi")?,
            num_ok: src.u32("numOk")?,
        })
    }
}

impl GreedyItem for TofStatEntry {
    const SIZE: usize = 23;
}

/// Per-frequency ranging statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TofResultStatistics {
    pub stats: Vec<TofStatEntry>,
}

impl WirePayload for TofResultStatistics {
    fn encode(&self, dst: &mut BytesMut) {
        put_all(dst, &self.stats);
    }

    fn decode(src: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            stats: src.greedy()?,
        })
    }
}

/// Calibration values reported once calibration completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct TofCalibComplete {
    pub calib_vals: Vec<TofStatEntry>,
}

impl WirePayload for TofCalibComplete {
    fn encode(&self, dst: &mut BytesMut) {
        put_all(dst, &self.calib_vals);
    }

    fn decode(src: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            calib_vals: src.greedy()?,
        })
    }
}

/// A distance estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TofResultDistance {
    pub distance: f64,
    pub rssi: i8,
}

impl WirePayload for TofResultDistance {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_f64_le(self.distance);
        dst.put_i8(self.rssi);
    }

    fn decode(src: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            distance: src.f64("distance")?,
            rssi: src.i8("rssi")?,
        })
    }
}

/// A raw time-of-flight tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct TofResultRaw {
    pub tick: u32,
    pub freq_idx: u8,
    pub rssi: i8,
}

impl WirePayload for TofResultRaw {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.tick);
        dst.put_u8(self.freq_idx);
        dst.put_i8(self.rssi);
    }

    fn decode(src: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            tick: src.u32("tick")?,
            freq_idx: src.u8("freqIdx")?,
            rssi: src.i8("rssi")?,
        })
    }
}

/// Time-of-flight configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct TofSetParamsReq {
    pub tof_role: TofRole,
    pub num_samples: u16,
    /// Mirrors `frequencies.len()`; the encoder always writes the actual count.
    #[serde(default)]
    pub num_freq: u8,
    pub auto_tof_rssi_thresh: i8,
    pub result_mode: TofResultMode,
    pub run_mode: TofRunMode,
    pub frequencies: Vec<u16>,
}

impl TofSetParamsReq {
    /// Number of frequencies as sent on the wire.
    ///
    /// The count is a single byte, so longer plans cannot be encoded.
    pub fn frequency_count(&self) -> Result<u8> {
        u8::try_from(self.frequencies.len()).map_err(|_| SchemaError::InvalidValue {
            field: "frequencies",
            value: format!("{} entries, at most {}", self.frequencies.len(), u8::MAX),
        })
    }
}

impl WirePayload for TofSetParamsReq {
    /// Callers go through [`Payload::check`] first; an oversized plan is
    /// never truncated silently.
    fn encode(&self, dst: &mut BytesMut) {
        let count = self.frequency_count().unwrap_or(u8::MAX);
        dst.put_u8(self.tof_role.as_u8());
        dst.put_u16_le(self.num_samples);
        dst.put_u8(count);
        dst.put_i8(self.auto_tof_rssi_thresh);
        dst.put_u8(self.result_mode.as_u8());
        dst.put_u8(self.run_mode.as_u8());
        for freq in &self.frequencies[..usize::from(count)] {
            dst.put_u16_le(*freq);
        }
    }

    fn decode(src: &mut WireReader<'_>) -> Result<Self> {
        let tof_role = TofRole::try_from(src.u8("tofRole")?)?;
        let num_samples = src.u16("numSamples")?;
        let num_freq = src.u8("numFreq")?;
        let auto_tof_rssi_thresh = src.i8("autoTofRssiThresh")?;
        let result_mode = TofResultMode::try_from(src.u8("resultMode")?)?;
        let run_mode = TofRunMode::try_from(src.u8("runMode")?)?;
        let frequencies = (0..num_freq)
            .map(|_| src.u16("frequencies"))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            tof_role,
            num_samples,
            num_freq,
            auto_tof_rssi_thresh,
            result_mode,
            run_mode,
            frequencies,
        })
    }
}

/// The ranging security seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedPayload {
    pub seed: SecuritySeed,
}

impl WirePayload for SeedPayload {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_slice(&self.seed.0);
    }

    fn decode(src: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            seed: SecuritySeed(src.array("seed")?),
        })
    }
}

/// Start or stop ranging calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct TofCalibReq {
    #[serde(deserialize_with = "flag")]
    pub enable: bool,
    pub samples_per_freq: u16,
    pub calib_distance: u8,
}

impl WirePayload for TofCalibReq {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(self.enable as u8);
        dst.put_u16_le(self.samples_per_freq);
        dst.put_u8(self.calib_distance);
    }

    fn decode(src: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            enable: src.u8("enable")? != 0,
            samples_per_freq: src.u16("samplesPerFreq")?,
            calib_distance: src.u8("calibDistance")?,
        })
    }
}

/// A device-side hardware assert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HwAssert {
    pub cause: u8,
    pub subcause: u8,
}

impl WirePayload for HwAssert {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(self.cause);
        dst.put_u8(self.subcause);
    }

    fn decode(src: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            cause: src.u8("cause")?,
            subcause: src.u8("subcause")?,
        })
    }
}

/// Payload bytes of a message no schema describes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawPayload {
    #[serde(with = "hex_bytes")]
    pub raw_payload: Vec<u8>,
}

impl WirePayload for RawPayload {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_slice(&self.raw_payload);
    }

    fn decode(src: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            raw_payload: src.rest().to_vec(),
        })
    }
}

/// A decoded payload.
///
/// Serializes as the bare field object of the inner struct.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Empty(EmptyPayload),
    Status(StatusRsp),
    Identify(IdentifyRsp),
    DeviceInfo(DeviceInfo),
    ConnParams(ConnParams),
    Connect(ConnectReq),
    Enable(EnableReq),
    AoaSetParams(AoaSetParamsReq),
    AoaAngle(AoaResultAngle),
    AoaPairAngles(AoaResultPairAngles),
    AoaRaw(AoaResultRaw),
    TofStatistics(TofResultStatistics),
    TofCalibration(TofCalibComplete),
    TofDistance(TofResultDistance),
    TofRaw(TofResultRaw),
    TofSetParams(TofSetParamsReq),
    Seed(SeedPayload),
    TofCalib(TofCalibReq),
    HwAssert(HwAssert),
    Raw(RawPayload),
}

/// The shape of a payload, without its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Empty,
    Status,
    Identify,
    DeviceInfo,
    ConnParams,
    Connect,
    Enable,
    AoaSetParams,
    AoaAngle,
    AoaPairAngles,
    AoaRaw,
    TofStatistics,
    TofCalibration,
    TofDistance,
    TofRaw,
    TofSetParams,
    Seed,
    TofCalib,
    HwAssert,
    Raw,
}

fn decode_as<T: WirePayload>(src: &mut WireReader<'_>, wrap: fn(T) -> Payload) -> Result<Payload> {
    T::decode(src).map(wrap)
}

fn from_value<T: serde::de::DeserializeOwned>(value: Value, wrap: fn(T) -> Payload) -> Result<Payload> {
    Ok(wrap(serde_json::from_value(value)?))
}

impl PayloadKind {
    /// Decode payload bytes of this shape.
    pub fn decode(self, src: &mut WireReader<'_>) -> Result<Payload> {
        match self {
            PayloadKind::Empty => decode_as(src, Payload::Empty),
            PayloadKind::Status => decode_as(src, Payload::Status),
            PayloadKind::Identify => decode_as(src, Payload::Identify),
            PayloadKind::DeviceInfo => decode_as(src, Payload::DeviceInfo),
            PayloadKind::ConnParams => decode_as(src, Payload::ConnParams),
            PayloadKind::Connect => decode_as(src, Payload::Connect),
            PayloadKind::Enable => decode_as(src, Payload::Enable),
            PayloadKind::AoaSetParams => decode_as(src, Payload::AoaSetParams),
            PayloadKind::AoaAngle => decode_as(src, Payload::AoaAngle),
            PayloadKind::AoaPairAngles => decode_as(src, Payload::AoaPairAngles),
            PayloadKind::AoaRaw => decode_as(src, Payload::AoaRaw),
            PayloadKind::TofStatistics => decode_as(src, Payload::TofStatistics),
            PayloadKind::TofCalibration => decode_as(src, Payload::TofCalibration),
            PayloadKind::TofDistance => decode_as(src, Payload::TofDistance),
            PayloadKind::TofRaw => decode_as(src, Payload::TofRaw),
            PayloadKind::TofSetParams => decode_as(src, Payload::TofSetParams),
            PayloadKind::Seed => decode_as(src, Payload::Seed),
            PayloadKind::TofCalib => decode_as(src, Payload::TofCalib),
            PayloadKind::HwAssert => decode_as(src, Payload::HwAssert),
            PayloadKind::Raw => decode_as(src, Payload::Raw),
        }
    }

    /// Build a payload of this shape from named (object) or positional
    /// (array) arguments. `null` is treated as no arguments.
    pub fn from_json(self, args: Value) -> Result<Payload> {
        let args = match args {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        match self {
            PayloadKind::Empty => from_value(args, Payload::Empty),
            PayloadKind::Status => from_value(args, Payload::Status),
            PayloadKind::Identify => from_value(args, Payload::Identify),
            PayloadKind::DeviceInfo => from_value(args, Payload::DeviceInfo),
            PayloadKind::ConnParams => from_value(args, Payload::ConnParams),
            PayloadKind::Connect => from_value(args, Payload::Connect),
            PayloadKind::Enable => from_value(args, Payload::Enable),
            PayloadKind::AoaSetParams => from_value(args, Payload::AoaSetParams),
            PayloadKind::AoaAngle => from_value(args, Payload::AoaAngle),
            PayloadKind::AoaPairAngles => from_value(args, Payload::AoaPairAngles),
            PayloadKind::AoaRaw => from_value(args, Payload::AoaRaw),
            PayloadKind::TofStatistics => from_value(args, Payload::TofStatistics),
            PayloadKind::TofCalibration => from_value(args, Payload::TofCalibration),
            PayloadKind::TofDistance => from_value(args, Payload::TofDistance),
            PayloadKind::TofRaw => from_value(args, Payload::TofRaw),
            PayloadKind::TofSetParams => from_value(args, Payload::TofSetParams),
            PayloadKind::Seed => from_value(args, Payload::Seed),
            PayloadKind::TofCalib => from_value(args, Payload::TofCalib),
            PayloadKind::HwAssert => from_value(args, Payload::HwAssert),
            PayloadKind::Raw => from_value(args, Payload::Raw),
        }
    }

    /// Field names in wire order.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            PayloadKind::Empty => &[],
            PayloadKind::Status => &["status"],
            PayloadKind::Identify => &["capabilities", "identifier"],
            PayloadKind::DeviceInfo => {
                &["eventType", "addrType", "addr", "rssi", "dataLen", "data"]
            }
            PayloadKind::ConnParams => &[
                "accessAddress",
                "connInterval",
                "hopValue",
                "mSCA",
                "currChan",
                "chanMap",
                "crcInit",
            ],
            PayloadKind::Connect => &["addrType", "peerAddr"],
            PayloadKind::Enable => &["enable"],
            PayloadKind::AoaSetParams => &[
                "aoaRole",
                "aoaResultMode",
                "cteScanOvs",
                "cteOffset",
                "cteTime",
            ],
            PayloadKind::AoaAngle => &["angle", "rssi", "antenna", "channel"],
            PayloadKind::AoaPairAngles => &["rssi", "antenna", "channel", "pairAngle"],
            PayloadKind::AoaRaw => &[
                "rssi",
                "antenna",
                "channel",
                "offset",
                "samplesLength",
                "samples",
            ],
            PayloadKind::TofStatistics => &["stats"],
            PayloadKind::TofCalibration => &["calibVals"],
            PayloadKind::TofDistance => &["distance", "rssi"],
            PayloadKind::TofRaw => &["tick", "freqIdx", "rssi"],
            PayloadKind::TofSetParams => &[
                "tofRole",
                "numSamples",
                "numFreq",
                "autoTofRssiThresh",
                "resultMode",
                "runMode",
                "frequencies",
            ],
            PayloadKind::Seed => &["seed"],
            PayloadKind::TofCalib => &["enable", "samplesPerFreq", "calibDistance"],
            PayloadKind::HwAssert => &["cause", "subcause"],
            PayloadKind::Raw => &["raw_payload"],
        }
    }
}

impl Payload {
    /// The shape of this payload.
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Empty(_) => PayloadKind::Empty,
            Payload::Status(_) => PayloadKind::Status,
            Payload::Identify(_) => PayloadKind::Identify,
            Payload::DeviceInfo(_) => PayloadKind::DeviceInfo,
            Payload::ConnParams(_) => PayloadKind::ConnParams,
            Payload::Connect(_) => PayloadKind::Connect,
            Payload::Enable(_) => PayloadKind::Enable,
            Payload::AoaSetParams(_) => PayloadKind::AoaSetParams,
            Payload::AoaAngle(_) => PayloadKind::AoaAngle,
            Payload::AoaPairAngles(_) => PayloadKind::AoaPairAngles,
            Payload::AoaRaw(_) => PayloadKind::AoaRaw,
            Payload::TofStatistics(_) => PayloadKind::TofStatistics,
            Payload::TofCalibration(_) => PayloadKind::TofCalibration,
            Payload::TofDistance(_) => PayloadKind::TofDistance,
            Payload::TofRaw(_) => PayloadKind::TofRaw,
            Payload::TofSetParams(_) => PayloadKind::TofSetParams,
            Payload::Seed(_) => PayloadKind::Seed,
            Payload::TofCalib(_) => PayloadKind::TofCalib,
            Payload::HwAssert(_) => PayloadKind::HwAssert,
            Payload::Raw(_) => PayloadKind::Raw,
        }
    }

    /// Append the wire form of this payload to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Payload::Empty(p) => p.encode(dst),
            Payload::Status(p) => p.encode(dst),
            Payload::Identify(p) => p.encode(dst),
            Payload::DeviceInfo(p) => p.encode(dst),
            Payload::ConnParams(p) => p.encode(dst),
            Payload::Connect(p) => p.encode(dst),
            Payload::Enable(p) => p.encode(dst),
            Payload::AoaSetParams(p) => p.encode(dst),
            Payload::AoaAngle(p) => p.encode(dst),
            Payload::AoaPairAngles(p) => p.encode(dst),
            Payload::AoaRaw(p) => p.encode(dst),
            Payload::TofStatistics(p) => p.encode(dst),
            Payload::TofCalibration(p) => p.encode(dst),
            Payload::TofDistance(p) => p.encode(dst),
            Payload::TofRaw(p) => p.encode(dst),
            Payload::TofSetParams(p) => p.encode(dst),
            Payload::Seed(p) => p.encode(dst),
            Payload::TofCalib(p) => p.encode(dst),
            Payload::HwAssert(p) => p.encode(dst),
            Payload::Raw(p) => p.encode(dst),
        }
    }

    /// Fail when the payload holds more than its wire form can carry.
    pub fn check(&self) -> Result<()> {
        match self {
            Payload::TofSetParams(p) => p.frequency_count().map(|_| ()),
            _ => Ok(()),
        }
    }

    /// Wire form as a standalone buffer.
    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf
    }

    /// The status code, for status-only payloads.
    pub fn status(&self) -> Option<RtlsStatus> {
        match self {
            Payload::Status(p) => Some(p.status),
            _ => None,
        }
    }

    /// Textual form of this payload.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Empty(EmptyPayload {})
    }
}

/// Decode a payload of `kind`, rejecting leftovers when `strict` is set.
pub fn decode_payload(kind: PayloadKind, bytes: &[u8], strict: bool) -> Result<Payload> {
    let mut reader = WireReader::new(bytes);
    let payload = kind.decode(&mut reader)?;
    if strict && !reader.is_empty() {
        return Err(SchemaError::TrailingBytes(reader.remaining()));
    }
    Ok(payload)
}
