//! Field types shared by RTLS payloads.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, SchemaError};

/// Declares a one-byte enumeration carried on the wire by value and in text
/// by name.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal => $text:tt),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(u8)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $text)] $variant = $value),+
        }

        impl $name {
            /// Every variant, in wire order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire value.
            pub fn as_u8(self) -> u8 {
                self as u8
            }

            /// Name used in the textual representation.
            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl TryFrom<u8> for $name {
            type Error = SchemaError;

            fn try_from(value: u8) -> Result<Self> {
                match value {
                    $($value => Ok($name::$variant),)+
                    other => Err(SchemaError::InvalidValue {
                        field: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

wire_enum! {
    /// Outcome reported by an RTLS device.
    RtlsStatus {
        Success = 0 => "RTLS_SUCCESS",
        Fail = 1 => "RTLS_FAIL",
        LinkLost = 2 => "RTLS_LINK_LOST",
        LinkEstabFail = 3 => "RTLS_LINK_ESTAB_FAIL",
        LinkTerminated = 4 => "RTLS_LINK_TERMINATED",
        OutOfMemory = 5 => "RTLS_OUT_OF_MEMORY",
        IllegalCmd = 6 => "RTLS_ILLEGAL_CMD",
    }
}

impl RtlsStatus {
    /// True for [`RtlsStatus::Success`].
    pub fn is_success(self) -> bool {
        self == RtlsStatus::Success
    }
}

wire_enum! {
    /// Part a device plays in time-of-flight ranging.
    TofRole {
        Slave = 0 => "TOF_SLAVE",
        Master = 1 => "TOF_MASTER",
        Passive = 2 => "TOF_PASSIVE",
    }
}

wire_enum! {
    /// Part a device plays in angle-of-arrival sampling.
    AoaRole {
        Slave = 0 => "AOA_SLAVE",
        Master = 1 => "AOA_MASTER",
        Passive = 2 => "AOA_PASSIVE",
    }
}

wire_enum! {
    /// What a ranging device reports.
    TofResultMode {
        Distance = 0 => "TOF_MODE_DIST",
        Statistics = 1 => "TOF_MODE_STAT",
        Raw = 2 => "TOF_MODE_RAW",
    }
}

wire_enum! {
    /// How long a ranging device keeps measuring.
    TofRunMode {
        Continuous = 0 => "TOF_MODE_CONT",
        OneShot = 1 => "TOF_MODE_ONE_SHOT",
        Auto = 2 => "TOF_MODE_AUTO",
    }
}

wire_enum! {
    /// What an angle-of-arrival device reports.
    AoaResultMode {
        Angle = 0 => "AOA_MODE_ANGLE",
        PairAngles = 1 => "AOA_MODE_PAIR_ANGLES",
        Raw = 2 => "AOA_MODE_RAW",
    }
}

/// A 6-byte Bluetooth device address.
///
/// Stored most-significant byte first, the way it is displayed. On the wire
/// the bytes travel in reverse order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct DeviceAddress([u8; 6]);

impl DeviceAddress {
    /// Build from display-order bytes.
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Build from wire-order bytes.
    pub fn from_wire(mut wire: [u8; 6]) -> Self {
        wire.reverse();
        Self(wire)
    }

    /// Wire-order bytes.
    pub fn to_wire(self) -> [u8; 6] {
        let mut wire = self.0;
        wire.reverse();
        wire
    }

    /// Display-order bytes.
    pub fn octets(self) -> [u8; 6] {
        self.0
    }

    /// True for `00:00:00:00:00:00`.
    pub fn is_zero(self) -> bool {
        self.0 == [0; 6]
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, &self.0)
    }
}

impl fmt::Debug for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceAddress({self})")
    }
}

impl FromStr for DeviceAddress {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        let octets: [u8; 6] = parse_hex(s, "address")?;
        Ok(Self(octets))
    }
}

impl Serialize for DeviceAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DeviceAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// The 32-byte ranging security seed.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SecuritySeed(pub [u8; 32]);

impl SecuritySeed {
    /// True when every byte is zero, which devices report before a seed exists.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl Default for SecuritySeed {
    fn default() -> Self {
        Self([0; 32])
    }
}

impl fmt::Display for SecuritySeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, &self.0)
    }
}

impl fmt::Debug for SecuritySeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecuritySeed({self})")
    }
}

impl FromStr for SecuritySeed {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(Self(parse_hex(s, "seed")?))
    }
}

impl Serialize for SecuritySeed {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SecuritySeed {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Capability flags a device reports when identified.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities(u16);

impl Capabilities {
    pub const CM: Capabilities = Capabilities(1);
    pub const AOA_TX: Capabilities = Capabilities(2);
    pub const AOA_RX: Capabilities = Capabilities(4);
    pub const TOF_SLAVE: Capabilities = Capabilities(8);
    pub const TOF_PASSIVE: Capabilities = Capabilities(16);
    pub const TOF_MASTER: Capabilities = Capabilities(32);
    pub const RTLS_SLAVE: Capabilities = Capabilities(64);
    pub const RTLS_MASTER: Capabilities = Capabilities(128);
    pub const RTLS_PASSIVE: Capabilities = Capabilities(256);

    /// Every named flag, in bit order.
    pub const NAMED: [(&'static str, Capabilities); 9] = [
        ("CM", Capabilities::CM),
        ("AOA_TX", Capabilities::AOA_TX),
        ("AOA_RX", Capabilities::AOA_RX),
        ("TOF_SLAVE", Capabilities::TOF_SLAVE),
        ("TOF_PASSIVE", Capabilities::TOF_PASSIVE),
        ("TOF_MASTER", Capabilities::TOF_MASTER),
        ("RTLS_SLAVE", Capabilities::RTLS_SLAVE),
        ("RTLS_MASTER", Capabilities::RTLS_MASTER),
        ("RTLS_PASSIVE", Capabilities::RTLS_PASSIVE),
    ];

    /// No flags set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build from raw bits; unnamed bits are kept.
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Raw bits.
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// True when every flag in `other` is set.
    pub const fn contains(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when at least one flag in `other` is set.
    pub const fn intersects(self, other: Capabilities) -> bool {
        self.0 & other.0 != 0
    }

    /// Names of the set flags, in bit order.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMED
            .into_iter()
            .filter(move |(_, flag)| self.contains(*flag))
            .map(|(name, _)| name)
    }

    fn from_name(name: &str) -> Option<Capabilities> {
        Self::NAMED
            .into_iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, flag)| flag)
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Capabilities) -> Capabilities {
        Capabilities(self.0 | rhs.0)
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capabilities({self})")
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.names().collect();
        if names.is_empty() {
            write!(f, "0x{:04X}", self.0)
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

impl Serialize for Capabilities {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let flags: BTreeMap<&str, bool> = Self::NAMED
            .into_iter()
            .map(|(name, flag)| (name, self.contains(flag)))
            .collect();
        flags.serialize(serializer)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CapabilitiesRepr {
    Bits(u16),
    Names(Vec<String>),
    Flags(BTreeMap<String, bool>),
}

impl<'de> Deserialize<'de> for Capabilities {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let lookup = |name: &str| -> std::result::Result<Capabilities, D::Error> {
            Capabilities::from_name(name)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown capability '{name}'")))
        };

        match CapabilitiesRepr::deserialize(deserializer)? {
            CapabilitiesRepr::Bits(bits) => Ok(Capabilities(bits)),
            CapabilitiesRepr::Names(names) => names
                .iter()
                .try_fold(Capabilities::empty(), |acc, name| Ok(acc | lookup(name)?)),
            CapabilitiesRepr::Flags(flags) => flags
                .iter()
                .filter(|(_, set)| **set)
                .try_fold(Capabilities::empty(), |acc, (name, _)| {
                    Ok(acc | lookup(name)?)
                }),
        }
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            f.write_str(":")?;
        }
        write!(f, "{byte:02X}")?;
    }
    Ok(())
}

/// Format bytes as colon-separated uppercase hex.
pub fn hex_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(':');
        }
        out.push_str(&format!("{byte:02X}"));
    }
    out
}

/// Parse colon-separated hex into raw bytes.
pub fn parse_hex_bytes(text: &str, field: &'static str) -> Result<Vec<u8>> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    text.split(':')
        .map(|part| {
            if part.is_empty() || part.len() > 2 {
                return Err(SchemaError::InvalidValue {
                    field,
                    value: text.to_string(),
                });
            }
            u8::from_str_radix(part, 16).map_err(|_| SchemaError::InvalidValue {
                field,
                value: text.to_string(),
            })
        })
        .collect()
}

fn parse_hex<const N: usize>(text: &str, field: &'static str) -> Result<[u8; N]> {
    let bytes = parse_hex_bytes(text, field)?;
    bytes.try_into().map_err(|_| SchemaError::InvalidValue {
        field,
        value: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn address_display_and_wire_order() {
        let addr = DeviceAddress::from_wire([0xFF, 0xEE, 0xDD, 0xCC, 0xBB, 0xAA]);
        assert_eq!(addr.to_string(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(addr.to_wire(), [0xFF, 0xEE, 0xDD, 0xCC, 0xBB, 0xAA]);
        assert_eq!("aa:bb:cc:dd:ee:ff".parse::<DeviceAddress>().unwrap(), addr);
    }

    #[test]
    fn address_rejects_bad_text() {
        assert!("AA:BB:CC".parse::<DeviceAddress>().is_err());
        assert!("AA:BB:CC:DD:EE:GG".parse::<DeviceAddress>().is_err());
        assert!("AABBCCDDEEFF".parse::<DeviceAddress>().is_err());
    }

    #[test]
    fn address_serializes_as_text() {
        let addr: DeviceAddress = "01:02:03:04:05:06".parse().unwrap();
        assert_eq!(serde_json::to_value(addr).unwrap(), json!("01:02:03:04:05:06"));
        let back: DeviceAddress = serde_json::from_value(json!("01:02:03:04:05:06")).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn capabilities_flags() {
        let caps = Capabilities::RTLS_MASTER | Capabilities::TOF_MASTER;
        assert_eq!(caps.bits(), 160);
        assert!(caps.contains(Capabilities::RTLS_MASTER));
        assert!(!caps.contains(Capabilities::RTLS_PASSIVE));
        assert_eq!(caps.names().collect::<Vec<_>>(), ["TOF_MASTER", "RTLS_MASTER"]);
        assert_eq!(caps.to_string(), "TOF_MASTER|RTLS_MASTER");
    }

    #[test]
    fn capabilities_json_forms() {
        let caps = Capabilities::AOA_TX | Capabilities::RTLS_PASSIVE;
        let value = serde_json::to_value(caps).unwrap();
        assert_eq!(value["AOA_TX"], json!(true));
        assert_eq!(value["CM"], json!(false));

        let from_map: Capabilities = serde_json::from_value(value).unwrap();
        let from_names: Capabilities =
            serde_json::from_value(json!(["AOA_TX", "RTLS_PASSIVE"])).unwrap();
        let from_bits: Capabilities = serde_json::from_value(json!(258)).unwrap();
        assert_eq!(from_map, caps);
        assert_eq!(from_names, caps);
        assert_eq!(from_bits, caps);
        assert!(serde_json::from_value::<Capabilities>(json!(["NOPE"])).is_err());
    }

    #[test]
    fn status_names() {
        assert_eq!(RtlsStatus::try_from(0).unwrap(), RtlsStatus::Success);
        assert_eq!(RtlsStatus::try_from(6).unwrap(), RtlsStatus::IllegalCmd);
        assert!(RtlsStatus::try_from(7).is_err());
        assert_eq!(
            serde_json::to_value(RtlsStatus::LinkLost).unwrap(),
            json!("RTLS_LINK_LOST")
        );
        assert!(RtlsStatus::Success.is_success());
    }

    #[test]
    fn seed_zero_detection() {
        let mut seed = SecuritySeed::default();
        assert!(seed.is_zero());
        seed.0[31] = 1;
        assert!(!seed.is_zero());
        let text = seed.to_string();
        assert_eq!(text.parse::<SecuritySeed>().unwrap(), seed);
    }
}
