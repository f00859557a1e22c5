//! Little-endian field readers and writers for payload structs.

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Deserializer};

use crate::error::{Result, SchemaError};
use crate::types::DeviceAddress;

/// A payload struct with a fixed binary layout.
pub trait WirePayload: Sized {
    /// Append the wire form of `self` to `dst`.
    fn encode(&self, dst: &mut BytesMut);

    /// Read one value from the front of `src`.
    fn decode(src: &mut WireReader<'_>) -> Result<Self>;
}

/// An element of a list that runs to the end of the payload.
pub trait GreedyItem: WirePayload {
    /// Encoded size of one element.
    const SIZE: usize;
}

/// Bounds-checked cursor over payload bytes.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
}

impl<'a> WireReader<'a> {
    /// Start reading at the beginning of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// True when everything has been consumed.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn need(&self, field: &'static str, needed: usize) -> Result<()> {
        if self.buf.len() < needed {
            return Err(SchemaError::Truncated {
                field,
                needed,
                available: self.buf.len(),
            });
        }
        Ok(())
    }

    pub fn u8(&mut self, field: &'static str) -> Result<u8> {
        self.need(field, 1)?;
        Ok(self.buf.get_u8())
    }

    pub fn i8(&mut self, field: &'static str) -> Result<i8> {
        self.need(field, 1)?;
        Ok(self.buf.get_i8())
    }

    pub fn u16(&mut self, field: &'static str) -> Result<u16> {
        self.need(field, 2)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn i16(&mut self, field: &'static str) -> Result<i16> {
        self.need(field, 2)?;
        Ok(self.buf.get_i16_le())
    }

    pub fn u32(&mut self, field: &'static str) -> Result<u32> {
        self.need(field, 4)?;
        Ok(self.buf.get_u32_le())
    }

    pub fn f64(&mut self, field: &'static str) -> Result<f64> {
        self.need(field, 8)?;
        Ok(self.buf.get_f64_le())
    }

    /// Read a fixed-size byte array.
    pub fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N]> {
        self.need(field, N)?;
        let mut out = [0u8; N];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    /// Read `len` raw bytes.
    pub fn take(&mut self, field: &'static str, len: usize) -> Result<&'a [u8]> {
        self.need(field, len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    /// Read a device address stored in wire (reversed) order.
    pub fn address(&mut self, field: &'static str) -> Result<DeviceAddress> {
        Ok(DeviceAddress::from_wire(self.array(field)?))
    }

    /// Read whole elements until fewer than one element's bytes remain.
    pub fn greedy<T: GreedyItem>(&mut self) -> Result<Vec<T>> {
        let mut items = Vec::with_capacity(self.buf.len() / T::SIZE.max(1));
        while self.buf.len() >= T::SIZE {
            items.push(T::decode(self)?);
        }
        Ok(items)
    }

    /// Consume and return everything left.
    pub fn rest(&mut self) -> &'a [u8] {
        std::mem::take(&mut self.buf)
    }
}

/// Write a device address in wire (reversed) order.
pub fn put_address(dst: &mut BytesMut, addr: DeviceAddress) {
    dst.put_slice(&addr.to_wire());
}

/// Write each element of a list.
pub fn put_all<T: WirePayload>(dst: &mut BytesMut, items: &[T]) {
    for item in items {
        item.encode(dst);
    }
}

/// Accept `true`/`false` or `0`/`1` for on/off fields.
pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(u8),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => Ok(value),
        Flag::Int(0) => Ok(false),
        Flag::Int(1) => Ok(true),
        Flag::Int(other) => Err(serde::de::Error::custom(format!(
            "expected 0 or 1, got {other}"
        ))),
    }
}

/// Serde adapter storing byte strings as colon-separated hex.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::types::{hex_string, parse_hex_bytes};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex_string(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_hex_bytes(&text, "bytes").map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_fields() {
        let bytes = [0x01, 0xFF, 0x34, 0x12, 0xFE, 0xFF, 0x78, 0x56, 0x34, 0x12];
        let mut reader = WireReader::new(&bytes);
        assert_eq!(reader.u8("a").unwrap(), 1);
        assert_eq!(reader.i8("b").unwrap(), -1);
        assert_eq!(reader.u16("c").unwrap(), 0x1234);
        assert_eq!(reader.i16("d").unwrap(), -2);
        assert_eq!(reader.u32("e").unwrap(), 0x1234_5678);
        assert!(reader.is_empty());
    }

    #[test]
    fn short_read_names_the_field() {
        let mut reader = WireReader::new(&[0x01]);
        match reader.u16("connInterval") {
            Err(SchemaError::Truncated {
                field,
                needed,
                available,
            }) => {
                assert_eq!(field, "connInterval");
                assert_eq!(needed, 2);
                assert_eq!(available, 1);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn flag_accepts_bool_and_int() {
        #[derive(Deserialize)]
        struct Flagged {
            #[serde(deserialize_with = "flag")]
            on: bool,
        }

        let t: Flagged = serde_json::from_str(r#"{"on": true}"#).unwrap();
        let one: Flagged = serde_json::from_str(r#"{"on": 1}"#).unwrap();
        let zero: Flagged = serde_json::from_str(r#"{"on": 0}"#).unwrap();
        assert!(t.on && one.on && !zero.on);
        assert!(serde_json::from_str::<Flagged>(r#"{"on": 2}"#).is_err());
    }
}
