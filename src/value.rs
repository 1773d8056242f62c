//! The tagged container for every SNMP data type that crosses the wire,
//! plus the BER `encode`/`decode` entry points.
//!
//! `Value::payload` is tag-dependent: for INTEGER/GAUGE/COUNTER and
//! IP-ADDRESS it is exactly the wire bytes; for OBJECT it is the UTF-8
//! bytes of the canonical dotted-decimal text (not the base-128 wire
//! form); for TIME-TICKS it is always 8 big-endian bytes of the 64-bit
//! unsigned value (the wire form is re-derived at encode time). Container
//! tags (SEQUENCE and the four PDU tags) carry no payload, only children.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ber::{self, tag};
use crate::error::CodecError;
use crate::oid::Oid;

/// A BER tag/length/value record, optionally carrying named children and
/// the OID it was received as an answer for.
///
/// Implements `Serialize`/`Deserialize` for application-level caching of
/// decoded results; this is independent of [`Value::encode`]/[`Value::decode`],
/// which are the only BER wire-format entry points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Value {
    tag: u8,
    payload: Vec<u8>,
    children: Vec<Value>,
    address: Option<Oid>,
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
            && self.payload == other.payload
            && self.children == other.children
            && self.address == other.address
    }
}
impl Eq for Value {}

impl Value {
    // ---- factories --------------------------------------------------

    pub fn integer(n: i32) -> Value {
        Value {
            tag: tag::INTEGER,
            payload: ber::encode_minimal_int(n as i64),
            children: Vec::new(),
            address: None,
        }
    }

    pub fn null() -> Value {
        Value {
            tag: tag::NULL,
            payload: Vec::new(),
            children: Vec::new(),
            address: None,
        }
    }

    pub fn string(bytes: impl Into<Vec<u8>>) -> Value {
        Value {
            tag: tag::OCTET_STRING,
            payload: bytes.into(),
            children: Vec::new(),
            address: None,
        }
    }

    pub fn sequence() -> Value {
        Value {
            tag: tag::SEQUENCE,
            payload: Vec::new(),
            children: Vec::new(),
            address: None,
        }
    }

    /// A container PDU value (GET/GET-NEXT/GET-RESPONSE/SET), built up with
    /// [`Value::add_child`].
    pub fn pdu(pdu_tag: u8) -> Value {
        Value {
            tag: pdu_tag,
            payload: Vec::new(),
            children: Vec::new(),
            address: None,
        }
    }

    pub fn oid(text: &str) -> Result<Value, CodecError> {
        let parsed = Oid::from_str(text)?;
        Ok(Value {
            tag: tag::OBJECT,
            payload: parsed.to_text().into_bytes(),
            children: Vec::new(),
            address: None,
        })
    }

    pub fn ip_address(octets: [u8; 4]) -> Value {
        Value {
            tag: tag::IP_ADDRESS,
            payload: octets.to_vec(),
            children: Vec::new(),
            address: None,
        }
    }

    pub fn counter(n: u32) -> Value {
        Value {
            tag: tag::COUNTER,
            payload: ber::encode_minimal_int(n as i64),
            children: Vec::new(),
            address: None,
        }
    }

    pub fn gauge(n: u32) -> Value {
        Value {
            tag: tag::GAUGE,
            payload: ber::encode_minimal_int(n as i64),
            children: Vec::new(),
            address: None,
        }
    }

    pub fn time_ticks(n: u64) -> Value {
        Value {
            tag: tag::TIME_TICKS,
            payload: n.to_be_bytes().to_vec(),
            children: Vec::new(),
            address: None,
        }
    }

    /// Generic constructor interpreting `payload` per the tag's wire rules,
    /// used by the decoder for arbitrary/unknown tags.
    pub fn make(tag_byte: u8, payload: Vec<u8>) -> Value {
        let payload = match tag_byte {
            t if t == tag::TIME_TICKS && payload.len() != 8 => {
                ber::expand_to_u64_be(&payload).to_vec()
            }
            t if t == tag::OBJECT => match ber::decode_oid_body(&payload) {
                Ok(oid) => oid.to_text().into_bytes(),
                Err(_) => payload,
            },
            _ => payload,
        };
        Value {
            tag: tag_byte,
            payload,
            children: Vec::new(),
            address: None,
        }
    }

    // ---- accessors ----------------------------------------------------

    pub fn tag(&self) -> u8 {
        self.tag
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn children(&self) -> &[Value] {
        &self.children
    }

    pub fn address(&self) -> Option<&Oid> {
        self.address.as_ref()
    }

    /// Sign-extended integer interpretation, per tag:
    /// INTEGER/GAUGE/COUNTER sign-extend the minimal-form payload;
    /// IP-ADDRESS is a big-endian u32; TIME-TICKS is a big-endian u64.
    pub fn as_i64(&self) -> Option<i64> {
        match self.tag {
            tag::INTEGER | tag::GAUGE | tag::COUNTER => {
                Some(ber::decode_int_sign_extend(&self.payload))
            }
            tag::IP_ADDRESS if self.payload.len() == 4 => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(&self.payload);
                Some(u32::from_be_bytes(buf) as i64)
            }
            tag::TIME_TICKS if self.payload.len() == 8 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&self.payload);
                Some(u64::from_be_bytes(buf) as i64)
            }
            _ => None,
        }
    }

    /// UTF-8 (lossy) interpretation of the payload: the dotted OID text for
    /// OBJECT, or the raw string bytes for OCTET-STRING.
    pub fn as_text(&self) -> Option<String> {
        match self.tag {
            tag::OBJECT | tag::OCTET_STRING => {
                Some(String::from_utf8_lossy(&self.payload).into_owned())
            }
            _ => None,
        }
    }

    /// Structural + encoding validity, per §4.1.
    pub fn is_valid(&self) -> bool {
        match self.tag {
            tag::INTEGER | tag::GAUGE | tag::COUNTER => {
                !self.payload.is_empty() && !ber::is_non_minimal_int(&self.payload)
            }
            tag::IP_ADDRESS => self.payload.len() == 4,
            tag::TIME_TICKS => self.payload.len() == 8,
            tag::NULL => self.payload.is_empty(),
            tag::SEQUENCE
            | tag::GET_REQUEST
            | tag::GET_NEXT_REQUEST
            | tag::GET_RESPONSE => self.payload.is_empty(),
            tag::SET_REQUEST => !self.payload.is_empty() || !self.children.is_empty(),
            tag::OBJECT | tag::OCTET_STRING => true,
            _ => false,
        }
    }

    // ---- builders -------------------------------------------------------

    pub fn add_child(&mut self, child: Value) -> &mut Self {
        self.children.push(child);
        self
    }

    pub fn set_address(&mut self, oid: Oid) -> &mut Self {
        self.address = Some(oid);
        self
    }

    pub fn with_address(mut self, oid: Oid) -> Self {
        self.address = Some(oid);
        self
    }

    // ---- wire -------------------------------------------------------------

    /// Encode this Value (and its children, if any) as a single BER chunk.
    pub fn encode(&self) -> Vec<u8> {
        let body = self.encode_body();
        let mut out = Vec::with_capacity(body.len() + 6);
        out.push(self.tag);
        out.extend(ber::encode_length(body.len()));
        out.extend(body);
        out
    }

    fn encode_body(&self) -> Vec<u8> {
        if tag::is_container(self.tag) {
            let mut body = Vec::new();
            for child in &self.children {
                body.extend(child.encode());
            }
            body
        } else if self.tag == tag::OBJECT {
            let text = String::from_utf8_lossy(&self.payload);
            match Oid::from_str(&text) {
                Ok(oid) => ber::encode_oid_body(&oid),
                Err(_) => Vec::new(),
            }
        } else if self.tag == tag::TIME_TICKS {
            let mut buf = [0u8; 8];
            let n = self.payload.len().min(8);
            buf[8 - n..].copy_from_slice(&self.payload[self.payload.len() - n..]);
            ber::encode_minimal_unsigned(u64::from_be_bytes(buf))
        } else {
            self.payload.clone()
        }
    }

    /// Decode a buffer of concatenated top-level BER chunks. Stops (without
    /// error) at the first malformed chunk header; chunks already decoded
    /// are still returned.
    pub fn decode(data: &[u8]) -> Vec<Value> {
        Self::decode_with_trailing(data).0
    }

    /// Like [`Value::decode`], also returning the number of trailing octets
    /// left unconsumed because the first chunk starting there was malformed
    /// or truncated, so callers who care can log it.
    pub fn decode_with_trailing(mut data: &[u8]) -> (Vec<Value>, usize) {
        let mut out = Vec::new();
        while !data.is_empty() {
            match decode_one(data) {
                Ok((value, consumed)) => {
                    out.push(value);
                    data = &data[consumed..];
                }
                Err(_) => break,
            }
        }
        (out, data.len())
    }
}

/// Decode exactly one top-level chunk, returning the value and the number
/// of input octets it consumed.
fn decode_one(data: &[u8]) -> Result<(Value, usize), CodecError> {
    if data.len() < 2 {
        return Err(CodecError::UnexpectedEof);
    }
    let tag_byte = data[0];
    let (len, len_octets) = ber::decode_length(&data[1..])?;
    let header = 1 + len_octets;
    if data.len() < header + len {
        return Err(CodecError::LengthOverflow {
            declared: len,
            remaining: data.len().saturating_sub(header),
        });
    }
    let body = &data[header..header + len];
    let total = header + len;

    if tag::is_container(tag_byte) {
        let mut value = Value {
            tag: tag_byte,
            payload: Vec::new(),
            children: Vec::new(),
            address: None,
        };
        let mut rest = body;
        while !rest.is_empty() {
            let (child, consumed) = decode_one(rest)?;
            value.children.push(child);
            rest = &rest[consumed..];
        }
        Ok((value, total))
    } else {
        Ok((Value::make(tag_byte, body.to_vec()), total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_round_trip_examples() {
        assert_eq!(Value::integer(-4).payload(), &[0xFC]);
        assert_eq!(Value::integer(252).payload(), &[0x00, 0xFC]);
        assert_eq!(Value::integer(124).payload(), &[0x7C]);
        assert_eq!(Value::integer(42).as_i64(), Some(42));
    }

    #[test]
    fn integer_full_range_round_trips() {
        for n in [i32::MIN, -1, 0, 1, i32::MAX] {
            let v = Value::integer(n);
            assert_eq!(v.as_i64(), Some(n as i64));
            let decoded = Value::decode(&v.encode());
            assert_eq!(decoded, vec![v]);
        }
    }

    #[test]
    fn invalid_non_minimal_integers() {
        assert!(!Value::make(tag::INTEGER, vec![0xFF, 0xFC]).is_valid());
        assert!(!Value::make(tag::INTEGER, vec![0x00, 0x7C]).is_valid());
        assert!(Value::integer(-4).is_valid());
    }

    #[test]
    fn oid_round_trip() {
        let v = Value::oid(".1.3.6.1.2.1").unwrap();
        assert_eq!(v.as_text().as_deref(), Some(".1.3.6.1.2.1"));
        let encoded = v.encode();
        // tag + length(1) + body
        assert_eq!(encoded[2], 0x2B);
        let decoded = Value::decode(&encoded);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].as_text().as_deref(), Some(".1.3.6.1.2.1"));
    }

    #[test]
    fn ip_address_validity() {
        assert!(Value::ip_address([192, 168, 1, 1]).is_valid());
        assert!(!Value::make(tag::IP_ADDRESS, vec![1, 2, 3]).is_valid());
        assert_eq!(Value::ip_address([192, 168, 1, 1]).as_i64(), Some(0xC0A80101));
    }

    #[test]
    fn time_ticks_round_trip_and_minimal_wire_form() {
        let v = Value::time_ticks(12345);
        assert_eq!(v.payload().len(), 8);
        assert_eq!(v.as_i64(), Some(12345));
        let encoded = v.encode();
        // wire body should be the minimal unsigned form, not 8 raw bytes.
        assert!(encoded.len() < 2 + 8);
        let decoded = Value::decode(&encoded);
        assert_eq!(decoded, vec![v]);
    }

    #[test]
    fn time_ticks_large_value_guards_sign_bit() {
        let v = Value::time_ticks(u64::MAX);
        let encoded = v.encode();
        let decoded = Value::decode(&encoded);
        assert_eq!(decoded[0].as_i64(), Some(-1i64)); // u64::MAX reinterpreted, still round-trips the bytes
        assert_eq!(decoded, vec![v]);
    }

    #[test]
    fn null_and_sequence_validity() {
        assert!(Value::null().is_valid());
        assert!(!Value::make(tag::NULL, vec![1]).is_valid());
        assert!(Value::sequence().is_valid());
    }

    #[test]
    fn set_request_requires_non_empty_content() {
        assert!(!Value::pdu(tag::SET_REQUEST).is_valid());
        let mut pdu = Value::pdu(tag::SET_REQUEST);
        pdu.add_child(Value::integer(1));
        assert!(pdu.is_valid());
    }

    #[test]
    fn unknown_tag_is_invalid_but_preserved() {
        let v = Value::make(0x99, vec![1, 2, 3]);
        assert_eq!(v.tag(), 0x99);
        assert_eq!(v.payload(), &[1, 2, 3]);
        assert!(!v.is_valid());
    }

    #[test]
    fn decode_stops_at_first_bad_chunk_but_keeps_prior() {
        let mut buf = Value::integer(1).encode();
        buf.push(0x02); // dangling tag with no length byte
        let decoded = Value::decode(&buf);
        assert_eq!(decoded, vec![Value::integer(1)]);
    }

    #[test]
    fn decode_with_trailing_reports_dropped_octet_count() {
        let mut buf = Value::integer(1).encode();
        buf.push(0x02); // dangling tag with no length byte
        let (decoded, trailing) = Value::decode_with_trailing(&buf);
        assert_eq!(decoded, vec![Value::integer(1)]);
        assert_eq!(trailing, 1);
    }

    #[test]
    fn decode_concatenated_sequence() {
        let vs = vec![Value::integer(1), Value::null(), Value::string(b"hi".to_vec())];
        let mut buf = Vec::new();
        for v in &vs {
            buf.extend(v.encode());
        }
        assert_eq!(Value::decode(&buf), vs);
    }

    #[test]
    fn sequence_children_round_trip() {
        let mut seq = Value::sequence();
        seq.add_child(Value::integer(7));
        seq.add_child(Value::string(b"abc".to_vec()));
        let decoded = Value::decode(&seq.encode());
        assert_eq!(decoded, vec![seq]);
    }

    #[test]
    fn address_survives_clone_but_not_wire() {
        let oid: Oid = ".1.3.6.1.2.1.1.5.0".parse().unwrap();
        let v = Value::string(b"host-A".to_vec()).with_address(oid.clone());
        assert_eq!(v.address(), Some(&oid));
        let decoded = Value::decode(&v.encode());
        assert_eq!(decoded[0].address(), None);
    }
}
