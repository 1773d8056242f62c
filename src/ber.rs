//! Low-level BER tag/length framing and the integer/OID wire formats used
//! by [`crate::value::Value`].

use crate::error::CodecError;
use crate::oid::Oid;

/// BER tag octets used by the SNMP subset of ASN.1.
pub mod tag {
    pub const INTEGER: u8 = 0x02;
    pub const OCTET_STRING: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const OBJECT: u8 = 0x06;
    pub const SEQUENCE: u8 = 0x30;
    pub const IP_ADDRESS: u8 = 0x40;
    pub const COUNTER: u8 = 0x41;
    pub const GAUGE: u8 = 0x42;
    pub const TIME_TICKS: u8 = 0x43;
    pub const GET_REQUEST: u8 = 0xA0;
    pub const GET_NEXT_REQUEST: u8 = 0xA1;
    pub const GET_RESPONSE: u8 = 0xA2;
    pub const SET_REQUEST: u8 = 0xA3;

    /// Tags whose content is a concatenation of child chunks rather than
    /// a primitive payload.
    pub fn is_container(t: u8) -> bool {
        matches!(
            t,
            SEQUENCE | GET_REQUEST | GET_NEXT_REQUEST | GET_RESPONSE | SET_REQUEST
        )
    }
}

/// Encode a BER length field (definite form, minimal octet count).
pub fn encode_length(len: usize) -> Vec<u8> {
    if len < 0x80 {
        vec![len as u8]
    } else {
        let mut be = Vec::new();
        let mut n = len;
        while n > 0 {
            be.push((n & 0xFF) as u8);
            n >>= 8;
        }
        be.reverse();
        let mut out = Vec::with_capacity(be.len() + 1);
        out.push(0x80 + be.len() as u8);
        out.extend(be);
        out
    }
}

/// Decode a BER length field. Returns `(length, octets_consumed_by_the_length_field)`.
/// Does not check `length` against the remaining buffer; callers must do that.
pub fn decode_length(data: &[u8]) -> Result<(usize, usize), CodecError> {
    let first = *data.first().ok_or(CodecError::UnexpectedEof)?;
    if first < 0x80 {
        Ok((first as usize, 1))
    } else {
        let n = (first & 0x7F) as usize;
        if data.len() < 1 + n {
            return Err(CodecError::UnexpectedEof);
        }
        let mut len = 0usize;
        for &b in &data[1..1 + n] {
            len = (len << 8) | b as usize;
        }
        Ok((len, 1 + n))
    }
}

/// Minimal two's-complement encoding of a signed value: strip redundant
/// leading `0x00`/`0xFF` octets while keeping the sign bit correct.
pub fn encode_minimal_int(value: i64) -> Vec<u8> {
    let mut bytes = value.to_be_bytes().to_vec();
    while bytes.len() > 1 {
        let drop_leading_zero = bytes[0] == 0x00 && bytes[1] & 0x80 == 0;
        let drop_leading_ff = bytes[0] == 0xFF && bytes[1] & 0x80 != 0;
        if drop_leading_zero || drop_leading_ff {
            bytes.remove(0);
        } else {
            break;
        }
    }
    bytes
}

/// Sign-extend a minimal-form two's-complement payload to `i64`.
pub fn decode_int_sign_extend(bytes: &[u8]) -> i64 {
    if bytes.is_empty() {
        return 0;
    }
    let mut value: i64 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
    for &b in bytes {
        value = (value << 8) | b as i64;
    }
    value
}

/// True if `bytes` is a non-minimal two's-complement encoding (a redundant
/// leading `0x00` or `0xFF`).
pub fn is_non_minimal_int(bytes: &[u8]) -> bool {
    if bytes.len() < 2 {
        return false;
    }
    (bytes[0] == 0x00 && bytes[1] & 0x80 == 0) || (bytes[0] == 0xFF && bytes[1] & 0x80 != 0)
}

/// BER-encode an Oid's body (no tag/length octets): `.1.3` compacts to
/// `0x2B`, remaining sub-identifiers are base-128 big-endian with the
/// continuation bit set on every octet but the last.
pub fn encode_oid_body(oid: &Oid) -> Vec<u8> {
    let parts = oid.parts();
    let mut out = Vec::new();
    out.push((parts[0] * 40 + parts[1]) as u8);
    for &component in &parts[2..] {
        out.extend(encode_base128(component));
    }
    out
}

fn encode_base128(mut value: u32) -> Vec<u8> {
    let mut groups = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        groups.push((value & 0x7F) as u8);
        value >>= 7;
    }
    groups.reverse();
    let last = groups.len() - 1;
    for (i, g) in groups.iter_mut().enumerate() {
        if i != last {
            *g |= 0x80;
        }
    }
    groups
}

/// Decode an Oid's BER body.
pub fn decode_oid_body(bytes: &[u8]) -> Result<Oid, CodecError> {
    if bytes.is_empty() {
        return Err(CodecError::InvalidOid(String::new()));
    }
    let mut parts = vec![(bytes[0] / 40) as u32, (bytes[0] % 40) as u32];
    let mut i = 1;
    while i < bytes.len() {
        let mut value: u32 = 0;
        loop {
            if i >= bytes.len() {
                return Err(CodecError::UnexpectedEof);
            }
            let b = bytes[i];
            i += 1;
            value = (value << 7) | (b & 0x7F) as u32;
            if b & 0x80 == 0 {
                break;
            }
        }
        parts.push(value);
    }
    Oid::from_parts(parts)
}

/// Re-derive the minimal unsigned BER wire bytes for a fixed-width stored
/// unsigned quantity (used by TIME-TICKS, whose stored payload is always 8
/// octets but whose wire form is the minimal unsigned integer encoding).
pub fn encode_minimal_unsigned(value: u64) -> Vec<u8> {
    let be = value.to_be_bytes();
    let mut start = 0;
    while start < be.len() - 1 && be[start] == 0 {
        start += 1;
    }
    let mut out = be[start..].to_vec();
    if out[0] & 0x80 != 0 {
        out.insert(0, 0x00);
    }
    out
}

/// Expand received wire bytes (minimal unsigned BER integer) into an 8-octet
/// big-endian unsigned stored payload.
pub fn expand_to_u64_be(bytes: &[u8]) -> [u8; 8] {
    let mut value: u64 = 0;
    for &b in bytes {
        value = (value << 8) | b as u64;
    }
    value.to_be_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_short_form() {
        assert_eq!(encode_length(10), vec![10]);
        assert_eq!(encode_length(127), vec![127]);
        assert_eq!(decode_length(&[10]).unwrap(), (10, 1));
    }

    #[test]
    fn length_long_form() {
        assert_eq!(encode_length(128), vec![0x81, 128]);
        assert_eq!(encode_length(256), vec![0x82, 1, 0]);
        assert_eq!(decode_length(&[0x81, 128]).unwrap(), (128, 2));
        assert_eq!(decode_length(&[0x82, 1, 0]).unwrap(), (256, 3));
    }

    #[test]
    fn minimal_int_examples_from_spec() {
        assert_eq!(encode_minimal_int(-4), vec![0xFC]);
        assert_eq!(encode_minimal_int(252), vec![0x00, 0xFC]);
        assert_eq!(encode_minimal_int(124), vec![0x7C]);
    }

    #[test]
    fn sign_extension_round_trips() {
        for n in [-2147483648i64, -1, 0, 1, 127, 128, 252, 2147483647] {
            let bytes = encode_minimal_int(n);
            assert!(!is_non_minimal_int(&bytes));
            assert_eq!(decode_int_sign_extend(&bytes), n);
        }
    }

    #[test]
    fn rejects_non_minimal_forms() {
        assert!(is_non_minimal_int(&[0xFF, 0xFC]));
        assert!(is_non_minimal_int(&[0x00, 0x7C]));
        assert!(!is_non_minimal_int(&[0xFC]));
    }

    #[test]
    fn minimal_unsigned_guards_sign_bit() {
        assert_eq!(encode_minimal_unsigned(0), vec![0x00]);
        assert_eq!(encode_minimal_unsigned(0x7F), vec![0x7F]);
        assert_eq!(encode_minimal_unsigned(0x80), vec![0x00, 0x80]);
        assert_eq!(encode_minimal_unsigned(u64::MAX), vec![0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(expand_to_u64_be(&encode_minimal_unsigned(u64::MAX)), u64::MAX.to_be_bytes());
    }

    #[test]
    fn oid_body_round_trip() {
        let oid: Oid = ".1.3.6.1.2.1.1.5.0".parse().unwrap();
        let body = encode_oid_body(&oid);
        assert_eq!(body[0], 0x2B);
        assert_eq!(decode_oid_body(&body).unwrap(), oid);
    }
}
